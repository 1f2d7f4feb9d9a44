//! Whole-document JSON snapshots
//!
//! A store's file holds one JSON document with its full contents. Loading a
//! missing file is not an error: the parent directory is created and the
//! caller starts empty. Saving writes a temporary sibling, syncs it and
//! renames it over the target, so a crash leaves either the old or the new
//! snapshot on disk.

use serde::de::DeserializeOwned;
use serde::Serialize;
use speicher_core::{Result, SpeicherError};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);

/// Permission bits for directories created on first load
#[cfg(unix)]
const DIR_MODE: u32 = 0o740;

/// Reject paths that are not `.json` files
pub fn check_format(path: &Path) -> Result<()> {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(()),
        _ => Err(SpeicherError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load a JSON document
///
/// Returns `Ok(None)` when the file does not exist, after creating its parent
/// directory.
pub fn load_json<D: DeserializeOwned>(path: &Path) -> Result<Option<D>> {
    check_format(path)?;

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_dir(parent)?;
            }
            info!(path = %path.display(), "Store file not found, starting empty");
            return Ok(None);
        }
        Err(source) => {
            return Err(SpeicherError::Open {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let value = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        SpeicherError::Decode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!(path = %path.display(), "Loaded store file");
    Ok(Some(value))
}

/// Write a JSON document atomically
pub fn save_json<S: Serialize + ?Sized>(path: &Path, value: &S, pretty: bool) -> Result<()> {
    check_format(path)?;

    let tmp = temp_path(path);
    let write_err = |source: io::Error| SpeicherError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(&tmp).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    let encoded = if pretty {
        serde_json::to_writer_pretty(&mut writer, value)
    } else {
        serde_json::to_writer(&mut writer, value)
    };
    if let Err(source) = encoded {
        let _ = fs::remove_file(&tmp);
        return Err(SpeicherError::Encode {
            path: path.to_path_buf(),
            source,
        });
    }

    let synced = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .and_then(|file| file.sync_all())
        .and_then(|_| fs::rename(&tmp, path));
    if let Err(source) = synced {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(source));
    }

    debug!(path = %path.display(), "Saved store file");
    Ok(())
}

/// Sibling temp file, unique per save so concurrent writers never share one
fn temp_path(path: &Path) -> PathBuf {
    let seq = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("store.json"));
    name.push(format!(".{}.{}.tmp", process::id(), seq));
    path.with_file_name(name)
}

fn create_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(dir).map_err(|source| SpeicherError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}
