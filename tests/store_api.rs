//! End-to-end tests through the `speicher` facade
//!
//! Exercises a user-defined value type across both stores, transactions,
//! queries and a reload from disk.

use parking_lot::Mutex;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use speicher::{
    impl_deep_clone, load_list_with, load_map_with, DeepClone, MapStore, PersistConfig,
    SpeicherError, State, TransactionStatus,
};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
    tags: Vec<String>,
    #[serde(skip)]
    scratch: Mutex<Vec<u8>>,
}

impl_deep_clone!(Profile {
    name,
    age,
    tags,
    scratch
});

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.age == other.age && self.tags == other.tags
    }
}

fn profile(name: &str, age: u32) -> Profile {
    Profile {
        name: name.to_string(),
        age,
        tags: Vec::new(),
        scratch: Mutex::new(Vec::new()),
    }
}

#[test]
fn test_user_type_round_trips_through_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("profiles.json");

    {
        let map = load_map_with::<Profile>(&path, PersistConfig::for_testing()).unwrap();
        let mut ada = profile("Ada", 36);
        ada.tags.push("math".to_string());
        map.set("ada", &ada);
        map.set("bob", &profile("Bob", 41));
    }

    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["ada"]["tags"], serde_json::json!(["math"]));
    assert!(on_disk["ada"].get("scratch").is_none());

    let map = load_map_with::<Profile>(&path, PersistConfig::for_testing()).unwrap();
    let ada = map.get("ada").unwrap();
    assert_eq!(ada.tags, vec!["math".to_string()]);
    assert_eq!(map.len(), 2);
}

#[test]
fn test_stored_value_is_independent_of_caller_copy() {
    let map = MapStore::<Profile>::ephemeral();
    let original = profile("Ada", 36);
    original.scratch.lock().push(1);
    map.set("ada", &original);

    let mut out = map.get("ada").unwrap();
    out.tags.push("changed".to_string());
    assert!(out.scratch.lock().is_empty());
    // The returned copy's lock is fresh, so taking it never blocks
    let _held = out.scratch.lock();

    assert!(map.get("ada").unwrap().tags.is_empty());
    assert_eq!(original.scratch.lock().as_slice(), &[1]);
}

#[test]
fn test_transaction_field_mutation_commits() {
    let map = MapStore::<Profile>::ephemeral();
    map.set("ada", &profile("Ada", 36));

    let mut tx = map.begin();
    tx.get("ada").unwrap().unwrap().age += 1;
    assert_eq!(tx.get("ada").unwrap().map(|p| p.age), Some(37));
    assert_eq!(map.get("ada").unwrap().age, 36);

    let applied = tx.commit().unwrap();
    assert_eq!(applied.upserts, 1);
    assert_eq!(tx.status(), TransactionStatus::Committed);
    assert!(matches!(
        tx.set("x", &profile("X", 1)),
        Err(SpeicherError::TransactionClosed { .. })
    ));
    assert_eq!(map.get("ada").unwrap().age, 37);
}

#[test]
fn test_tombstone_hides_live_key_until_commit() {
    let map = MapStore::<u32>::ephemeral();
    map.set("a", &1);

    let mut tx = map.begin();
    tx.delete("a").unwrap();
    assert!(!tx.has("a").unwrap());
    assert!(tx.get("a").unwrap().is_none());
    assert!(map.has("a"));
    assert_eq!(tx.select().unwrap().count(), 0);

    tx.commit();
    assert!(!map.has("a"));
}

#[test]
fn test_query_over_profiles() {
    let map = MapStore::<Profile>::ephemeral();
    for (name, age) in [("ada", 36), ("bob", 41), ("cy", 19), ("di", 52)] {
        map.set(name, &profile(name, age));
    }

    let oldest_two: Vec<String> = map
        .select()
        .filter(|(_, p)| p.age > 20)
        .order_by(|(_, a), (_, b)| b.age.cmp(&a.age))
        .limit(2)
        .map(|(key, _)| key)
        .collect();
    assert_eq!(oldest_two, vec!["di".to_string(), "bob".to_string()]);
}

#[test]
fn test_list_and_map_under_one_state() {
    let dir = TempDir::new().unwrap();
    let config = PersistConfig::for_testing();
    let queue = load_list_with::<String>(dir.path().join("queue.json"), config.clone()).unwrap();
    let done = load_map_with::<u32>(dir.path().join("done.json"), config).unwrap();
    queue.overwrite(&["a".to_string(), "b".to_string(), "c".to_string()]);

    let workers = 3;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut state = State::new();
                state.read_lock(&*queue);
                let len = queue.locked(&state).len();
                // Upgrade, then claim the last unfinished item
                state.lock(&*queue);
                state.lock(&*done);
                let claimed = {
                    let items: Vec<String> = queue.locked(&state).iter().cloned().collect();
                    items.into_iter().find(|item| !done.locked(&state).contains_key(item))
                };
                if let Some(item) = &claimed {
                    done.locked_mut(&mut state).set(item.clone(), &1);
                }
                state.unlock(&*done);
                state.unlock(&*queue);
                assert!(state.has_read_lock(&*queue));
                state.read_unlock(&*queue);
                (len, claimed)
            })
        })
        .collect();

    let mut claimed: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter_map(|(len, item)| {
            assert_eq!(len, 3);
            item
        })
        .collect();
    claimed.sort();
    assert_eq!(claimed, vec!["a", "b", "c"]);
    assert_eq!(done.len(), 3);
}

#[test]
fn test_deep_clone_of_store_contents() {
    let map = MapStore::<Vec<u32>>::ephemeral();
    map.set("xs", &vec![1, 2, 3]);

    let snapshot = map.read(|data| data.deep_clone());
    map.set("xs", &vec![]);
    assert_eq!(snapshot.get_ref("xs"), Some(&vec![1, 2, 3]));
}

#[derive(Debug, Clone)]
enum ListOp {
    Append(i32),
    AppendUnique(i32),
    Set(usize, i32),
}

fn list_op() -> impl Strategy<Value = ListOp> {
    prop_oneof![
        any::<i32>().prop_map(ListOp::Append),
        (0..8i32).prop_map(ListOp::AppendUnique),
        (0..12usize, any::<i32>()).prop_map(|(i, v)| ListOp::Set(i, v)),
    ]
}

proptest! {
    #[test]
    fn prop_list_matches_vec_model(ops in proptest::collection::vec(list_op(), 0..64)) {
        let list = speicher::ListStore::<i32>::ephemeral();
        let mut model: Vec<i32> = Vec::new();

        for op in ops {
            match op {
                ListOp::Append(v) => {
                    list.append(&v);
                    model.push(v);
                }
                ListOp::AppendUnique(v) => {
                    let appended = list.append_unique(&v, |a, b| a == b);
                    prop_assert_eq!(appended, !model.contains(&v));
                    if appended {
                        model.push(v);
                    }
                }
                ListOp::Set(i, v) => {
                    let result = list.set(i, &v);
                    if i < model.len() {
                        prop_assert!(result.is_ok());
                        model[i] = v;
                    } else {
                        let is_out_of_range =
                            matches!(result, Err(SpeicherError::IndexOutOfRange { .. }));
                        prop_assert!(is_out_of_range);
                    }
                }
            }
        }

        prop_assert_eq!(list.select().collect::<Vec<_>>(), model);
    }
}
