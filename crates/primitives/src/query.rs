//! Lazy query pipelines over store contents
//!
//! A [`Query`] pulls one element at a time from its source. Each stage wraps
//! the upstream without buffering, except [`Query::order_by`], which has to
//! see every element before yielding the first.
//!
//! ```
//! use speicher_primitives::ListStore;
//!
//! let list = ListStore::<u32>::ephemeral();
//! for n in [5, 3, 8, 1, 9] {
//!     list.append(&n);
//! }
//!
//! let top: Vec<u32> = list
//!     .select()
//!     .filter(|n| *n > 2)
//!     .order_by(|a, b| b.cmp(a))
//!     .limit(2)
//!     .collect();
//! assert_eq!(top, vec![9, 8]);
//! ```

use std::cmp::Ordering;
use std::fmt;

/// A lazy, pull-based sequence of cloned store elements
///
/// Dropping a query abandons its upstream.
pub struct Query<'a, I> {
    inner: Box<dyn Iterator<Item = I> + 'a>,
}

impl<'a, I: 'a> Query<'a, I> {
    pub(crate) fn new(source: impl Iterator<Item = I> + 'a) -> Self {
        Query {
            inner: Box::new(source),
        }
    }

    /// Keep only elements matching `pred`
    pub fn filter<P>(self, pred: P) -> Self
    where
        P: FnMut(&I) -> bool + 'a,
    {
        Query::new(self.inner.filter(pred))
    }

    /// Yield elements sorted by `cmp`
    ///
    /// The sort is stable: elements comparing equal keep their upstream order.
    /// Nothing is pulled from upstream until the first element is requested.
    pub fn order_by<C>(self, cmp: C) -> Self
    where
        C: FnMut(&I, &I) -> Ordering + 'a,
    {
        Query::new(OrderBy {
            upstream: Some(self.inner),
            cmp,
            sorted: Vec::new().into_iter(),
        })
    }

    /// Stop after `n` elements
    pub fn limit(self, n: usize) -> Self {
        Query::new(self.inner.take(n))
    }
}

impl<I> Iterator for Query<'_, I> {
    type Item = I;

    fn next(&mut self) -> Option<I> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<I> fmt::Debug for Query<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").finish_non_exhaustive()
    }
}

struct OrderBy<'a, I, C> {
    upstream: Option<Box<dyn Iterator<Item = I> + 'a>>,
    cmp: C,
    sorted: std::vec::IntoIter<I>,
}

impl<I, C> Iterator for OrderBy<'_, I, C>
where
    C: FnMut(&I, &I) -> Ordering,
{
    type Item = I;

    fn next(&mut self) -> Option<I> {
        if let Some(upstream) = self.upstream.take() {
            let mut all: Vec<I> = upstream.collect();
            all.sort_by(&mut self.cmp);
            self.sorted = all.into_iter();
        }
        self.sorted.next()
    }
}
