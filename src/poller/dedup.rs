//! Bounded set of recently accepted event ids.
//!
//! Approximate: when a tick's accepted ids would push it past capacity, the
//! cache is cleared entirely before they are recorded. Older ids can then be
//! accepted again; the freshness horizon on the poller keeps that window
//! small. Ids from the tick that triggered the reset always survive it.

use std::collections::HashSet;

pub const DEFAULT_CAPACITY: usize = 255;

#[derive(Debug)]
pub struct RecentEventCache {
    seen: HashSet<String>,
    /// Arrival order, for logging what a reset dropped.
    order: Vec<String>,
    capacity: usize,
}

impl RecentEventCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity + 1),
            order: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record one accepted id. See [`record_batch`](Self::record_batch).
    pub fn record(&mut self, id: &str) -> bool {
        self.record_batch([id])
    }

    /// Record the ids accepted in one tick. If they would take the cache past
    /// capacity it is cleared first. Returns true when that reset happened.
    pub fn record_batch<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        let fresh: Vec<&str> = ids
            .into_iter()
            .filter(|id| !self.seen.contains(*id))
            .collect();

        let reset = self.seen.len() + fresh.len() > self.capacity;
        if reset {
            self.seen.clear();
            self.order.clear();
        }

        for id in fresh {
            if self.seen.insert(id.to_string()) {
                self.order.push(id.to_string());
            }
        }
        reset
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn oldest(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }
}

impl Default for RecentEventCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
