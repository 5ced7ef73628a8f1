//! Cache plan generation.
//!
//! Groups the positions of a collection by derived cache key so that each key
//! is fetched and rendered once and fanned back out to every position.

use std::collections::HashMap;
use std::fmt;

use super::keys::CacheKey;

/// One distinct key of a render call.
#[derive(Debug)]
pub struct PlanEntry<'a, T> {
    pub key: CacheKey,
    /// Object rendered on a miss. When several positions share the key the
    /// latest one wins.
    pub model: &'a T,
    /// Collection positions that receive this entry's value, ascending.
    pub positions: Vec<usize>,
}

/// Key plan for one render call.
///
/// Entries are kept in order of first appearance; positions inside an entry
/// are in collection order.
#[derive(Debug)]
pub struct CachePlan<'a, T> {
    entries: Vec<PlanEntry<'a, T>>,
    index: HashMap<CacheKey, usize>,
    len: usize,
}

impl<T> Default for CachePlan<'_, T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            len: 0,
        }
    }
}

impl<T> fmt::Display for CachePlan<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CachePlan {{ positions: {}, distinct_keys: {} }}",
            self.len,
            self.entries.len()
        )
    }
}

impl<'a, T> CachePlan<'a, T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            len: 0,
        }
    }

    /// Record the key derived for the next collection position.
    pub fn push(&mut self, key: CacheKey, model: &'a T) {
        let position = self.len;
        self.len += 1;

        match self.index.get(&key) {
            Some(&slot) => {
                let entry = &mut self.entries[slot];
                entry.model = model;
                entry.positions.push(position);
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(PlanEntry {
                    key,
                    model,
                    positions: vec![position],
                });
            }
        }
    }

    /// Distinct keys in first-appearance order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }

    pub fn entries(&self) -> &[PlanEntry<'a, T>] {
        &self.entries
    }

    /// Number of collection positions covered.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn distinct_len(&self) -> usize {
        self.entries.len()
    }
}
