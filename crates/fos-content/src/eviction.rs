//! Eviction policy
//!
//! Unreferenced entries are kept warm until their combined size exceeds
//! the budget, then reclaimed least-recently-unreferenced first.

use std::collections::{BTreeMap, HashMap};

use crate::ResourceId;

/// LRU over zero-reference entries
#[derive(Debug)]
pub struct LruPolicy {
    budget: usize,
    /// id -> (stamp, size)
    candidates: HashMap<ResourceId, (u64, usize)>,
    /// stamp -> id, oldest first
    order: BTreeMap<u64, ResourceId>,
    evictable_bytes: usize,
    clock: u64,
}

impl LruPolicy {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            candidates: HashMap::new(),
            order: BTreeMap::new(),
            evictable_bytes: 0,
            clock: 0,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn set_budget(&mut self, budget: usize) {
        self.budget = budget;
    }

    /// Total size of evictable entries
    pub fn evictable_bytes(&self) -> usize {
        self.evictable_bytes
    }

    pub fn is_candidate(&self, id: &ResourceId) -> bool {
        self.candidates.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Last reference dropped. Pinned entries are never offered.
    pub fn mark_unreferenced(&mut self, id: &ResourceId, size: usize, pinned: bool) {
        self.remove(id);
        if pinned {
            return;
        }
        self.clock += 1;
        self.candidates.insert(id.clone(), (self.clock, size));
        self.order.insert(self.clock, id.clone());
        self.evictable_bytes += size;
    }

    /// Entry referenced again
    pub fn mark_referenced(&mut self, id: &ResourceId) {
        self.remove(id);
    }

    /// Forget an entry
    pub fn remove(&mut self, id: &ResourceId) -> bool {
        match self.candidates.remove(id) {
            Some((stamp, size)) => {
                self.order.remove(&stamp);
                self.evictable_bytes -= size;
                true
            }
            None => false,
        }
    }

    /// Pop entries, oldest first, until the evictable set fits the budget
    pub fn select_victims(&mut self) -> Vec<ResourceId> {
        let mut victims = Vec::new();
        while self.evictable_bytes > self.budget {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            if let Some((_, size)) = self.candidates.remove(&id) {
                self.evictable_bytes -= size;
            }
            victims.push(id);
        }
        victims
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
        self.order.clear();
        self.evictable_bytes = 0;
    }
}
