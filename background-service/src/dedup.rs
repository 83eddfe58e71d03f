use std::collections::{HashSet, VecDeque};

/// Bounded set of post ids already replied to. Oldest ids are evicted first.
#[derive(Debug, Clone, Default)]
pub struct RecentlySeen {
    capacity: usize,
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl RecentlySeen {
    /// A capacity of 0 remembers nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: &str) {
        if self.capacity == 0 || self.ids.contains(id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
