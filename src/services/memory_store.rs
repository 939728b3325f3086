// src/services/memory_store.rs
use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-memory table keyed by id that remembers insertion order.
/// Nothing here is persisted; state resets with the process.
pub struct MemoryStore<T> {
    entries: RwLock<Entries<T>>,
}

pub struct Entries<T> {
    by_id: HashMap<String, T>,
    order: Vec<String>,
}

impl<T> Entries<T> {
    fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.by_id.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.by_id.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn insert(&mut self, id: String, value: T) {
        if self.by_id.insert(id.clone(), value).is_none() {
            self.order.push(id);
        }
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.by_id.values_mut()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::new()),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Entries<T>> {
        self.entries.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Entries<T>> {
        self.entries.write().await
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn insert(&self, id: String, value: T) {
        self.entries.write().await.insert(id, value);
    }

    /// Mutate one entry under the write lock; `None` when the id is unknown.
    pub async fn update<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.entries.write().await.get_mut(id).map(f)
    }

    /// Cloned values matching `predicate`, in insertion order.
    pub async fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.entries
            .read()
            .await
            .values()
            .filter(|v| predicate(*v))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl<T: Clone> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
