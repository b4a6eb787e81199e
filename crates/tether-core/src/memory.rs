//! Memory Store Abstraction
//!
//! Threads are persisted through this minimal keyed interface. The store is
//! the only shared mutable resource in the system; implementations must be
//! safe under concurrent access from unrelated threads, but no cross-thread
//! transactions are required.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::thread::{Thread, ThreadId};

/// Persistence contract for threads, keyed by id
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetch a thread by id; `Ok(None)` when absent
    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>>;

    /// Persist a thread (insert or replace)
    async fn set(&self, thread: &Thread) -> Result<()>;

    /// Remove a thread
    async fn delete(&self, id: &ThreadId) -> Result<()>;

    /// All stored threads; for auditing/listing, not the hot path
    async fn all(&self) -> Result<Vec<Thread>>;
}

/// In-memory store for development and isolated test instances
#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: tokio::sync::RwLock<HashMap<ThreadId, Thread>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryThreadStore {
    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>> {
        let threads = self.threads.read().await;
        Ok(threads.get(id).cloned())
    }

    async fn set(&self, thread: &Thread) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.insert(thread.id.clone(), thread.clone());
        Ok(())
    }

    async fn delete(&self, id: &ThreadId) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.remove(id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Thread>> {
        let threads = self.threads.read().await;
        let mut all: Vec<_> = threads.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryThreadStore::new();
        let thread = Thread::seeded("hello");
        let id = thread.id.clone();

        store.set(&thread).await.unwrap();
        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.len(), 1);

        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_lists_every_thread() {
        let store = InMemoryThreadStore::new();
        store.set(&Thread::seeded("one")).await.unwrap();
        store.set(&Thread::seeded("two")).await.unwrap();

        assert_eq!(store.all().await.unwrap().len(), 2);
    }
}
