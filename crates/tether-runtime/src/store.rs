//! File-backed thread store
//!
//! Persists each thread as one pretty-printed JSON document under a root
//! directory, named `<thread-id>.json`. Suitable for single-process
//! deployments; listing tolerates corrupt files by skipping them with a
//! warning so one bad document cannot take down auditing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use tether_core::error::{AgentError, Result};
use tether_core::memory::MemoryStore;
use tether_core::thread::{Thread, ThreadId};

/// Thread store writing one JSON file per thread
pub struct FileThreadStore {
    root: PathBuf,
}

impl FileThreadStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| AgentError::Store(format!("cannot create store root: {e}")))?;
        Ok(Self { root })
    }

    /// Resolve a thread's file path. Ids carrying path separators or
    /// parent components never touch the filesystem.
    fn path_for(&self, id: &ThreadId) -> Result<PathBuf> {
        let raw = id.as_str();
        if raw.contains(['/', '\\']) || raw.contains("..") {
            return Err(AgentError::Store(format!("invalid thread id '{raw}'")));
        }
        Ok(self.root.join(format!("{raw}.json")))
    }

    async fn read_thread(path: &Path) -> Result<Thread> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AgentError::Store(format!("cannot read thread file: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AgentError::Store(format!("corrupt thread file: {e}")))
    }
}

#[async_trait]
impl MemoryStore for FileThreadStore {
    async fn get(&self, id: &ThreadId) -> Result<Option<Thread>> {
        let path = self.path_for(id)?;
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AgentError::Store(e.to_string()))?
        {
            return Ok(None);
        }
        Self::read_thread(&path).await.map(Some)
    }

    async fn set(&self, thread: &Thread) -> Result<()> {
        let json = serde_json::to_vec_pretty(thread)
            .map_err(|e| AgentError::Store(format!("cannot serialize thread: {e}")))?;
        tokio::fs::write(self.path_for(&thread.id)?, json)
            .await
            .map_err(|e| AgentError::Store(format!("cannot write thread file: {e}")))
    }

    async fn delete(&self, id: &ThreadId) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(id)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AgentError::Store(format!("cannot delete thread file: {e}"))),
        }
    }

    async fn all(&self) -> Result<Vec<Thread>> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| AgentError::Store(format!("cannot list store root: {e}")))?;

        let mut threads = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| AgentError::Store(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_thread(&path).await {
                Ok(thread) => threads.push(thread),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable thread file: {}", e);
                }
            }
        }

        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }
}
