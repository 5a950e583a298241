//! Per-chat mutual exclusion for the context-build and model-call window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while a chat has a model call in flight. Dropping it releases the chat.
pub type ChatGuard = OwnedMutexGuard<()>;

/// One async mutex per chat id, created on demand.
///
/// Waiters are admitted in FIFO order. Entries nobody holds or waits on are
/// pruned on the next acquisition.
#[derive(Default)]
pub struct ChatLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ChatLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `chat_id` is free and take it.
    pub async fn acquire(&self, chat_id: &str) -> ChatGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|id, lock| id == chat_id || Arc::strong_count(lock) > 1);
            locks
                .entry(chat_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Whether a cycle currently holds `chat_id`.
    #[cfg(test)]
    fn is_busy(&self, chat_id: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .get(chat_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of tracked chats.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
