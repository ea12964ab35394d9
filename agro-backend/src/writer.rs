//! Write-behind persistence worker.
//!
//! Chat exchanges are persisted off the request path through a bounded
//! queue drained by one background task. Enqueue failure (queue full,
//! worker gone) is visible to the caller instead of silently dropped, and
//! the worker keeps counters the metrics endpoint exposes. `shutdown`
//! drains whatever is queued before the process exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::cache::CacheService;
use crate::db::Database;
use crate::locale::Language;
use crate::models::NewChatMessage;

/// Conversation titles are the first user message, clipped to this length.
const TITLE_MAX_CHARS: usize = 50;

/// One user/assistant exchange to persist.
#[derive(Debug, Clone)]
pub struct ExchangeRecord {
    pub conversation_id: String,
    pub user_id: String,
    pub user_message: String,
    pub user_language: Language,
    pub assistant_message: String,
    pub assistant_language: Language,
    pub tools_used: Vec<String>,
}

enum WriteJob {
    Exchange(ExchangeRecord),
    Shutdown,
}

pub struct MessageWriter {
    tx: mpsc::Sender<WriteJob>,
    handle: Mutex<Option<JoinHandle<()>>>,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriterStats {
    pub queued: usize,
    pub completed: u64,
    pub failed: u64,
}

impl MessageWriter {
    /// Start the worker task and hand back the queue handle.
    pub fn spawn(db: Arc<Database>, cache: Arc<CacheService>, queue_size: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<WriteJob>(queue_size);
        let completed = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let worker_completed = completed.clone();
        let worker_failed = failed.clone();
        let handle = tokio::spawn(async move {
            log::info!("[WRITER] Persistence worker started");
            while let Some(job) = rx.recv().await {
                match job {
                    WriteJob::Exchange(record) => match persist_exchange(&db, &record) {
                        Ok(()) => {
                            // Cached history is stale the moment new turns land.
                            cache.invalidate_conversation(&record.conversation_id, &record.user_id);
                            worker_completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            log::error!(
                                "[WRITER] Failed to persist exchange for {}: {}",
                                record.conversation_id,
                                e
                            );
                            worker_failed.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    WriteJob::Shutdown => break,
                }
            }
            log::info!("[WRITER] Persistence worker stopped");
        });

        MessageWriter {
            tx,
            handle: Mutex::new(Some(handle)),
            completed,
            failed,
        }
    }

    /// Queue one exchange for persistence. Fails when the queue is full or
    /// the worker is gone; the caller decides whether that is fatal.
    pub fn enqueue(&self, record: ExchangeRecord) -> Result<(), String> {
        self.tx
            .try_send(WriteJob::Exchange(record))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => "write queue full".to_string(),
                mpsc::error::TrySendError::Closed(_) => "write queue closed".to_string(),
            })
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            queued: self.tx.max_capacity().saturating_sub(self.tx.capacity()),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Flush queued jobs and stop the worker.
    pub async fn shutdown(&self) {
        if self.tx.send(WriteJob::Shutdown).await.is_err() {
            // Worker already stopped.
            return;
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::warn!("[WRITER] Worker join failed: {}", e);
            }
        }
    }
}

fn persist_exchange(db: &Database, record: &ExchangeRecord) -> Result<(), String> {
    let title: String = record.user_message.chars().take(TITLE_MAX_CHARS).collect();
    db.upsert_conversation(&record.conversation_id, &record.user_id, &title)
        .map_err(|e| format!("Failed to upsert conversation: {}", e))?;

    db.append_chat_message(&NewChatMessage {
        conversation_id: record.conversation_id.clone(),
        user_id: record.user_id.clone(),
        role: "user".to_string(),
        content: record.user_message.clone(),
        language: record.user_language,
        tools_used: Vec::new(),
    })
    .map_err(|e| format!("Failed to store user message: {}", e))?;

    db.append_chat_message(&NewChatMessage {
        conversation_id: record.conversation_id.clone(),
        user_id: record.user_id.clone(),
        role: "assistant".to_string(),
        content: record.assistant_message.clone(),
        language: record.assistant_language,
        tools_used: record.tools_used.clone(),
    })
    .map_err(|e| format!("Failed to store assistant message: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(user_message: &str) -> ExchangeRecord {
        ExchangeRecord {
            conversation_id: "c1".to_string(),
            user_id: "farmer-1".to_string(),
            user_message: user_message.to_string(),
            user_language: Language::En,
            assistant_message: "2275 rupees per quintal".to_string(),
            assistant_language: Language::En,
            tools_used: vec!["crop-price".to_string()],
        }
    }

    #[tokio::test]
    async fn test_exchange_is_flushed_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(dir.path().join("w.db").to_str().unwrap()).unwrap());
        let cache = Arc::new(CacheService::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            Some(db.clone()),
        ));

        // Seed a cached history entry; the worker must invalidate it.
        let key = CacheService::conversation_key("c1", "farmer-1");
        cache.put_conversation(key.clone(), &[]);

        let writer = MessageWriter::spawn(db.clone(), cache.clone(), 8);
        writer.enqueue(record("wheat price in punjab")).unwrap();
        writer.shutdown().await;

        let turns = db.recent_chat_turns("c1", "farmer-1", 10).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[1].role, "assistant");
        assert_eq!(turns[1].tools_used, vec!["crop-price"]);

        let conversations = db.list_conversations("farmer-1").unwrap();
        assert_eq!(conversations[0].title, "wheat price in punjab");

        assert!(cache.get_conversation(&key).is_none());

        let stats = writer.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn test_title_is_clipped() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(dir.path().join("w.db").to_str().unwrap()).unwrap());
        let cache = Arc::new(CacheService::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            None,
        ));

        let long_message = "x".repeat(80);
        let writer = MessageWriter::spawn(db.clone(), cache, 8);
        writer.enqueue(record(&long_message)).unwrap();
        writer.shutdown().await;

        let conversations = db.list_conversations("farmer-1").unwrap();
        assert_eq!(conversations[0].title.chars().count(), TITLE_MAX_CHARS);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_observable() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new(dir.path().join("w.db").to_str().unwrap()).unwrap());
        let cache = Arc::new(CacheService::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            None,
        ));

        let writer = MessageWriter::spawn(db, cache, 8);
        writer.shutdown().await;

        let err = writer.enqueue(record("late message")).unwrap_err();
        assert_eq!(err, "write queue closed");
    }
}
