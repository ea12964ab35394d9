//! Response and conversation caching.
//!
//! Each tier is two-level: a moka in-process cache in front of a durable
//! key/value table in the SQLite store. Reads go in-process first and fall
//! through to the durable level, warming the in-process level on the way
//! back; writes land in both. The durable level is optional and every
//! durable failure degrades to in-memory-only behavior, so a broken or
//! absent database never takes the cache down with it. Values are stored
//! as JSON strings; an entry that no longer decodes is treated as a miss
//! and evicted from both levels.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

use crate::db::Database;
use crate::locale::Language;
use crate::models::{CachedReply, ChatTurn};

const MAX_ENTRIES: u64 = 10_000;

pub struct CacheService {
    responses: Cache<String, String>,
    conversations: Cache<String, String>,
    durable: Option<Arc<Database>>,
    response_ttl: Duration,
    conversation_ttl: Duration,
}

impl CacheService {
    pub fn new(
        response_ttl: Duration,
        conversation_ttl: Duration,
        durable: Option<Arc<Database>>,
    ) -> Self {
        CacheService {
            responses: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(response_ttl)
                .build(),
            conversations: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .time_to_live(conversation_ttl)
                .build(),
            durable,
            response_ttl,
            conversation_ttl,
        }
    }

    /// Fingerprint for one (user, message, language) question. The message
    /// is trimmed and lowercased so trivial rephrasings share an entry.
    pub fn response_key(user_id: &str, message: &str, language: Language) -> String {
        let normalized = message.trim().to_lowercase();
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", user_id, normalized, language.as_ref()));
        format!("response:{}", hex::encode(hasher.finalize()))
    }

    pub fn conversation_key(conversation_id: &str, user_id: &str) -> String {
        format!("conv:{}:{}", conversation_id, user_id)
    }

    pub fn get_response(&self, key: &str) -> Option<CachedReply> {
        // Warming only on a durable hit keeps the in-process TTL absolute;
        // re-inserting on every read would turn it into time-to-idle.
        let (raw, from_durable) = match self.responses.get(key) {
            Some(raw) => (raw, false),
            None => (self.durable_get(key)?, true),
        };
        match serde_json::from_str(&raw) {
            Ok(reply) => {
                if from_durable {
                    self.responses.insert(key.to_string(), raw);
                }
                Some(reply)
            }
            Err(e) => {
                log::warn!("[CACHE] Evicting undecodable response entry: {}", e);
                self.evict(&self.responses, key);
                None
            }
        }
    }

    pub fn put_response(&self, key: String, reply: &CachedReply) {
        match serde_json::to_string(reply) {
            Ok(raw) => {
                self.durable_put(&key, &raw, self.response_ttl);
                self.responses.insert(key, raw);
            }
            Err(e) => log::warn!("[CACHE] Failed to serialize response entry: {}", e),
        }
    }

    pub fn get_conversation(&self, key: &str) -> Option<Vec<ChatTurn>> {
        let (raw, from_durable) = match self.conversations.get(key) {
            Some(raw) => (raw, false),
            None => (self.durable_get(key)?, true),
        };
        match serde_json::from_str(&raw) {
            Ok(turns) => {
                if from_durable {
                    self.conversations.insert(key.to_string(), raw);
                }
                Some(turns)
            }
            Err(e) => {
                log::warn!("[CACHE] Evicting undecodable conversation entry: {}", e);
                self.evict(&self.conversations, key);
                None
            }
        }
    }

    pub fn put_conversation(&self, key: String, turns: &[ChatTurn]) {
        match serde_json::to_string(turns) {
            Ok(raw) => {
                self.durable_put(&key, &raw, self.conversation_ttl);
                self.conversations.insert(key, raw);
            }
            Err(e) => log::warn!("[CACHE] Failed to serialize conversation entry: {}", e),
        }
    }

    /// Drop the cached history for one conversation, called after every
    /// write so readers never see a stale tail.
    pub fn invalidate_conversation(&self, conversation_id: &str, user_id: &str) {
        let key = Self::conversation_key(conversation_id, user_id);
        self.evict(&self.conversations, &key);
    }

    pub fn response_entries(&self) -> u64 {
        self.responses.entry_count()
    }

    pub fn conversation_entries(&self) -> u64 {
        self.conversations.entry_count()
    }

    fn durable_get(&self, key: &str) -> Option<String> {
        let db = self.durable.as_ref()?;
        match db.get_cache_entry(key) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("[CACHE] Durable read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn durable_put(&self, key: &str, value: &str, ttl: Duration) {
        if let Some(db) = &self.durable {
            if let Err(e) = db.put_cache_entry(key, value, ttl) {
                log::debug!("[CACHE] Durable write failed for {}: {}", key, e);
            }
        }
    }

    /// Remove an entry from both levels.
    fn evict(&self, tier: &Cache<String, String>, key: &str) {
        tier.invalidate(key);
        if let Some(db) = &self.durable {
            if let Err(e) = db.delete_cache_entry(key) {
                log::debug!("[CACHE] Durable delete failed for {}: {}", key, e);
            }
        }
    }
}
