//! Chat message database operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;
use uuid::Uuid;

use super::super::Database;
use crate::locale::Language;
use crate::models::{ChatTurn, NewChatMessage, StoredMessage};

impl Database {
    /// Append one message to a conversation transcript
    pub fn append_chat_message(&self, message: &NewChatMessage) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let tools_used =
            serde_json::to_string(&message.tools_used).unwrap_or_else(|_| "[]".to_string());

        conn.execute(
            "INSERT INTO chat_messages (id, conversation_id, user_id, role, content, language, tools_used, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id,
                message.conversation_id,
                message.user_id,
                message.role,
                message.content,
                message.language.as_ref(),
                tools_used,
                &now
            ],
        )?;

        Ok(())
    }

    /// Fetch the most recent `limit` turns of a conversation, returned
    /// oldest first so they can be fed straight into a prompt.
    pub fn recent_chat_turns(
        &self,
        conversation_id: &str,
        user_id: &str,
        limit: u32,
    ) -> SqliteResult<Vec<ChatTurn>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT role, content, language, tools_used
             FROM chat_messages WHERE conversation_id = ?1 AND user_id = ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3",
        )?;

        let mut turns: Vec<ChatTurn> = stmt
            .query_map(
                rusqlite::params![conversation_id, user_id, limit],
                |row| {
                    let language: String = row.get(2)?;
                    let tools_used: String = row.get(3)?;
                    Ok(ChatTurn {
                        role: row.get(0)?,
                        content: row.get(1)?,
                        language: Language::from_code(&language).unwrap_or_default(),
                        tools_used: serde_json::from_str(&tools_used).unwrap_or_default(),
                    })
                },
            )?
            .filter_map(|r| r.ok())
            .collect();

        turns.reverse();
        Ok(turns)
    }

    /// Full transcript of a conversation, oldest first
    pub fn list_chat_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> SqliteResult<Vec<StoredMessage>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, user_id, role, content, language, tools_used, created_at
             FROM chat_messages WHERE conversation_id = ?1 AND user_id = ?2
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let messages = stmt
            .query_map([conversation_id, user_id], |row| {
                Self::row_to_stored_message(row)
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(messages)
    }

    fn row_to_stored_message(row: &rusqlite::Row) -> rusqlite::Result<StoredMessage> {
        let language: String = row.get(5)?;
        let tools_used: String = row.get(6)?;

        Ok(StoredMessage {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            user_id: row.get(2)?,
            role: row.get(3)?,
            content: row.get(4)?,
            language: Language::from_code(&language).unwrap_or_default(),
            tools_used: serde_json::from_str(&tools_used).unwrap_or_default(),
            created_at: row.get(7)?,
        })
    }
}
