//! Conversation database operations

use chrono::Utc;
use rusqlite::Result as SqliteResult;

use super::super::Database;
use crate::models::Conversation;

impl Database {
    /// Create a conversation or touch its updated_at. The title sticks to
    /// whatever the conversation was created with.
    pub fn upsert_conversation(&self, id: &str, user_id: &str, title: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO conversations (id, user_id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
            rusqlite::params![id, user_id, title, &now, &now],
        )?;

        Ok(())
    }

    /// List a user's conversations, most recently active first
    pub fn list_conversations(&self, user_id: &str) -> SqliteResult<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, created_at, updated_at
             FROM conversations WHERE user_id = ?1 ORDER BY updated_at DESC",
        )?;

        let conversations = stmt
            .query_map([user_id], |row| Self::row_to_conversation(row))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(conversations)
    }

    /// Delete a conversation and its messages. Returns the number of
    /// conversation rows removed (0 when the id/user pair does not match).
    pub fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> SqliteResult<usize> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM chat_messages WHERE conversation_id = ?1 AND user_id = ?2",
            [conversation_id, user_id],
        )?;

        let deleted = conn.execute(
            "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2",
            [conversation_id, user_id],
        )?;

        Ok(deleted)
    }

    fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
        Ok(Conversation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_upsert_keeps_original_title() {
        let (_dir, db) = test_db();

        db.upsert_conversation("c1", "farmer-1", "wheat price in punjab").unwrap();
        db.upsert_conversation("c1", "farmer-1", "a different title").unwrap();

        let conversations = db.list_conversations("farmer-1").unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].title, "wheat price in punjab");
    }

    #[test]
    fn test_list_orders_by_recent_activity() {
        let (_dir, db) = test_db();

        db.upsert_conversation("c1", "farmer-1", "first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.upsert_conversation("c2", "farmer-1", "second").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        db.upsert_conversation("c1", "farmer-1", "first").unwrap();

        let conversations = db.list_conversations("farmer-1").unwrap();
        let ids: Vec<&str> = conversations.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);

        assert!(db.list_conversations("someone-else").unwrap().is_empty());
    }

    #[test]
    fn test_delete_checks_owner_and_cascades() {
        use crate::locale::Language;
        use crate::models::NewChatMessage;

        let (_dir, db) = test_db();
        db.upsert_conversation("c1", "farmer-1", "t").unwrap();
        db.append_chat_message(&NewChatMessage {
            conversation_id: "c1".to_string(),
            user_id: "farmer-1".to_string(),
            role: "user".to_string(),
            content: "hello".to_string(),
            language: Language::En,
            tools_used: Vec::new(),
        })
        .unwrap();

        assert_eq!(db.delete_conversation("c1", "wrong-user").unwrap(), 0);
        assert_eq!(db.list_conversations("farmer-1").unwrap().len(), 1);

        assert_eq!(db.delete_conversation("c1", "farmer-1").unwrap(), 1);
        assert!(db.list_conversations("farmer-1").unwrap().is_empty());
        assert!(db.list_chat_messages("c1", "farmer-1").unwrap().is_empty());
    }
}
