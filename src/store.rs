use crate::{db::Db, errors::ApiError, models::Message};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

fn row_to_message(r: &SqliteRow) -> Message {
    Message {
        id: r.get("id"),
        sender_id: r.get("sender_id"),
        receiver_id: r.get("receiver_id"),
        text: r.get("text"),
        image: r.get("image"),
        seen: r.get::<i64, _>("seen") != 0,
        is_edited: r.get::<i64, _>("is_edited") != 0,
        deleted: r.get::<i64, _>("deleted") != 0,
        created_at: r.get("created_at"),
    }
}

/// Message persistence. Every mutation is a single guarded statement, so a
/// transition either applies whole or not at all; `rows_affected` tells the
/// caller whether the expected prior state still held.
#[derive(Clone)]
pub struct MessageStore {
    db: Db,
}

impl MessageStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn insert(&self, msg: &Message) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT INTO messages(id, sender_id, receiver_id, text, image, seen, is_edited, deleted, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&msg.id)
        .bind(&msg.sender_id)
        .bind(&msg.receiver_id)
        .bind(&msg.text)
        .bind(&msg.image)
        .bind(msg.seen as i64)
        .bind(msg.is_edited as i64)
        .bind(msg.deleted as i64)
        .bind(msg.created_at)
        .execute(&self.db.0)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Message>, ApiError> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db.0)
            .await?;
        Ok(row.as_ref().map(row_to_message))
    }

    /// Marks every unseen message from `counterpart` to `requester` seen and
    /// returns the whole conversation in creation order. Runs in one
    /// transaction so the unseen count and the returned seen flags cannot
    /// drift apart under a concurrent send.
    pub async fn fetch_and_mark_seen(
        &self,
        requester: &str,
        counterpart: &str,
    ) -> Result<Vec<Message>, ApiError> {
        let mut tx = self.db.0.begin().await?;

        sqlx::query(
            "UPDATE messages SET seen = 1
             WHERE sender_id = ? AND receiver_id = ? AND seen = 0",
        )
        .bind(counterpart)
        .bind(requester)
        .execute(&mut *tx)
        .await?;

        let rows = sqlx::query(
            "SELECT * FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(requester)
        .bind(counterpart)
        .bind(counterpart)
        .bind(requester)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    pub async fn mark_seen(&self, id: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE messages SET seen = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.db.0)
            .await?;
        Ok(())
    }

    /// Applies an edit only while the message is still active.
    pub async fn apply_edit(&self, id: &str, text: &str) -> Result<u64, ApiError> {
        let res = sqlx::query(
            "UPDATE messages SET text = ?, is_edited = 1 WHERE id = ? AND deleted = 0",
        )
        .bind(text)
        .bind(id)
        .execute(&self.db.0)
        .await?;
        Ok(res.rows_affected())
    }

    /// Clears content and flags the row deleted, only from the active state.
    pub async fn apply_soft_delete(&self, id: &str) -> Result<u64, ApiError> {
        let res = sqlx::query(
            "UPDATE messages SET text = '', image = '', deleted = 1 WHERE id = ? AND deleted = 0",
        )
        .bind(id)
        .execute(&self.db.0)
        .await?;
        Ok(res.rows_affected())
    }

    pub async fn remove(&self, id: &str) -> Result<u64, ApiError> {
        let res = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.db.0)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn user_exists(&self, id: &str) -> Result<bool, ApiError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db.0)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{insert_user, new_message};

    #[actix_web::test]
    async fn edit_is_refused_once_deleted() {
        let db = Db::connect_in_memory().await.unwrap();
        let store = MessageStore::new(db);
        insert_user(&store.db, "a").await;
        insert_user(&store.db, "b").await;

        let msg = new_message("a", "b", "hi");
        store.insert(&msg).await.unwrap();

        assert_eq!(store.apply_soft_delete(&msg.id).await.unwrap(), 1);
        assert_eq!(store.apply_edit(&msg.id, "late edit").await.unwrap(), 0);
        // re-delete is equally refused
        assert_eq!(store.apply_soft_delete(&msg.id).await.unwrap(), 0);

        let row = store.find_by_id(&msg.id).await.unwrap().unwrap();
        assert!(row.deleted);
        assert_eq!(row.text, "");
        assert_eq!(row.image, "");
    }

    #[actix_web::test]
    async fn fetch_marks_only_incoming_direction() {
        let db = Db::connect_in_memory().await.unwrap();
        let store = MessageStore::new(db);
        insert_user(&store.db, "a").await;
        insert_user(&store.db, "b").await;

        store.insert(&new_message("a", "b", "to b")).await.unwrap();
        store.insert(&new_message("b", "a", "to a")).await.unwrap();

        let msgs = store.fetch_and_mark_seen("b", "a").await.unwrap();
        assert_eq!(msgs.len(), 2);
        for m in &msgs {
            if m.receiver_id == "b" {
                assert!(m.seen, "incoming message should be marked seen");
            } else {
                assert!(!m.seen, "outgoing message must be untouched");
            }
        }
    }

    #[actix_web::test]
    async fn removed_id_resolves_to_nothing() {
        let db = Db::connect_in_memory().await.unwrap();
        let store = MessageStore::new(db);
        insert_user(&store.db, "a").await;
        insert_user(&store.db, "b").await;

        let msg = new_message("a", "b", "hi");
        store.insert(&msg).await.unwrap();
        assert_eq!(store.remove(&msg.id).await.unwrap(), 1);
        assert!(store.find_by_id(&msg.id).await.unwrap().is_none());
        assert_eq!(store.remove(&msg.id).await.unwrap(), 0);
    }
}
