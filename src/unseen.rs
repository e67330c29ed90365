use crate::{db::Db, errors::ApiError};
use sqlx::Row;
use std::collections::HashMap;

/// Per-counterpart unseen message counts for `requester`. Sparse: a
/// counterpart with nothing unseen is simply absent. Always derived from the
/// `seen` column, so this and the clearing done by a conversation fetch can
/// never disagree about the same rows.
pub async fn compute_all(db: &Db, requester_id: &str) -> Result<HashMap<String, i64>, ApiError> {
    let rows = sqlx::query(
        "SELECT sender_id, COUNT(*) AS unseen FROM messages
         WHERE receiver_id = ? AND seen = 0
         GROUP BY sender_id",
    )
    .bind(requester_id)
    .fetch_all(&db.0)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| (r.get("sender_id"), r.get("unseen")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MessageStore;
    use crate::test_util::{insert_user, new_message};

    #[actix_web::test]
    async fn counts_are_sparse_and_per_sender() {
        let db = Db::connect_in_memory().await.unwrap();
        insert_user(&db, "a").await;
        insert_user(&db, "b").await;
        insert_user(&db, "c").await;
        let store = MessageStore::new(db.clone());

        for i in 0..3 {
            store
                .insert(&new_message("a", "c", &format!("from a #{i}")))
                .await
                .unwrap();
        }
        store.insert(&new_message("b", "c", "from b")).await.unwrap();
        // traffic in the other direction must not count
        store.insert(&new_message("c", "a", "reply")).await.unwrap();

        let counts = compute_all(&db, "c").await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get("a"), Some(&3));
        assert_eq!(counts.get("b"), Some(&1));

        assert_eq!(compute_all(&db, "b").await.unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn fetch_clears_the_pair_count_only() {
        let db = Db::connect_in_memory().await.unwrap();
        insert_user(&db, "a").await;
        insert_user(&db, "b").await;
        insert_user(&db, "c").await;
        let store = MessageStore::new(db.clone());

        store.insert(&new_message("a", "c", "one")).await.unwrap();
        store.insert(&new_message("b", "c", "two")).await.unwrap();

        store.fetch_and_mark_seen("c", "a").await.unwrap();

        let counts = compute_all(&db, "c").await.unwrap();
        assert!(!counts.contains_key("a"));
        assert_eq!(counts.get("b"), Some(&1));
    }
}
