use crate::db::Db;
use crate::models::Message;
use chrono::Utc;

pub async fn insert_user(db: &Db, id: &str) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users(id, full_name, email, password_hash, bio, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(format!("{id} test"))
    .bind(format!("{id}@example.org"))
    .bind("x")
    .bind("")
    .bind(now)
    .bind(now)
    .execute(&db.0)
    .await
    .expect("insert test user");
}

pub fn new_message(sender: &str, receiver: &str, text: &str) -> Message {
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        sender_id: sender.to_string(),
        receiver_id: receiver.to_string(),
        text: text.to_string(),
        image: String::new(),
        seen: false,
        is_edited: false,
        deleted: false,
        created_at: Utc::now(),
    }
}
