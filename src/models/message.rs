use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub image: String,
    pub seen: bool,
    pub is_edited: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}
