use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub bio: String,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone)]
pub struct PublicUser {
    pub id: String,
    pub full_name: String,
    pub bio: String,
    pub profile_pic: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self { id: u.id, full_name: u.full_name, bio: u.bio, profile_pic: u.profile_pic }
    }
}
