pub mod message;
pub mod user;

pub use message::Message;
pub use user::{PublicUser, User};
