//! Message lifecycle engine.
//!
//! A message moves Active -> (Edited)* -> SoftDeleted -> Gone, or straight
//! from Active to Gone. Only the sender may edit or delete; only the
//! receiver's actions mark a message seen. Every transition is a single
//! guarded store statement, so two racing mutations on one id resolve to
//! exactly one winner and the loser gets `Conflict`.
//!
//! "Delete for me" has no server surface at all: it is a client-local hide
//! that is never persisted or fanned out, and resets when the viewer switches
//! conversations.

use actix::Addr;
use chrono::Utc;

use crate::errors::ApiError;
use crate::models::Message;
use crate::store::MessageStore;
use crate::ws::server::{ChatServer, Deliver, PushEvent};

pub async fn send(
    store: &MessageStore,
    chat: &Addr<ChatServer>,
    sender_id: &str,
    receiver_id: &str,
    text: Option<String>,
    image_url: Option<String>,
) -> Result<Message, ApiError> {
    let text = text.map(|t| t.trim().to_string()).unwrap_or_default();
    let image = image_url.unwrap_or_default();
    if text.is_empty() && image.is_empty() {
        return Err(ApiError::BadRequest("message must have text or image".into()));
    }
    if !store.user_exists(receiver_id).await? {
        return Err(ApiError::NotFound);
    }

    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        sender_id: sender_id.to_string(),
        receiver_id: receiver_id.to_string(),
        text,
        image,
        seen: false,
        is_edited: false,
        deleted: false,
        created_at: Utc::now(),
    };
    store.insert(&message).await?;

    // Fire-and-forget: an offline or slow receiver never fails the send.
    chat.do_send(Deliver {
        user_id: receiver_id.to_string(),
        event: PushEvent::NewMessage {
            message: message.clone(),
        },
    });

    Ok(message)
}

/// Returns the whole conversation in creation order and, as a documented
/// side effect, marks everything the counterpart sent the requester as seen.
/// This is deliberately not a pure query.
pub async fn fetch_conversation(
    store: &MessageStore,
    requester_id: &str,
    counterpart_id: &str,
) -> Result<Vec<Message>, ApiError> {
    store.fetch_and_mark_seen(requester_id, counterpart_id).await
}

/// Receiver-only, idempotent.
pub async fn mark_seen(
    store: &MessageStore,
    requester_id: &str,
    message_id: &str,
) -> Result<(), ApiError> {
    let msg = store.find_by_id(message_id).await?.ok_or(ApiError::NotFound)?;
    if msg.receiver_id != requester_id {
        return Err(ApiError::Forbidden);
    }
    if msg.seen {
        return Ok(());
    }
    store.mark_seen(message_id).await
}

pub async fn edit(
    store: &MessageStore,
    chat: &Addr<ChatServer>,
    requester_id: &str,
    message_id: &str,
    new_text: &str,
) -> Result<Message, ApiError> {
    let new_text = new_text.trim();
    if new_text.is_empty() {
        return Err(ApiError::BadRequest("text required".into()));
    }

    let msg = store.find_by_id(message_id).await?.ok_or(ApiError::NotFound)?;
    if msg.sender_id != requester_id {
        return Err(ApiError::Forbidden);
    }
    if msg.deleted {
        return Err(ApiError::InvalidState("message is deleted".into()));
    }

    // The message was active a moment ago; losing the guarded update means
    // a delete slipped in between.
    if store.apply_edit(message_id, new_text).await? == 0 {
        return Err(ApiError::Conflict("message changed concurrently".into()));
    }

    chat.do_send(Deliver {
        user_id: msg.receiver_id.clone(),
        event: PushEvent::MessageEdited {
            id: message_id.to_string(),
            text: new_text.to_string(),
            is_edited: true,
        },
    });

    Ok(Message {
        text: new_text.to_string(),
        is_edited: true,
        ..msg
    })
}

/// "Delete for everyone": clears content and keeps the row. Irreversible.
pub async fn delete_for_everyone(
    store: &MessageStore,
    chat: &Addr<ChatServer>,
    requester_id: &str,
    message_id: &str,
) -> Result<Message, ApiError> {
    let msg = store.find_by_id(message_id).await?.ok_or(ApiError::NotFound)?;
    if msg.sender_id != requester_id {
        return Err(ApiError::Forbidden);
    }
    if msg.deleted {
        return Err(ApiError::InvalidState("message already deleted".into()));
    }

    if store.apply_soft_delete(message_id).await? == 0 {
        return Err(ApiError::Conflict("message changed concurrently".into()));
    }

    chat.do_send(Deliver {
        user_id: msg.receiver_id.clone(),
        event: PushEvent::MessageDeleted {
            id: message_id.to_string(),
            deleted: true,
        },
    });

    Ok(Message {
        text: String::new(),
        image: String::new(),
        deleted: true,
        ..msg
    })
}

/// Removes the row entirely; valid from both the active and the
/// soft-deleted state. The id resolves to nothing afterwards.
pub async fn permanently_delete(
    store: &MessageStore,
    chat: &Addr<ChatServer>,
    requester_id: &str,
    message_id: &str,
) -> Result<(), ApiError> {
    let msg = store.find_by_id(message_id).await?.ok_or(ApiError::NotFound)?;
    if msg.sender_id != requester_id {
        return Err(ApiError::Forbidden);
    }

    if store.remove(message_id).await? == 0 {
        return Err(ApiError::Conflict("message changed concurrently".into()));
    }

    chat.do_send(Deliver {
        user_id: msg.receiver_id.clone(),
        event: PushEvent::MessagePermanentlyDeleted {
            id: message_id.to_string(),
        },
    });

    Ok(())
}
