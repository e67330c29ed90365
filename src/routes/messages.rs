use crate::{
    auth::AuthUser,
    config::Config,
    db::Db,
    errors::ApiError,
    lifecycle, media,
    models::PublicUser,
    store::MessageStore,
    unseen,
    ws::server::ChatServer,
};
use actix::Addr;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::Row;

/// Roster: every user except the requester, plus the sparse map of unseen
/// counts keyed by counterpart id.
pub async fn list_users(db: web::Data<Db>, user: AuthUser) -> Result<HttpResponse, ApiError> {
    let rows = sqlx::query(
        "SELECT id, full_name, email, bio, profile_pic, created_at, updated_at
         FROM users WHERE id != ? ORDER BY full_name ASC",
    )
    .bind(&user.user_id)
    .fetch_all(&db.0)
    .await?;

    let users: Vec<PublicUser> = rows
        .into_iter()
        .map(|r| {
            PublicUser::from(crate::models::User {
                id: r.get("id"),
                full_name: r.get("full_name"),
                email: r.get("email"),
                bio: r.get("bio"),
                profile_pic: r.get("profile_pic"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
        })
        .collect();

    let unseen_messages = unseen::compute_all(&db, &user.user_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "users": users,
        "unseen_messages": unseen_messages,
    })))
}

/// Fetching a conversation also marks the counterpart's messages seen; this
/// endpoint is a read with a server-side write, not a pure query.
pub async fn get_conversation(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let counterpart_id = path.into_inner();
    let store = MessageStore::new(db.get_ref().clone());
    let messages = lifecycle::fetch_conversation(&store, &user.user_id, &counterpart_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "messages": messages,
    })))
}

pub async fn mark_seen(
    db: web::Data<Db>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let message_id = path.into_inner();
    let store = MessageStore::new(db.get_ref().clone());
    lifecycle::mark_seen(&store, &user.user_id, &message_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct SendMessageReq {
    pub text: Option<String>,
    pub image: Option<String>, // base64 data-URL
}

pub async fn send_message(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    chat: web::Data<Addr<ChatServer>>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<SendMessageReq>,
) -> Result<HttpResponse, ApiError> {
    let receiver_id = path.into_inner();
    let body = body.into_inner();

    // The engine only ever stores the media reference, never raw bytes.
    let image_url = match &body.image {
        Some(data) => Some(media::store_image(&cfg, data)?),
        None => None,
    };

    let store = MessageStore::new(db.get_ref().clone());
    let message = lifecycle::send(
        &store,
        chat.get_ref(),
        &user.user_id,
        &receiver_id,
        body.text,
        image_url,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "new_message": message,
    })))
}

#[derive(Deserialize)]
pub struct EditMessageReq {
    pub text: String,
}

pub async fn edit_message(
    db: web::Data<Db>,
    chat: web::Data<Addr<ChatServer>>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<EditMessageReq>,
) -> Result<HttpResponse, ApiError> {
    let message_id = path.into_inner();
    let store = MessageStore::new(db.get_ref().clone());
    let updated =
        lifecycle::edit(&store, chat.get_ref(), &user.user_id, &message_id, &body.text).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "updated_message": updated,
    })))
}

pub async fn delete_message(
    db: web::Data<Db>,
    chat: web::Data<Addr<ChatServer>>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let message_id = path.into_inner();
    let store = MessageStore::new(db.get_ref().clone());
    let deleted =
        lifecycle::delete_for_everyone(&store, chat.get_ref(), &user.user_id, &message_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "deleted_message": deleted,
    })))
}

pub async fn permanently_delete_message(
    db: web::Data<Db>,
    chat: web::Data<Addr<ChatServer>>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let message_id = path.into_inner();
    let store = MessageStore::new(db.get_ref().clone());
    lifecycle::permanently_delete(&store, chat.get_ref(), &user.user_id, &message_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
