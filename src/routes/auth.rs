use crate::{auth, config::Config, db::Db, errors::ApiError, media, models::User};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::Row;

pub(crate) async fn load_user(db: &Db, user_id: &str) -> Result<User, ApiError> {
    let row = sqlx::query(
        "SELECT id, full_name, email, bio, profile_pic, created_at, updated_at
         FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&db.0)
    .await?;
    let row = row.ok_or(ApiError::NotFound)?;
    Ok(User {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        bio: row.get("bio"),
        profile_pic: row.get("profile_pic"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[derive(Deserialize)]
pub struct SignupReq {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub bio: String,
}

pub async fn signup(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    body: web::Json<SignupReq>,
) -> Result<HttpResponse, ApiError> {
    if body.full_name.trim().is_empty() || body.email.trim().is_empty() || body.bio.trim().is_empty()
    {
        return Err(ApiError::BadRequest("missing details".into()));
    }
    if body.password.len() < 8 {
        return Err(ApiError::BadRequest("password too short".into()));
    }

    let hash = auth::hash_password(&body.password)?;
    let user_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now();

    let res = sqlx::query(
        "INSERT INTO users(id, full_name, email, password_hash, bio, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user_id)
    .bind(body.full_name.trim())
    .bind(body.email.trim())
    .bind(&hash)
    .bind(body.bio.trim())
    .bind(now)
    .bind(now)
    .execute(&db.0)
    .await;

    if let Err(e) = res {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.message().contains("UNIQUE") {
                return Err(ApiError::Conflict("account already exists".into()));
            }
        }
        return Err(e.into());
    }

    let token = auth::create_access_token(&user_id, &cfg)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": load_user(&db, &user_id).await?,
        "token": token,
    })))
}

#[derive(Deserialize)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

pub async fn login(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    body: web::Json<LoginReq>,
) -> Result<HttpResponse, ApiError> {
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?")
        .bind(&body.email)
        .fetch_optional(&db.0)
        .await?;

    let row = row.ok_or(ApiError::Unauthorized)?;
    let user_id: String = row.get("id");
    let password_hash: String = row.get("password_hash");

    if !auth::verify_password(&password_hash, &body.password) {
        return Err(ApiError::Unauthorized);
    }

    let token = auth::create_access_token(&user_id, &cfg)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": load_user(&db, &user_id).await?,
        "token": token,
    })))
}

pub async fn check(db: web::Data<Db>, user: auth::AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": load_user(&db, &user.user_id).await?,
    })))
}

#[derive(Deserialize)]
pub struct UpdateProfileReq {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<String>, // base64 data-URL
}

pub async fn update_profile(
    cfg: web::Data<Config>,
    db: web::Data<Db>,
    user: auth::AuthUser,
    body: web::Json<UpdateProfileReq>,
) -> Result<HttpResponse, ApiError> {
    if body.full_name.as_deref().map_or(false, |n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("full_name must not be empty".into()));
    }

    let pic_url = match &body.profile_pic {
        Some(data) => Some(media::store_image(&cfg, data)?),
        None => None,
    };

    sqlx::query(
        "UPDATE users SET full_name = COALESCE(?, full_name), bio = COALESCE(?, bio),
         profile_pic = COALESCE(?, profile_pic), updated_at = ? WHERE id = ?",
    )
    .bind(&body.full_name)
    .bind(&body.bio)
    .bind(&pic_url)
    .bind(chrono::Utc::now())
    .bind(&user.user_id)
    .execute(&db.0)
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "user": load_user(&db, &user.user_id).await?,
        "message": "profile updated",
    })))
}
