use actix_web::HttpResponse;

pub async fn status() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "server is live",
    }))
}
