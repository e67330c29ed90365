mod auth;
mod config;
mod db;
mod errors;
mod lifecycle;
mod media;
mod models;
mod routes;
mod store;
#[cfg(test)]
mod test_util;
mod unseen;
mod ws;

use actix::Actor;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer, web};
use env_logger::Env;

use crate::config::Config;
use crate::db::Db;
use crate::routes::{auth as auth_routes, health as health_routes, messages as messages_routes};
use ws::server::ChatServer;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Info by default, overridable through RUST_LOG
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cfg = Config::from_env_config();

    let db = Db::connect_and_migrate(&cfg.database_path)
        .await
        .expect("database init failed");

    let chat_server = ChatServer::new().start();
    log::info!("Starting server at {}", cfg.listen);

    let listen_addr = cfg.listen.clone();
    let allowed_origins = cfg.allowed_origins.clone();
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(Data::new(cfg.clone()))
            .app_data(Data::new(db.clone()))
            .app_data(Data::new(chat_server.clone()))
            .service(
                web::scope("/api")
                    .route("/status", web::get().to(health_routes::status))
                    .service(
                        web::scope("/auth")
                            .route("/signup", web::post().to(auth_routes::signup))
                            .route("/login", web::post().to(auth_routes::login))
                            .route("/check", web::get().to(auth_routes::check))
                            .route(
                                "/update-profile",
                                web::put().to(auth_routes::update_profile),
                            ),
                    )
                    .service(
                        web::scope("/messages")
                            .route("/users", web::get().to(messages_routes::list_users))
                            .route("/mark/{id}", web::put().to(messages_routes::mark_seen))
                            .route("/send/{id}", web::post().to(messages_routes::send_message))
                            .route("/edit/{id}", web::put().to(messages_routes::edit_message))
                            .route(
                                "/delete/{id}",
                                web::delete().to(messages_routes::delete_message),
                            )
                            .route(
                                "/permanent/{id}",
                                web::delete().to(messages_routes::permanently_delete_message),
                            )
                            .route("/{id}", web::get().to(messages_routes::get_conversation)),
                    ),
            )
            .route("/ws", web::get().to(ws::session::ws_route))
            .route("/media/{file}", web::get().to(media::get_media))
    })
    .bind(listen_addr)?
    .run()
    .await
}
