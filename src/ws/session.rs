use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, StreamHandler};
use actix_web::{Error, HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use serde::Deserialize;
use uuid::Uuid;

use super::server::{ChatServer, Connect, Disconnect, PushEvent};
use crate::{auth, config::Config};

pub async fn ws_route(
    req: HttpRequest,
    stream: web::Payload,
    cfg: web::Data<Config>,
    srv: web::Data<Addr<ChatServer>>,
) -> Result<HttpResponse, Error> {
    let token = req
        .query_string()
        .split('&')
        .find_map(|kv| kv.split_once('='))
        .filter(|(k, _)| *k == "token")
        .map(|(_, v)| v.to_string());

    let claims = match token {
        Some(t) => auth::verify_access_token(&t, &cfg)
            .map_err(|_| actix_web::error::ErrorUnauthorized("bad token"))?,
        None => return Err(actix_web::error::ErrorUnauthorized("missing token")),
    };

    let session = WsSession {
        user_id: claims.sub,
        conn_id: Uuid::new_v4(),
        server: srv.get_ref().clone(),
    };
    ws::start(session, &req, stream)
}

pub struct WsSession {
    pub user_id: String,
    pub conn_id: Uuid,
    pub server: Addr<ChatServer>,
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.server.do_send(Connect {
            user_id: self.user_id.clone(),
            conn_id: self.conn_id,
            recipient: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        self.server.do_send(Disconnect {
            user_id: self.user_id.clone(),
            conn_id: self.conn_id,
        });
    }
}

impl Handler<PushEvent> for WsSession {
    type Result = ();
    fn handle(&mut self, event: PushEvent, ctx: &mut Self::Context) {
        match serde_json::to_string(&event) {
            Ok(payload) => ctx.text(payload),
            Err(e) => log::error!("push event serialization failed: {e}"),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientEvent {
    Ping,
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                if let Ok(ClientEvent::Ping) = serde_json::from_str::<ClientEvent>(&text) {
                    ctx.text(r#"{"type":"pong"}"#);
                }
            }
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(_)) => ctx.stop(),
            _ => {}
        }
    }
}
