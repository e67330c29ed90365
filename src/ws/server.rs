use actix::{Actor, Context, Handler, Message, MessageResult, Recipient};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Everything the server ever pushes over a live connection.
#[derive(Message, Clone, Debug, Serialize)]
#[rtype(result = "()")]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushEvent {
    NewMessage {
        message: crate::models::Message,
    },
    MessageEdited {
        id: String,
        text: String,
        is_edited: bool,
    },
    MessageDeleted {
        id: String,
        deleted: bool,
    },
    MessagePermanentlyDeleted {
        id: String,
    },
    OnlineUsersChanged {
        user_ids: Vec<String>,
    },
}

struct Connection {
    conn_id: Uuid,
    recipient: Recipient<PushEvent>,
}

/// Presence registry and fan-out dispatcher. One connection per user id;
/// a newer connection for the same id supersedes the older one.
pub struct ChatServer {
    online: HashMap<String, Connection>,
}

impl ChatServer {
    pub fn new() -> Self {
        Self {
            online: HashMap::new(),
        }
    }

    fn broadcast_online(&self) {
        let user_ids: Vec<String> = self.online.keys().cloned().collect();
        for conn in self.online.values() {
            conn.recipient.do_send(PushEvent::OnlineUsersChanged {
                user_ids: user_ids.clone(),
            });
        }
    }
}

impl Default for ChatServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for ChatServer {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub user_id: String,
    pub conn_id: Uuid,
    pub recipient: Recipient<PushEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub user_id: String,
    pub conn_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Deliver {
    pub user_id: String,
    pub event: PushEvent,
}

#[derive(Message)]
#[rtype(result = "Vec<String>")]
pub struct OnlineUsers;

impl Handler<Connect> for ChatServer {
    type Result = ();
    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        log::debug!("user {} connected", msg.user_id);
        self.online.insert(
            msg.user_id,
            Connection {
                conn_id: msg.conn_id,
                recipient: msg.recipient,
            },
        );
        self.broadcast_online();
    }
}

impl Handler<Disconnect> for ChatServer {
    type Result = ();
    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        // Only drop the mapping if it still belongs to this connection; a
        // late disconnect must not evict a newer session for the same user.
        match self.online.get(&msg.user_id) {
            Some(conn) if conn.conn_id == msg.conn_id => {
                log::debug!("user {} disconnected", msg.user_id);
                self.online.remove(&msg.user_id);
                self.broadcast_online();
            }
            _ => {}
        }
    }
}

impl Handler<Deliver> for ChatServer {
    type Result = ();
    fn handle(&mut self, msg: Deliver, _: &mut Context<Self>) {
        // Offline target: drop. The client reconciles by re-fetching.
        if let Some(conn) = self.online.get(&msg.user_id) {
            conn.recipient.do_send(msg.event);
        }
    }
}

impl Handler<OnlineUsers> for ChatServer {
    type Result = MessageResult<OnlineUsers>;
    fn handle(&mut self, _: OnlineUsers, _: &mut Context<Self>) -> Self::Result {
        MessageResult(self.online.keys().cloned().collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use actix::Addr;
    use std::sync::{Arc, Mutex};

    pub struct Collector {
        events: Arc<Mutex<Vec<PushEvent>>>,
    }

    impl Actor for Collector {
        type Context = Context<Self>;
    }

    impl Handler<PushEvent> for Collector {
        type Result = ();
        fn handle(&mut self, ev: PushEvent, _: &mut Context<Self>) {
            self.events.lock().unwrap().push(ev);
        }
    }

    #[derive(Message)]
    #[rtype(result = "()")]
    pub struct Flush;

    impl Handler<Flush> for Collector {
        type Result = ();
        fn handle(&mut self, _: Flush, _: &mut Context<Self>) {}
    }

    pub fn collector() -> (Addr<Collector>, Arc<Mutex<Vec<PushEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let addr = Collector {
            events: events.clone(),
        }
        .start();
        (addr, events)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{collector, Flush};
    use super::*;

    #[actix_web::test]
    async fn connect_broadcasts_online_set() {
        let srv = ChatServer::new().start();
        let (c1, ev1) = collector();
        let (c2, ev2) = collector();

        srv.send(Connect {
            user_id: "alice".into(),
            conn_id: Uuid::new_v4(),
            recipient: c1.clone().recipient(),
        })
        .await
        .unwrap();
        srv.send(Connect {
            user_id: "bob".into(),
            conn_id: Uuid::new_v4(),
            recipient: c2.clone().recipient(),
        })
        .await
        .unwrap();
        c1.send(Flush).await.unwrap();
        c2.send(Flush).await.unwrap();

        // alice saw both broadcasts, bob only the second
        let last = ev1.lock().unwrap().last().cloned().unwrap();
        match last {
            PushEvent::OnlineUsersChanged { mut user_ids } => {
                user_ids.sort();
                assert_eq!(user_ids, vec!["alice".to_string(), "bob".to_string()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(ev2.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn stale_disconnect_does_not_evict_newer_connection() {
        let srv = ChatServer::new().start();
        let (c, _ev) = collector();
        let h1 = Uuid::new_v4();
        let h2 = Uuid::new_v4();

        srv.send(Connect {
            user_id: "alice".into(),
            conn_id: h1,
            recipient: c.clone().recipient(),
        })
        .await
        .unwrap();
        srv.send(Connect {
            user_id: "alice".into(),
            conn_id: h2,
            recipient: c.clone().recipient(),
        })
        .await
        .unwrap();

        // H1's disconnect arrives after H2 took over
        srv.send(Disconnect {
            user_id: "alice".into(),
            conn_id: h1,
        })
        .await
        .unwrap();
        assert_eq!(srv.send(OnlineUsers).await.unwrap(), vec!["alice".to_string()]);

        srv.send(Disconnect {
            user_id: "alice".into(),
            conn_id: h2,
        })
        .await
        .unwrap();
        assert!(srv.send(OnlineUsers).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn deliver_to_offline_user_is_dropped() {
        let srv = ChatServer::new().start();
        srv.send(Deliver {
            user_id: "nobody".into(),
            event: PushEvent::MessagePermanentlyDeleted { id: "m1".into() },
        })
        .await
        .unwrap();
        assert!(srv.send(OnlineUsers).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn deliver_reaches_connected_user_in_order() {
        let srv = ChatServer::new().start();
        let (c, ev) = collector();
        srv.send(Connect {
            user_id: "bob".into(),
            conn_id: Uuid::new_v4(),
            recipient: c.clone().recipient(),
        })
        .await
        .unwrap();

        srv.send(Deliver {
            user_id: "bob".into(),
            event: PushEvent::MessageEdited {
                id: "m1".into(),
                text: "hello".into(),
                is_edited: true,
            },
        })
        .await
        .unwrap();
        srv.send(Deliver {
            user_id: "bob".into(),
            event: PushEvent::MessageDeleted {
                id: "m1".into(),
                deleted: true,
            },
        })
        .await
        .unwrap();
        c.send(Flush).await.unwrap();

        let events = ev.lock().unwrap();
        // first event is the online broadcast from Connect
        assert!(matches!(events[0], PushEvent::OnlineUsersChanged { .. }));
        assert!(matches!(events[1], PushEvent::MessageEdited { ref id, .. } if id == "m1"));
        assert!(matches!(events[2], PushEvent::MessageDeleted { ref id, .. } if id == "m1"));
    }
}
