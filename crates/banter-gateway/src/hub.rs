use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use banter_types::events::ChatEvent;
use banter_types::token::Claims;

/// An admitted connection as the hub sees it: the identity claim bound
/// at handshake time plus a targeted send channel.
struct Session {
    user_id: Uuid,
    username: String,
    direct: mpsc::UnboundedSender<ChatEvent>,
}

/// Handed to a connection on admission. Dropping it (or the receivers)
/// does not remove the session; `Hub::remove` does.
pub struct Admission {
    pub conn_id: Uuid,
    /// Fan-out stream — every published event, including self-echo.
    pub events: broadcast::Receiver<ChatEvent>,
    /// Targeted stream — events addressed to this connection only.
    pub direct: mpsc::UnboundedReceiver<ChatEvent>,
}

/// Maintains the set of admitted connections and fans out stored
/// messages to all of them.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    broadcast_tx: broadcast::Sender<ChatEvent>,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl Hub {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(HubInner {
                broadcast_tx,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Admit a connection that passed the handshake gate. The claim is
    /// bound to the session for its entire lifetime.
    pub async fn admit(&self, claims: &Claims) -> Admission {
        let conn_id = Uuid::new_v4();
        let (direct_tx, direct_rx) = mpsc::unbounded_channel();

        self.inner.sessions.write().await.insert(
            conn_id,
            Session {
                user_id: claims.sub,
                username: claims.username.clone(),
                direct: direct_tx,
            },
        );

        Admission {
            conn_id,
            events: self.inner.broadcast_tx.subscribe(),
            direct: direct_rx,
        }
    }

    /// Remove a session on disconnect. No grace period: a reconnecting
    /// client re-runs the full handshake and is admitted fresh.
    pub async fn remove(&self, conn_id: Uuid) {
        if let Some(session) = self.inner.sessions.write().await.remove(&conn_id) {
            debug!(
                "session removed: {} ({})",
                session.username, session.user_id
            );
        }
    }

    /// Best-effort fan-out to every admitted connection. Connections
    /// that are gone are simply skipped; there is no acknowledgement.
    pub fn publish(&self, event: ChatEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Send a targeted event to one connection, e.g. a failure report
    /// to the author of a message that could not be persisted.
    pub async fn send_to(&self, conn_id: Uuid, event: ChatEvent) {
        let sessions = self.inner.sessions.read().await;
        if let Some(session) = sessions.get(&conn_id) {
            let _ = session.direct.send(event);
        }
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
