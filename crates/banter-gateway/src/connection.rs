use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use banter_db::{Database, StoreError};
use banter_types::events::{ChatEvent, ClientCommand};
use banter_types::token::{Claims, TokenKeys};

use crate::hub::{Admission, Hub};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a new connection gets to present its token.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Message text is empty")]
    Empty,

    #[error("Message text is too long")]
    TooLong,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Handle one WebSocket connection for its entire lifetime:
/// CONNECTING -> (identify verify) -> ADMITTED -> (disconnect) -> REMOVED.
pub async fn handle_socket(socket: WebSocket, hub: Hub, db: Arc<Database>, tokens: TokenKeys) {
    let (mut sender, mut receiver) = socket.split();

    // Handshake gate: the first frame must carry a valid token, using
    // the same verification primitive as the REST middleware.
    let claims = match wait_for_identify(&mut receiver, &tokens).await {
        Some(claims) => claims,
        None => {
            warn!("WebSocket handshake failed, refusing connection");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "Unauthorized".into(),
                })))
                .await;
            return;
        }
    };

    info!("{} ({}) connected", claims.username, claims.sub);

    let ready = ChatEvent::Ready {
        user_id: claims.sub,
        username: claims.username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    let Admission {
        conn_id,
        mut events,
        mut direct,
    } = hub.admit(&claims).await;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward fan-out + targeted events to the client, with heartbeat.
    // Each connection drains its own broadcast receiver, so one slow
    // peer never blocks delivery to the others.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = events.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if sender
                        .send(Message::Text(serde_json::to_string(&event).unwrap().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                result = direct.recv() => {
                    let Some(event) = result else { break };

                    if sender
                        .send(Message::Text(serde_json::to_string(&event).unwrap().into()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(
                                "Heartbeat timeout (missed {} pongs), dropping connection",
                                missed_heartbeats
                            );
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client.
    let hub_recv = hub.clone();
    let db_recv = db.clone();
    let claims_recv = claims.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(ClientCommand::Message { text }) => {
                        handle_submission(&db_recv, &hub_recv, &claims_recv, conn_id, &text).await;
                    }
                    Ok(ClientCommand::Identify { .. }) => {} // Already handled
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            claims_recv.username,
                            claims_recv.sub,
                            e,
                            raw_preview(&text)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.remove(conn_id).await;
    info!("{} ({}) disconnected", claims.username, claims.sub);
}

const RAW_PREVIEW_BYTES: usize = 200;

/// Leading slice of an unparseable frame for the log line, cut on a
/// char boundary so multibyte text never splits.
fn raw_preview(text: &str) -> &str {
    let mut end = text.len().min(RAW_PREVIEW_BYTES);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    tokens: &TokenKeys,
) -> Option<Claims> {
    let handshake = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                // The first command decides: anything other than a valid
                // identify refuses the connection.
                return match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(ClientCommand::Identify { token }) => tokens.verify(&token).ok(),
                    _ => None,
                };
            }
        }
        None
    });

    handshake.await.ok().flatten()
}

async fn handle_submission(
    db: &Arc<Database>,
    hub: &Hub,
    claims: &Claims,
    conn_id: uuid::Uuid,
    text: &str,
) {
    match store_and_publish(db, hub, claims, text).await {
        Ok(_) => {}
        Err(err @ (PublishError::Empty | PublishError::TooLong)) => {
            warn!(
                "{} ({}) message rejected: {}",
                claims.username, claims.sub, err
            );
            hub.send_to(
                conn_id,
                ChatEvent::Error {
                    message: err.to_string(),
                },
            )
            .await;
        }
        Err(err) => {
            error!(
                "{} ({}) message persist failed: {}",
                claims.username, claims.sub, err
            );
            hub.send_to(
                conn_id,
                ChatEvent::Error {
                    message: "Message could not be saved".into(),
                },
            )
            .await;
        }
    }
}

/// Persist-then-broadcast: the durable write comes first, and its
/// store-assigned id and timestamp are what every client sees. A failed
/// write means no fan-out.
pub async fn store_and_publish(
    db: &Arc<Database>,
    hub: &Hub,
    claims: &Claims,
    text: &str,
) -> Result<ChatEvent, PublishError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PublishError::Empty);
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(PublishError::TooLong);
    }

    // Run the blocking insert off the async runtime
    let db = db.clone();
    let author_id = claims.sub.to_string();
    let body = text.to_string();
    let stored =
        tokio::task::spawn_blocking(move || db.insert_message(&author_id, &body)).await??;

    let event = ChatEvent::Message {
        id: stored.id,
        created_at: stored.timestamp(),
        text: stored.text,
        username: claims.username.clone(),
    };

    hub.publish(event.clone());
    Ok(event)
}
