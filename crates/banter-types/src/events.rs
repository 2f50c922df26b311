use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent from the server to streaming clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Server confirms the handshake: the connection is admitted.
    Ready { user_id: Uuid, username: String },

    /// A message was durably stored and is being fanned out.
    Message {
        id: i64,
        text: String,
        created_at: chrono::DateTime<chrono::Utc>,
        username: String,
    },

    /// Delivered to a single connection when its own submission failed.
    Error { message: String },
}

/// Commands sent from a streaming client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Present the session token. Must be the first frame on a new
    /// connection; the connection is refused if it is missing or invalid.
    Identify { token: String },

    /// Submit raw message text for persist-then-broadcast.
    Message { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_event_wire_shape() {
        let event = ChatEvent::Message {
            id: 7,
            text: "hi".into(),
            created_at: "2026-01-02T03:04:05.678Z".parse().unwrap(),
            username: "alice".into(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["data"]["id"], 7);
        assert_eq!(value["data"]["text"], "hi");
        assert_eq!(value["data"]["username"], "alice");
    }

    #[test]
    fn identify_command_parses() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"identify","data":{"token":"abc"}}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Identify { token } if token == "abc"));
    }
}
