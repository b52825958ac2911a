use serde::{Deserialize, Serialize};

use crate::game::session::SessionView;

/// Message sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ClientMessage {
    pub action: String,
    pub row: Option<u8>,
    pub col: Option<u8>,
    pub mode: Option<String>,
    pub time_control: Option<String>,
    pub player_color: Option<String>,
    pub side: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Message sent from server to client
#[derive(Serialize, Debug, Clone)]
pub struct ServerMessage {
    pub message_type: String,
    pub game_id: Option<String>,
    pub view: Option<SessionView>,
    pub error: Option<String>,
}

impl ServerMessage {
    pub fn state(game_id: &str, view: SessionView) -> Self {
        Self {
            message_type: "state".to_string(),
            game_id: Some(game_id.to_string()),
            view: Some(view),
            error: None,
        }
    }

    pub fn error(game_id: &str, error: impl Into<String>) -> Self {
        Self {
            message_type: "error".to_string(),
            game_id: Some(game_id.to_string()),
            view: None,
            error: Some(error.into()),
        }
    }
}
