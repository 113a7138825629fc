use itinera_planner::{PlanMode, TurnInput};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Inbound message from a WebSocket client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    #[serde(alias = "user_id")]
    pub session_key: String,
    #[serde(alias = "input")]
    pub text: String,
    #[serde(default)]
    pub mode: Option<PlanMode>,
    #[serde(default)]
    pub skip_gathering: bool,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let frame: InboundFrame = serde_json::from_str(text)
            .map_err(|e| GatewayError::InvalidFrame(format!("Invalid JSON: {}", e)))?;

        if frame.session_key.trim().is_empty() {
            return Err(GatewayError::InvalidFrame(
                "sessionKey must not be empty".to_string(),
            ));
        }
        Ok(frame)
    }

    pub fn into_turn_input(self) -> TurnInput {
        TurnInput {
            text: self.text,
            mode: self.mode,
            skip_gathering: self.skip_gathering,
        }
    }
}

/// Outbound message to WebSocket clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundFrame {
    Ping,
    Update(String),
    Response(String),
    Done,
    Error(String),
}

impl OutboundFrame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
