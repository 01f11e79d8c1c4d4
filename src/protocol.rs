//! Wire messages exchanged with the game server.
//!
//! Every frame is a JSON text frame shaped `{ "type": <kind>, "data": <payload> }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::GridCell;
use crate::domain::MatchConfig;
use crate::ship::ShipLayout;

/// Messages the bot sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum OutgoingMessage {
    Connection(ConnectionPayload),
    ShipPositions(ShipLayout),
    Attack(AttackPayload),
    Bonus(BonusPayload),
}

impl OutgoingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingMessage::Connection(_) => "connection",
            OutgoingMessage::ShipPositions(_) => "ship-positions",
            OutgoingMessage::Attack(_) => "attack",
            OutgoingMessage::Bonus(_) => "bonus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPayload {
    pub username: String,
    pub player_id: String,
    pub game_id: String,
}

/// Shot shape; the bot only fires single-cell shots.
pub const SINGLE_CELL_ATTACK: &str = "1x1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackPayload {
    #[serde(rename = "type")]
    pub attack_type: &'static str,
    pub origin: GridCell,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionPayload>,
}

impl AttackPayload {
    pub fn single(origin: GridCell, prediction: Option<PredictionPayload>) -> Self {
        Self {
            attack_type: SINGLE_CELL_ATTACK,
            origin,
            prediction,
        }
    }
}

/// The prediction that produced an attack, echoed back to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPayload {
    pub prob: Vec<Vec<f64>>,
    pub x: u8,
    pub y: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BonusPayload {
    pub hits: u32,
}

/// Messages the bot understands.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Configuration(Box<MatchConfig>),
    AttackResult(Box<MatchConfig>),
    BonusResult(Box<MatchConfig>),
    Heartbeat(Value),
    ScoreUpdate(Value),
    ServerError(Value),
    BadMessageType(Value),
    InvalidPayload(Value),
}

impl IncomingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            IncomingMessage::Configuration(_) => "configuration",
            IncomingMessage::AttackResult(_) => "attack-result",
            IncomingMessage::BonusResult(_) => "bonus-result",
            IncomingMessage::Heartbeat(_) => "heartbeat",
            IncomingMessage::ScoreUpdate(_) => "score-update",
            IncomingMessage::ServerError(_) => "server-error",
            IncomingMessage::BadMessageType(_) => "bad-message-type",
            IncomingMessage::InvalidPayload(_) => "invalid-payload",
        }
    }
}

/// Reasons an inbound frame is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a message envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unrecognised message type {0:?}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

fn match_config(kind: &'static str, data: Value) -> Result<Box<MatchConfig>, DecodeError> {
    serde_json::from_value(data)
        .map(Box::new)
        .map_err(|source| DecodeError::InvalidPayload { kind, source })
}

/// Parse and validate one inbound text frame.
pub fn decode(frame: &str) -> Result<IncomingMessage, DecodeError> {
    let Envelope { kind, data } = serde_json::from_str(frame).map_err(DecodeError::Malformed)?;
    let msg = match kind.as_str() {
        "configuration" => IncomingMessage::Configuration(match_config("configuration", data)?),
        "attack-result" => IncomingMessage::AttackResult(match_config("attack-result", data)?),
        "bonus-result" => IncomingMessage::BonusResult(match_config("bonus-result", data)?),
        "heartbeat" => IncomingMessage::Heartbeat(data),
        "score-update" => IncomingMessage::ScoreUpdate(data),
        "server-error" => IncomingMessage::ServerError(data),
        "bad-message-type" => IncomingMessage::BadMessageType(data),
        "invalid-payload" => IncomingMessage::InvalidPayload(data),
        _ => return Err(DecodeError::UnknownType(kind)),
    };
    Ok(msg)
}

/// Serialize an outbound message into a text frame.
pub fn encode(msg: &OutgoingMessage) -> anyhow::Result<String> {
    serde_json::to_string(msg)
        .map_err(|e| anyhow::anyhow!("Serialization error for {}: {}", msg.kind(), e))
}

/// Build the prediction echo for an attack from a probability matrix.
pub fn prediction_payload(target: GridCell, prob: Vec<Vec<f64>>) -> PredictionPayload {
    PredictionPayload {
        prob,
        x: target.x,
        y: target.y,
    }
}

/// Bonus rounds carry no scoring logic on the bot side.
pub const NO_BONUS_HITS: BonusPayload = BonusPayload { hits: 0 };
