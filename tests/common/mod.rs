#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use battlebots::prediction::{Prediction, PredictionClient, PredictionError, PredictionRequest};
use battlebots::transport::in_memory::ServerEnd;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Duration};

pub const BOT_ID: &str = "bot-1";
pub const OPPONENT_ID: &str = "opponent-1";

/// Prediction service stand-in with a scripted answer.
pub struct StubPredictor {
    answer: Option<(u8, u8)>,
    delay: Duration,
    calls: AtomicUsize,
    last_request: Mutex<Option<PredictionRequest>>,
}

impl StubPredictor {
    pub fn answering(x: u8, y: u8) -> Arc<Self> {
        Arc::new(Self {
            answer: Some((x, y)),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn slow(x: u8, y: u8, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: Some((x, y)),
            delay,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<PredictionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PredictionClient for StubPredictor {
    async fn predict(&self, request: &PredictionRequest) -> Result<Prediction, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        sleep(self.delay).await;
        match self.answer {
            Some((x, y)) => Ok(Prediction {
                x,
                y,
                prob: vec![vec![0.04; 5]; 5],
            }),
            None => Err(PredictionError::Status(500)),
        }
    }
}

/// Builder for the match snapshot pushed in `configuration` and result
/// messages.
pub struct Snapshot {
    game_state: &'static str,
    phase: &'static str,
    active_player: Option<String>,
    valid_board: bool,
    winner: Option<String>,
    attacks: Vec<Value>,
}

impl Snapshot {
    /// Active game, positions accepted, our turn to attack.
    pub fn our_turn() -> Self {
        Self {
            game_state: "active",
            phase: "attack",
            active_player: Some(BOT_ID.to_string()),
            valid_board: true,
            winner: None,
            attacks: Vec::new(),
        }
    }

    pub fn their_turn() -> Self {
        Self {
            active_player: Some(OPPONENT_ID.to_string()),
            ..Self::our_turn()
        }
    }

    pub fn needs_positions() -> Self {
        Self {
            phase: "not-ready",
            active_player: None,
            valid_board: false,
            ..Self::our_turn()
        }
    }

    pub fn game_state(mut self, state: &'static str) -> Self {
        self.game_state = state;
        self
    }

    pub fn phase(mut self, phase: &'static str) -> Self {
        self.phase = phase;
        self
    }

    pub fn winner(mut self, winner: &str) -> Self {
        self.winner = Some(winner.to_string());
        self.phase = "finished";
        self
    }

    pub fn attack(mut self, x: u8, y: u8, hit: bool) -> Self {
        self.attacks.push(json!({
            "attack": { "origin": [x, y], "human": false },
            "results": [{ "origin": [x, y], "hit": hit }]
        }));
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "game": { "uuid": "game-1", "date": "2024-05-01", "state": self.game_state },
            "opponent": { "username": "opponent", "board": {} },
            "player": {
                "uuid": BOT_ID,
                "username": "bot",
                "board": { "valid": self.valid_board },
                "attacks": self.attacks
            },
            "match": {
                "uuid": "match-1",
                "ready": true,
                "state": { "phase": self.phase, "activePlayer": self.active_player },
                "winner": self.winner
            }
        })
    }

    pub fn message(&self, kind: &str) -> Value {
        json!({ "type": kind, "data": self.to_json() })
    }
}

/// Accept the next connection and consume the `connection` payload the bot
/// sends on it.
pub async fn accept_and_greet(accepted: &mut UnboundedReceiver<ServerEnd>) -> ServerEnd {
    let mut server = accepted.recv().await.expect("no connection attempt");
    let hello = server.recv_json().await.expect("no connection payload");
    assert_eq!(hello["type"], "connection");
    server
}
