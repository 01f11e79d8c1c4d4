pub mod agent;
pub mod board;
mod common;
mod config;
pub mod domain;
mod logging;
pub mod prediction;
pub mod protocol;
pub mod registry;
mod ship;
pub mod state_machine;
pub mod transport;

pub use agent::{Agent, AgentHandle, AgentSnapshot, AttackChoice, Identity};
pub use board::{BoardState, DestroyedShip};
pub use common::*;
pub use config::*;
pub use logging::init_logging;
pub use prediction::{HttpPredictionClient, Prediction, PredictionClient, PredictionError, PredictionRequest};
pub use protocol::{decode, encode, DecodeError, IncomingMessage, OutgoingMessage};
pub use registry::{CreateOutcome, Registry};
pub use ship::*;
pub use state_machine::{AgentState, StateMachine, TransitionError};
pub use transport::in_memory::InMemoryConnector;
pub use transport::ws::WsConnector;
