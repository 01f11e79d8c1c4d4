//! Shape of the match snapshot the game server pushes with `configuration`,
//! `attack-result` and `bonus-result` messages.
//!
//! Unknown fields are ignored; fields the driver depends on are required so a
//! malformed snapshot is rejected at decode time instead of half-applied.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::common::GridCell;
use crate::ship::{Orientation, ShipLayout, ShipType};

/// Lifecycle of the game as a whole, controlled by the organisers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameLifecycle {
    Lobby,
    Active,
    Paused,
    Stopped,
}

/// Sub-state of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPhase {
    NotReady,
    Attack,
    Bonus,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchConfig {
    pub game: GameInfo,
    #[serde(default)]
    pub opponent: OpponentInfo,
    pub player: PlayerInfo,
    #[serde(rename = "match")]
    pub match_info: MatchInfo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameInfo {
    pub uuid: String,
    #[serde(default)]
    pub date: Option<String>,
    pub state: GameLifecycle,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OpponentInfo {
    #[serde(default)]
    pub username: Option<String>,
    /// Only ships the opponent has lost appear here.
    #[serde(default)]
    pub board: BTreeMap<ShipType, RevealedShip>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RevealedShip {
    #[serde(rename = "type")]
    pub ship_type: ShipType,
    #[serde(default)]
    pub origin: Option<GridCell>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub cells: Vec<RevealedCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RevealedCell {
    pub origin: GridCell,
    #[serde(default)]
    pub hit: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerInfo {
    pub uuid: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub board: Option<PlayerBoard>,
    /// Attacks made by this player, oldest first.
    #[serde(default)]
    pub attacks: Vec<AttackRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerBoard {
    pub valid: bool,
    #[serde(default)]
    pub positions: Option<ShipLayout>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttackRecord {
    pub attack: AttackTarget,
    #[serde(default)]
    pub results: Vec<AttackOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AttackTarget {
    pub origin: GridCell,
    #[serde(default)]
    pub human: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AttackOutcome {
    pub origin: GridCell,
    pub hit: bool,
    #[serde(default)]
    pub destroyed: Option<bool>,
    #[serde(default, rename = "type")]
    pub ship_type: Option<ShipType>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchInfo {
    pub uuid: String,
    #[serde(default)]
    pub ready: bool,
    pub state: MatchState,
    #[serde(default)]
    pub winner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub phase: MatchPhase,
    #[serde(default)]
    pub active_player: Option<String>,
    #[serde(default)]
    pub bonus: Option<serde_json::Value>,
}

impl MatchConfig {
    pub fn is_paused_or_stopped(&self) -> bool {
        matches!(self.game.state, GameLifecycle::Paused | GameLifecycle::Stopped)
    }

    /// Whether the server has accepted this player's ship positions.
    pub fn has_valid_positions(&self) -> bool {
        self.player.board.as_ref().is_some_and(|board| board.valid)
    }

    /// A layout the server proposed for this player, if it is complete and
    /// fits the grid.
    pub fn suggested_layout(&self, grid_size: u8) -> Option<&ShipLayout> {
        self.player
            .board
            .as_ref()
            .and_then(|board| board.positions.as_ref())
            .filter(|layout| layout.validate(grid_size).is_ok())
    }

    /// The phase the match is in if it is `player_id`'s turn in an active
    /// game, `None` otherwise.
    pub fn turn_phase_for(&self, player_id: &str) -> Option<MatchPhase> {
        let active = self.match_info.state.active_player.as_deref() == Some(player_id);
        (active && self.game.state == GameLifecycle::Active).then_some(self.match_info.state.phase)
    }

    pub fn winner(&self) -> Option<&str> {
        self.match_info.winner.as_deref().filter(|w| !w.is_empty())
    }
}
