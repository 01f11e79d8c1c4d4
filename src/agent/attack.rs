//! Attack selection: ask the prediction service, fall back to the first free
//! cell, and hold the answer back until the minimum thinking time has passed.

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, warn};
use tokio::time::{sleep_until, Duration, Instant};

use crate::board::{attacked_cells, destroyed_ships, fallback_target, BoardState};
use crate::common::{GridCell, TargetError};
use crate::domain::MatchConfig;
use crate::prediction::{Prediction, PredictionClient, PredictionError, PredictionRequest};
use crate::protocol::{prediction_payload, AttackPayload};

/// The cell to fire at, and the probabilities behind it when the prediction
/// service picked it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackChoice {
    pub target: GridCell,
    pub prob: Option<Vec<Vec<f64>>>,
}

impl AttackChoice {
    pub fn into_payload(self) -> AttackPayload {
        let prediction = self.prob.map(|prob| prediction_payload(self.target, prob));
        AttackPayload::single(self.target, prediction)
    }
}

/// Everything the attack needs from the snapshot, captured up front so the
/// prediction call does not borrow the driver.
#[derive(Debug, Clone)]
pub struct AttackPlan {
    pub grid_size: u8,
    pub request: PredictionRequest,
    attacked: HashSet<GridCell>,
    fallback: Result<GridCell, TargetError>,
}

impl AttackPlan {
    pub fn from_config(grid_size: u8, config: &MatchConfig) -> Self {
        let attacks = &config.player.attacks;
        Self {
            grid_size,
            request: PredictionRequest {
                board_state: BoardState::from_attacks(grid_size, attacks),
                ship_types: destroyed_ships(&config.opponent),
            },
            attacked: attacked_cells(attacks),
            fallback: fallback_target(grid_size, attacks),
        }
    }

    fn accept(&self, prediction: Prediction) -> Result<AttackChoice, PredictionError> {
        let target = prediction.target();
        if !target.in_bounds(self.grid_size) {
            return Err(PredictionError::InvalidResponse(format!(
                "target {} is off the {}x{} grid",
                target, self.grid_size, self.grid_size
            )));
        }
        if self.attacked.contains(&target) {
            return Err(PredictionError::InvalidResponse(format!(
                "target {} was already attacked",
                target
            )));
        }
        Ok(AttackChoice {
            target,
            prob: Some(prediction.prob),
        })
    }

    /// Pick a target: the prediction if it is usable, the fallback cell
    /// otherwise.
    pub async fn choose(&self, predictor: &dyn PredictionClient) -> Result<AttackChoice, TargetError> {
        match predictor
            .predict(&self.request)
            .await
            .and_then(|prediction| self.accept(prediction))
        {
            Ok(choice) => Ok(choice),
            Err(e) => {
                warn!("prediction unavailable, using fallback target: {}", e);
                self.fallback.map(|target| AttackChoice { target, prob: None })
            }
        }
    }
}

/// Choose a target and wait until at least `min_delay` has passed since
/// `started` before returning it.
pub async fn paced_choice(
    plan: AttackPlan,
    predictor: Arc<dyn PredictionClient>,
    started: Instant,
    min_delay: Duration,
) -> Result<AttackChoice, TargetError> {
    let choice = plan.choose(predictor.as_ref()).await;
    let ready_at = started + min_delay;
    debug!(
        "attack decided after {:?}, holding until minimum delay of {:?}",
        started.elapsed(),
        min_delay
    );
    sleep_until(ready_at).await;
    choice
}
