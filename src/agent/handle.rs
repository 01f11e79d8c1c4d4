use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::watch;

use super::AgentEvent;
use crate::state_machine::AgentState;

/// Who a bot plays as. Fixed for the lifetime of a driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub match_id: String,
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        match_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            match_id: match_id.into(),
        }
    }
}

/// Read-only view of a driver, refreshed after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSnapshot {
    pub state: AgentState,
    pub reconnect_attempts: u32,
    pub generation: u64,
    pub retired: bool,
}

impl AgentSnapshot {
    pub(crate) fn initial() -> Self {
        Self {
            state: AgentState::Connecting,
            reconnect_attempts: 0,
            generation: 0,
            retired: false,
        }
    }
}

/// Cheap, cloneable reference to a running driver.
#[derive(Clone)]
pub struct AgentHandle {
    id: String,
    match_id: String,
    events: UnboundedSender<AgentEvent>,
    snapshot: watch::Receiver<AgentSnapshot>,
}

impl core::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id)
            .field("match_id", &self.match_id)
            .field("snapshot", &*self.snapshot.borrow())
            .finish()
    }
}

impl AgentHandle {
    pub(crate) fn new(
        identity: &Identity,
        events: UnboundedSender<AgentEvent>,
        snapshot: watch::Receiver<AgentSnapshot>,
    ) -> Self {
        Self {
            id: identity.id.clone(),
            match_id: identity.match_id.clone(),
            events,
            snapshot,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn current_state(&self) -> AgentState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        *self.snapshot.borrow()
    }

    pub fn is_retired(&self) -> bool {
        self.snapshot.borrow().retired
    }

    /// Ask the driver to retire. Safe to call any number of times, including
    /// after the driver has already stopped.
    pub fn retire(&self) {
        let _ = self.events.send(AgentEvent::Retire);
    }

    /// Resolves once the driver has retired.
    pub async fn retired(&self) {
        let mut rx = self.snapshot.clone();
        let _ = rx.wait_for(|snapshot| snapshot.retired).await;
    }

    /// Resolves once the driver reports `state`. Transient states that are
    /// left again before the observer runs may be missed.
    pub async fn wait_for_state(&self, state: AgentState) {
        let mut rx = self.snapshot.clone();
        let _ = rx.wait_for(|snapshot| snapshot.state == state).await;
    }
}
