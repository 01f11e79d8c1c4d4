//! Driver state machine: a fixed table of legal transitions and a guard
//! against transitions requested while another one is still being handled.

use core::fmt;

/// States a bot driver moves through during a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    Connecting,
    Connected,
    Disconnected,
    WaitingForConfig,
    Positioning,
    WaitingForTurn,
    Attacking,
    BonusAttack,
    WonGame,
    LostGame,
}

use AgentState::*;

impl AgentState {
    pub const ALL: [AgentState; 10] = [
        Connecting,
        Connected,
        Disconnected,
        WaitingForConfig,
        Positioning,
        WaitingForTurn,
        Attacking,
        BonusAttack,
        WonGame,
        LostGame,
    ];

    /// States reachable in one step from `self`.
    ///
    /// Every non-terminal state other than `Disconnected` may also drop to
    /// `Disconnected`; that edge is listed explicitly per state.
    pub const fn successors(self) -> &'static [AgentState] {
        match self {
            Connecting => &[Connected, Disconnected],
            Connected => &[WaitingForConfig, Disconnected],
            Disconnected => &[Connecting],
            WaitingForConfig => &[
                WaitingForConfig,
                Positioning,
                WaitingForTurn,
                Attacking,
                BonusAttack,
                Disconnected,
            ],
            Positioning => &[
                WaitingForConfig,
                Positioning,
                WaitingForTurn,
                Attacking,
                BonusAttack,
                Disconnected,
            ],
            WaitingForTurn => &[
                WaitingForTurn,
                Attacking,
                BonusAttack,
                WaitingForConfig,
                WonGame,
                LostGame,
                Disconnected,
            ],
            Attacking => &[
                WaitingForTurn,
                BonusAttack,
                WaitingForConfig,
                WonGame,
                LostGame,
                Disconnected,
            ],
            BonusAttack => &[
                WaitingForTurn,
                Attacking,
                WaitingForConfig,
                WonGame,
                LostGame,
                Disconnected,
            ],
            WonGame | LostGame => &[],
        }
    }

    pub fn can_transit_to(self, next: AgentState) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A transition request the machine refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("illegal transition {from} -> {to}")]
    Illegal { from: AgentState, to: AgentState },
    /// Requested from inside the handling of another transition; it should
    /// have been deferred instead.
    #[error("transition to {to} requested while entering {current}")]
    Reentrant { current: AgentState, to: AgentState },
}

/// Current state plus an "entering" flag held while the caller runs the
/// entry behaviour of the state it just moved to.
#[derive(Debug)]
pub struct StateMachine {
    current: AgentState,
    entering: bool,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// A fresh machine is already `Connecting`.
    pub fn new() -> Self {
        Self {
            current: Connecting,
            entering: false,
        }
    }

    pub fn current(&self) -> AgentState {
        self.current
    }

    /// Move to `next` and mark the machine as entering it. The caller must
    /// call [`StateMachine::entered`] once the entry behaviour has returned.
    pub fn begin(&mut self, next: AgentState) -> Result<AgentState, TransitionError> {
        if self.entering {
            return Err(TransitionError::Reentrant {
                current: self.current,
                to: next,
            });
        }
        if !self.current.can_transit_to(next) {
            return Err(TransitionError::Illegal {
                from: self.current,
                to: next,
            });
        }
        let previous = self.current;
        self.current = next;
        self.entering = true;
        Ok(previous)
    }

    pub fn entered(&mut self) {
        self.entering = false;
    }

    /// Validate and apply a transition that has no entry behaviour.
    pub fn transit_to(&mut self, next: AgentState) -> Result<AgentState, TransitionError> {
        let previous = self.begin(next)?;
        self.entered();
        Ok(previous)
    }

    pub fn is_entering(&self) -> bool {
        self.entering
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_successors() {
        assert!(WonGame.is_terminal());
        assert!(LostGame.is_terminal());
        assert!(AgentState::ALL
            .iter()
            .filter(|s| !matches!(s, WonGame | LostGame))
            .all(|s| !s.is_terminal()));
    }

    #[test]
    fn begin_blocks_nested_requests_until_entered() {
        let mut sm = StateMachine::new();
        sm.begin(Connected).unwrap();
        assert_eq!(
            sm.begin(WaitingForConfig),
            Err(TransitionError::Reentrant {
                current: Connected,
                to: WaitingForConfig
            })
        );
        sm.entered();
        assert_eq!(sm.transit_to(WaitingForConfig), Ok(Connected));
    }

    #[test]
    fn rejected_transition_leaves_state_unchanged() {
        let mut sm = StateMachine::new();
        assert_eq!(
            sm.transit_to(Attacking),
            Err(TransitionError::Illegal {
                from: Connecting,
                to: Attacking
            })
        );
        assert_eq!(sm.current(), Connecting);
        assert!(!sm.is_entering());
    }
}
