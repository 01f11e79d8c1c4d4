//! The protocol driver: one bot, one connection, one state machine.
//!
//! Each driver runs as its own task and is the only code that mutates its
//! state. Connection events, timer expiries and prediction answers all arrive
//! as [`AgentEvent`]s on a single queue and are handled one at a time. Follow-up
//! transitions requested while a state is being entered go onto a deferred
//! queue that is drained only after the current transition has finished.

mod attack;
mod handle;

pub use attack::{paced_choice, AttackChoice, AttackPlan};
pub use handle::{AgentHandle, AgentSnapshot, Identity};

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::common::TargetError;
use crate::config::{AgentConfig, NORMAL_CLOSURE};
use crate::domain::{MatchConfig, MatchPhase};
use crate::prediction::PredictionClient;
use crate::protocol::{self, ConnectionPayload, IncomingMessage, OutgoingMessage, NO_BONUS_HITS};
use crate::ship::ShipLayout;
use crate::state_machine::{AgentState, StateMachine};
use crate::transport::{Connector, FrameSink, LinkEvent};

/// Invoked exactly once when a driver retires.
pub type RetirementCallback = Box<dyn FnOnce() + Send + 'static>;

pub(crate) enum AgentEvent {
    Opened {
        generation: u64,
        sink: Box<dyn FrameSink>,
    },
    Link {
        generation: u64,
        event: LinkEvent,
    },
    AttackReady {
        attempt: u64,
        choice: Result<AttackChoice, TargetError>,
    },
    Retire,
}

struct Outbound {
    due: Instant,
    generation: u64,
    message: OutgoingMessage,
}

pub struct Agent {
    identity: Identity,
    target: String,
    config: AgentConfig,
    connector: Arc<dyn Connector>,
    predictor: Arc<dyn PredictionClient>,
    fsm: StateMachine,
    match_config: Option<MatchConfig>,
    sink: Option<Box<dyn FrameSink>>,
    link_task: Option<JoinHandle<()>>,
    /// Bumped for every connection attempt; events from older connections
    /// are ignored.
    generation: u64,
    reconnect_attempts: u32,
    /// Stamp of the current attack decision; stale answers are discarded.
    attack_attempt: u64,
    reconnect_at: Option<Instant>,
    outbox: VecDeque<Outbound>,
    deferred: VecDeque<AgentState>,
    events_tx: UnboundedSender<AgentEvent>,
    events_rx: UnboundedReceiver<AgentEvent>,
    snapshot_tx: watch::Sender<AgentSnapshot>,
    on_retired: Option<RetirementCallback>,
    retired: bool,
}

impl Agent {
    /// Start a driver on the current tokio runtime. It begins in
    /// `Connecting` and its first connection attempt is made from its own
    /// task.
    pub fn spawn(
        identity: Identity,
        target: impl Into<String>,
        config: AgentConfig,
        connector: Arc<dyn Connector>,
        predictor: Arc<dyn PredictionClient>,
        on_retired: Option<RetirementCallback>,
    ) -> AgentHandle {
        info!(
            "creating a new agent with uuid {} and username {}",
            identity.id, identity.display_name
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(AgentSnapshot::initial());
        let handle = AgentHandle::new(&identity, events_tx.clone(), snapshot_rx);

        let agent = Agent {
            identity,
            target: target.into(),
            config,
            connector,
            predictor,
            fsm: StateMachine::new(),
            match_config: None,
            sink: None,
            link_task: None,
            generation: 0,
            reconnect_attempts: 0,
            attack_attempt: 0,
            reconnect_at: None,
            outbox: VecDeque::new(),
            deferred: VecDeque::new(),
            events_tx,
            events_rx,
            snapshot_tx,
            on_retired,
            retired: false,
        };
        tokio::spawn(agent.run());
        handle
    }

    fn id(&self) -> &str {
        &self.identity.id
    }

    async fn run(mut self) {
        info!("Agent {} entering state: {}", self.id(), self.fsm.current());
        self.enter(AgentState::Connecting).await;
        self.publish();
        self.drain_deferred().await;

        while !self.retired {
            let deadline = self.next_deadline();
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = wait_until(deadline) => self.fire_timers().await,
            }
            self.drain_deferred().await;
        }
        debug!("agent {} event loop finished", self.id());
    }

    fn next_deadline(&self) -> Option<Instant> {
        let send_due = self.outbox.front().map(|out| out.due);
        match (self.reconnect_at, send_due) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn publish(&self) {
        let snapshot = AgentSnapshot {
            state: self.fsm.current(),
            reconnect_attempts: self.reconnect_attempts,
            generation: self.generation,
            retired: self.retired,
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Validate and apply a transition, then run the new state's entry
    /// behaviour. Illegal requests are reported and leave the state as is.
    async fn transit(&mut self, next: AgentState) {
        if self.retired {
            return;
        }
        if let Err(e) = self.fsm.begin(next) {
            error!("Agent {} rejected state change: {}", self.id(), e);
            return;
        }
        info!("Agent {} entering state: {}", self.id(), next);
        self.enter(next).await;
        self.fsm.entered();
        self.publish();
    }

    /// Queue a transition to run once the current one has completed.
    fn defer(&mut self, next: AgentState) {
        self.deferred.push_back(next);
    }

    async fn drain_deferred(&mut self) {
        while let Some(next) = self.deferred.pop_front() {
            self.transit(next).await;
        }
    }

    async fn enter(&mut self, state: AgentState) {
        match state {
            AgentState::Connecting => self.connect().await,
            AgentState::Connected => {
                self.reconnect_attempts = 0;
                info!("Agent {} sending connection payload", self.id());
                self.queue_send(OutgoingMessage::Connection(ConnectionPayload {
                    username: self.identity.display_name.clone(),
                    player_id: self.identity.id.clone(),
                    game_id: self.identity.match_id.clone(),
                }));
                self.defer(AgentState::WaitingForConfig);
            }
            AgentState::Disconnected => {
                self.sink = None;
                self.reconnect_at = Some(Instant::now() + self.config.reconnect_delay);
            }
            AgentState::WaitingForConfig => debug!("Agent {} waiting for config", self.id()),
            AgentState::WaitingForTurn => debug!("Agent {} waiting for their turn", self.id()),
            AgentState::Positioning => {
                let grid_size = self.config.grid_size;
                let layout = self
                    .match_config
                    .as_ref()
                    .and_then(|config| config.suggested_layout(grid_size))
                    .cloned()
                    .unwrap_or_else(ShipLayout::fallback);
                self.queue_send(OutgoingMessage::ShipPositions(layout));
            }
            AgentState::Attacking | AgentState::BonusAttack => self.begin_attack(),
            AgentState::WonGame | AgentState::LostGame => {
                let match_id = self
                    .match_config
                    .as_ref()
                    .map(|config| config.match_info.uuid.as_str())
                    .unwrap_or("unknown");
                let outcome = if state == AgentState::WonGame { "won" } else { "lost" };
                info!("Agent {} {} their match ({})", self.id(), outcome, match_id);
                self.retire().await;
            }
        }
    }

    /// Entry behaviour of `Connecting`: give up once the attempt counter has
    /// gone past its maximum, otherwise replace any previous connection with
    /// a new one.
    async fn connect(&mut self) {
        if self.reconnect_attempts > self.config.max_reconnect_attempts {
            error!(
                "Agent {} giving up after {} connection attempts",
                self.id(),
                self.reconnect_attempts
            );
            self.retire().await;
            return;
        }
        self.reconnect_attempts += 1;
        self.generation += 1;
        self.attack_attempt += 1;
        self.reconnect_at = None;

        if let Some(task) = self.link_task.take() {
            task.abort();
        }
        if let Some(mut sink) = self.sink.take() {
            debug!("closing old connection for agent {}", self.id());
            if let Err(e) = sink.close(NORMAL_CLOSURE).await {
                debug!("closing old connection failed: {}", e);
            }
        }

        info!(
            "Agent {} connecting to {} (attempt {})",
            self.id(),
            self.target,
            self.reconnect_attempts
        );
        let generation = self.generation;
        let connector = self.connector.clone();
        let target = self.target.clone();
        let events = self.events_tx.clone();
        self.link_task = Some(tokio::spawn(async move {
            let mut source = match connector.connect(&target).await {
                Ok((sink, source)) => {
                    let _ = events.send(AgentEvent::Opened { generation, sink });
                    source
                }
                Err(e) => {
                    let _ = events.send(AgentEvent::Link {
                        generation,
                        event: LinkEvent::Error(e.to_string()),
                    });
                    let _ = events.send(AgentEvent::Link {
                        generation,
                        event: LinkEvent::Closed(None),
                    });
                    return;
                }
            };
            loop {
                let event = source.recv().await;
                let closed = matches!(event, LinkEvent::Closed(_));
                if events.send(AgentEvent::Link { generation, event }).is_err() || closed {
                    break;
                }
            }
        }));
    }

    async fn handle_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Opened { generation, sink } => {
                if generation != self.generation {
                    debug!("agent {} dropping stale connection", self.id());
                    return;
                }
                self.sink = Some(sink);
                self.transit(AgentState::Connected).await;
            }
            AgentEvent::Link { generation, event } => {
                if generation != self.generation {
                    trace!("agent {} ignoring event from old connection", self.id());
                    return;
                }
                self.handle_link_event(event).await;
            }
            AgentEvent::AttackReady { attempt, choice } => self.finish_attack(attempt, choice).await,
            AgentEvent::Retire => self.retire().await,
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Text(frame) => match protocol::decode(&frame) {
                Ok(msg) => self.handle_message(msg).await,
                Err(e) => warn!("agent {} dropped inbound frame: {}", self.id(), e),
            },
            // The close event that follows drives recovery.
            LinkEvent::Error(e) => error!("socket for player {} failed: {}", self.id(), e),
            LinkEvent::Closed(Some(NORMAL_CLOSURE)) => {
                info!("socket for player {} closed normally", self.id());
                self.sink = None;
                self.retire().await;
            }
            LinkEvent::Closed(code) => {
                warn!("socket for player {} closed with code {:?}", self.id(), code);
                self.sink = None;
                self.transit(AgentState::Disconnected).await;
            }
        }
    }

    async fn handle_message(&mut self, msg: IncomingMessage) {
        match msg {
            IncomingMessage::Configuration(config) => {
                trace!("Agent {} stored new config: {:?}", self.id(), config);
                self.match_config = Some(*config);
                let next = self.route_configuration();
                self.transit(next).await;
            }
            IncomingMessage::AttackResult(config) | IncomingMessage::BonusResult(config) => {
                self.match_config = Some(*config);
                let next = self.route_result();
                self.transit(next).await;
            }
            IncomingMessage::Heartbeat(_) | IncomingMessage::ScoreUpdate(_) => {
                debug!("agent {} received {}", self.id(), msg.kind());
            }
            IncomingMessage::ServerError(data)
            | IncomingMessage::BadMessageType(data)
            | IncomingMessage::InvalidPayload(data) => {
                warn!("agent {} received a server complaint: {}", self.id(), data);
            }
        }
    }

    fn route_configuration(&self) -> AgentState {
        let Some(config) = self.match_config.as_ref() else {
            return AgentState::WaitingForConfig;
        };
        if config.is_paused_or_stopped() {
            AgentState::WaitingForConfig
        } else if !config.has_valid_positions() {
            AgentState::Positioning
        } else {
            self.route_turn(config)
        }
    }

    fn route_result(&self) -> AgentState {
        let Some(config) = self.match_config.as_ref() else {
            return AgentState::WaitingForConfig;
        };
        match config.winner() {
            Some(winner) if winner == self.identity.id => AgentState::WonGame,
            Some(_) => AgentState::LostGame,
            None => self.route_turn(config),
        }
    }

    fn route_turn(&self, config: &MatchConfig) -> AgentState {
        match config.turn_phase_for(&self.identity.id) {
            Some(MatchPhase::Attack) => AgentState::Attacking,
            Some(MatchPhase::Bonus) => AgentState::BonusAttack,
            _ => AgentState::WaitingForTurn,
        }
    }

    /// Entry behaviour of `Attacking` and `BonusAttack`. The prediction call
    /// runs on its own task; its answer comes back as an event.
    fn begin_attack(&mut self) {
        self.attack_attempt += 1;
        let started = Instant::now();
        let Some(config) = self.match_config.as_ref() else {
            warn!("Agent {} has no config to attack with", self.id());
            self.defer(AgentState::WaitingForConfig);
            return;
        };
        if config.match_info.state.phase == MatchPhase::Bonus {
            debug!("Agent {} sending bonus payload", self.id());
            self.queue_send(OutgoingMessage::Bonus(NO_BONUS_HITS));
            return;
        }

        debug!("determining attack cell for {}", self.id());
        let plan = AttackPlan::from_config(self.config.grid_size, config);
        let attempt = self.attack_attempt;
        let predictor = self.predictor.clone();
        let min_delay = self.config.min_attack_delay;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let choice = paced_choice(plan, predictor, started, min_delay).await;
            let _ = events.send(AgentEvent::AttackReady { attempt, choice });
        });
    }

    async fn finish_attack(&mut self, attempt: u64, choice: Result<AttackChoice, TargetError>) {
        let current = self.fsm.current();
        if attempt != self.attack_attempt
            || !matches!(current, AgentState::Attacking | AgentState::BonusAttack)
        {
            info!(
                "Agent {} discarding stale attack decision (now {})",
                self.id(),
                current
            );
            return;
        }
        match choice {
            Ok(choice) => {
                info!("Agent {} attacking cell: {}", self.id(), choice.target);
                self.queue_send(OutgoingMessage::Attack(choice.into_payload()));
            }
            Err(e) => {
                error!("Agent {} was unable to attack: {}", self.id(), e);
                self.retire().await;
            }
        }
    }

    /// Schedule `message` for transmission after the pacing delay.
    fn queue_send(&mut self, message: OutgoingMessage) {
        self.outbox.push_back(Outbound {
            due: Instant::now() + self.config.send_delay,
            generation: self.generation,
            message,
        });
    }

    async fn fire_timers(&mut self) {
        let now = Instant::now();
        while self.outbox.front().is_some_and(|out| out.due <= now) {
            if let Some(out) = self.outbox.pop_front() {
                self.transmit(out).await;
            }
        }
        if self.reconnect_at.is_some_and(|at| at <= now) {
            self.reconnect_at = None;
            self.transit(AgentState::Connecting).await;
        }
    }

    /// Write a due message, or drop it if its connection is no longer open.
    async fn transmit(&mut self, out: Outbound) {
        let kind = out.message.kind();
        let id = self.identity.id.clone();
        let sink = match self.sink.as_mut() {
            Some(sink) if sink.is_open() && out.generation == self.generation => sink,
            _ => {
                warn!(
                    "player agent {} attempted to send \"{}\" data when socket was not open",
                    id, kind
                );
                return;
            }
        };
        let frame = match protocol::encode(&out.message) {
            Ok(frame) => frame,
            Err(e) => {
                error!("agent {} could not encode {}: {}", id, kind, e);
                return;
            }
        };
        trace!("Agent {} sending \"{}\" with payload: {}", id, kind, frame);
        if let Err(e) = sink.send(frame).await {
            warn!("agent {} failed to send {}: {}", id, kind, e);
        }
    }

    /// Shut the driver down for good. Close handling is detached first so
    /// the close below cannot trigger a reconnect.
    async fn retire(&mut self) {
        if self.retired {
            return;
        }
        info!("Agent {} is being retired", self.id());
        self.retired = true;
        self.generation += 1;
        self.attack_attempt += 1;
        self.reconnect_at = None;
        self.outbox.clear();
        self.deferred.clear();

        if let Some(task) = self.link_task.take() {
            task.abort();
        }
        if let Some(mut sink) = self.sink.take() {
            if sink.is_open() {
                if let Err(e) = sink.close(NORMAL_CLOSURE).await {
                    warn!("agent {} failed to close its connection: {}", self.id(), e);
                }
            }
        }
        if let Some(callback) = self.on_retired.take() {
            callback();
        }
        self.publish();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
