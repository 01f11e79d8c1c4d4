//! Process-wide map from bot id to its live driver.
//!
//! At most one driver is registered per id. Drivers remove themselves on
//! retirement through a callback stamped with a registration token, so a
//! retiring driver that has already been replaced cannot evict its successor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::{debug, info};
use tokio::sync::Notify;

use crate::agent::{Agent, AgentHandle, Identity, RetirementCallback};
use crate::config::AgentConfig;
use crate::prediction::PredictionClient;
use crate::transport::Connector;

/// Result of [`Registry::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExisted,
}

struct Entry {
    token: u64,
    handle: AgentHandle,
}

struct Inner {
    agents: Mutex<HashMap<String, Entry>>,
    next_token: AtomicU64,
    idle: Notify,
    target: String,
    config: AgentConfig,
    connector: Arc<dyn Connector>,
    predictor: Arc<dyn PredictionClient>,
}

impl Inner {
    fn agents(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.agents.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, id: &str, token: u64) {
        let mut agents = self.agents();
        if agents.get(id).is_some_and(|entry| entry.token == token) {
            agents.remove(id);
            debug!("agent {} removed from registry ({} left)", id, agents.len());
        }
        if agents.is_empty() {
            self.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    /// Drivers created through this registry connect to `target` and share
    /// `connector` and `predictor`.
    pub fn new(
        target: impl Into<String>,
        config: AgentConfig,
        connector: Arc<dyn Connector>,
        predictor: Arc<dyn PredictionClient>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                agents: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                idle: Notify::new(),
                target: target.into(),
                config,
                connector,
                predictor,
            }),
        }
    }

    /// Ensure a driver is playing `identity.match_id` as `identity.id`.
    ///
    /// A live driver for the same id and match is left alone. A driver for
    /// the same id but another match is retired, and its connection closed,
    /// before the replacement is spawned.
    pub async fn create(&self, identity: Identity) -> CreateOutcome {
        loop {
            let (old_token, old) = {
                let mut agents = self.inner.agents();
                let existing = agents
                    .get(&identity.id)
                    .map(|entry| (entry.token, entry.handle.clone()));
                match existing {
                    Some((_, handle))
                        if handle.match_id() == identity.match_id && !handle.is_retired() =>
                    {
                        info!("agent {} already playing match {}", identity.id, identity.match_id);
                        return CreateOutcome::AlreadyExisted;
                    }
                    Some(existing) => existing,
                    None => {
                        let id = identity.id.clone();
                        let (token, handle) = self.spawn(identity);
                        agents.insert(id, Entry { token, handle });
                        return CreateOutcome::Created;
                    }
                }
            };
            info!(
                "replacing agent {} (match {} -> {})",
                identity.id,
                old.match_id(),
                identity.match_id
            );
            old.retire();
            old.retired().await;
            // A driver that stopped without running its callback must not
            // block the slot forever.
            self.inner.remove(&identity.id, old_token);
        }
    }

    fn spawn(&self, identity: Identity) -> (u64, AgentHandle) {
        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst);
        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        let on_retired: RetirementCallback = {
            let id = identity.id.clone();
            Box::new(move || {
                if let Some(inner) = registry.upgrade() {
                    inner.remove(&id, token);
                }
            })
        };
        let handle = Agent::spawn(
            identity,
            self.inner.target.clone(),
            self.inner.config.clone(),
            self.inner.connector.clone(),
            self.inner.predictor.clone(),
            Some(on_retired),
        );
        (token, handle)
    }

    /// Number of registered drivers.
    pub fn count(&self) -> usize {
        self.inner.agents().len()
    }

    pub fn get(&self, id: &str) -> Option<AgentHandle> {
        self.inner.agents().get(id).map(|entry| entry.handle.clone())
    }

    /// Ask every registered driver to retire.
    pub fn retire_all(&self) {
        for entry in self.inner.agents().values() {
            entry.handle.retire();
        }
    }

    /// Resolves once no drivers are registered.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}
