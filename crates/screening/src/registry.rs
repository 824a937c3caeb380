//! Session registry
//!
//! Keyed by provider call id. Each call gets its own [`SessionSlot`] whose
//! async mutex serializes event handling for that call only; distinct calls
//! never contend on anything but the map shard for the duration of a lookup.
//!
//! Non-terminal sessions are evicted after `idle_timeout`; ended sessions are
//! kept for `ended_retention` so late or duplicate webhooks stay no-ops.
//! Eviction happens lazily on lookup and periodically via [`SessionRegistry::start_sweeper`].

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, MutexGuard};
use tokio::time::Instant;

use callguard_config::SessionsConfig;
use callguard_core::CallSession;

/// Eviction timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    pub idle_timeout: Duration,
    pub ended_retention: Duration,
    pub sweep_interval: Duration,
}

impl RegistryConfig {
    pub fn from_config(config: &SessionsConfig) -> Self {
        Self {
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            ended_retention: Duration::from_secs(config.ended_retention_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::from_config(&SessionsConfig::default())
    }
}

/// One call's session plus the bookkeeping the registry needs without
/// taking the session lock
pub struct SessionSlot {
    session: tokio::sync::Mutex<CallSession>,
    last_activity: Mutex<Instant>,
    ended: AtomicBool,
}

impl SessionSlot {
    fn new(call_id: &str) -> Self {
        Self {
            session: tokio::sync::Mutex::new(CallSession::new(call_id)),
            last_activity: Mutex::new(Instant::now()),
            ended: AtomicBool::new(false),
        }
    }

    /// Exclusive access to the session; held for the whole of one event
    pub async fn lock(&self) -> MutexGuard<'_, CallSession> {
        self.session.lock().await
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Flag the slot for the shorter ended-retention clock
    pub fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    pub fn is_expired(&self, config: &RegistryConfig) -> bool {
        let limit = if self.is_ended() {
            config.ended_retention
        } else {
            config.idle_timeout
        };
        self.idle_for() > limit
    }

    /// Expired and nobody is mid-event on it
    fn is_evictable(&self, config: &RegistryConfig) -> bool {
        self.is_expired(config) && self.session.try_lock().is_ok()
    }
}

/// Concurrent map of call id to session
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionSlot>>,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Fetch the slot for `call_id`, creating it if absent. An expired slot
    /// is replaced by a fresh one.
    pub fn get_or_create(&self, call_id: &str) -> Arc<SessionSlot> {
        let slot = match self.sessions.entry(call_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_evictable(&self.config) {
                    tracing::debug!(call_id = %call_id, "Replacing expired session");
                    occupied.insert(Arc::new(SessionSlot::new(call_id)));
                }
                let slot = Arc::clone(occupied.get());
                slot.touch();
                slot
            },
            Entry::Vacant(vacant) => {
                tracing::debug!(call_id = %call_id, "Created session");
                let slot = Arc::new(SessionSlot::new(call_id));
                vacant.insert(Arc::clone(&slot));
                slot
            },
        };
        self.record_gauge();
        slot
    }

    /// Existing slot, evicting it first if it has expired
    pub fn get(&self, call_id: &str) -> Option<Arc<SessionSlot>> {
        let slot = self.sessions.get(call_id).map(|s| Arc::clone(s.value()))?;
        if slot.is_evictable(&self.config) {
            self.sessions
                .remove_if(call_id, |_, s| Arc::ptr_eq(s, &slot));
            self.record_gauge();
            return None;
        }
        Some(slot)
    }

    pub fn remove(&self, call_id: &str) -> bool {
        let removed = self.sessions.remove(call_id).is_some();
        if removed {
            tracing::debug!(call_id = %call_id, "Removed session");
            self.record_gauge();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired, unlocked slot. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        let config = self.config;
        self.sessions.retain(|_, slot| !slot.is_evictable(&config));
        let after = self.sessions.len();
        self.record_gauge();
        before.saturating_sub(after)
    }

    /// Periodic sweep in the background. Send `true` on the returned channel
    /// to stop it.
    pub fn start_sweeper(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let period = registry.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = registry.sweep();
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = registry.len(),
                                "Session sweep evicted expired sessions"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Session sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Copies of every session, oldest first
    pub async fn snapshot(&self) -> Vec<CallSession> {
        let slots: Vec<Arc<SessionSlot>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut sessions = Vec::with_capacity(slots.len());
        for slot in slots {
            sessions.push(slot.lock().await.clone());
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    pub async fn snapshot_one(&self, call_id: &str) -> Option<CallSession> {
        let slot = self.sessions.get(call_id).map(|s| Arc::clone(s.value()))?;
        let session = slot.lock().await.clone();
        Some(session)
    }

    fn record_gauge(&self) {
        metrics::gauge!("callguard_active_sessions").set(self.sessions.len() as f64);
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
