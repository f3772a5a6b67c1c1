//! Reference analysis: which call sites of the loader method use which code.
//!
//! One pass walks every program unit of a [`ReferenceGraph`], resolves the
//! first argument of each loader call back to a code and publishes the
//! resulting map to subscribers. Passes are serialized by a one-permit
//! semaphore; a pass requested while another runs is dropped, and a pass
//! requested while nothing changed only re-publishes.

use sqlnav_api::{
    ArgumentExpr, CallSite, Code, LocationKey, MethodQuery, ReferenceGraph, ReferenceLocation,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub type ReferenceMap = HashMap<Code, Vec<ReferenceLocation>>;
pub type RefreshCallback = Arc<dyn Fn() + Send + Sync>;

/// Returned by [`ReferenceAnalyzer::get_count`] until a pass has completed.
pub const COUNT_UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// Nobody is listening, nothing was computed.
    NoSubscribers,
    /// Nothing changed since the last pass; subscribers were notified again.
    Republished,
    /// Another pass is running.
    Busy,
    Completed { codes: usize, references: usize },
    /// The pass finished after `dispose()` and its result was dropped.
    Discarded,
    /// The graph could not list its units; the previous map is kept.
    Failed(String),
}

struct Clock {
    /// Start instant of the last completed pass.
    computed_at: Option<Instant>,
    changed_at: Instant,
}

impl Clock {
    fn new() -> Self {
        Self {
            computed_at: None,
            changed_at: Instant::now(),
        }
    }

    fn is_fresh(&self) -> bool {
        self.computed_at.is_some_and(|at| self.changed_at < at)
    }
}

struct State {
    clock: Clock,
    references: Arc<ReferenceMap>,
    /// Bumped by `dispose()`; a pass only publishes into the epoch it started in.
    epoch: u64,
}

pub struct ReferenceAnalyzer {
    query: MethodQuery,
    gate: Semaphore,
    state: RwLock<State>,
    subscribers: Mutex<Vec<(SubscriptionId, RefreshCallback)>>,
    next_subscription: AtomicU64,
}

impl ReferenceAnalyzer {
    pub fn new(query: MethodQuery) -> Self {
        Self {
            query,
            gate: Semaphore::new(1),
            state: RwLock::new(State {
                clock: Clock::new(),
                references: Arc::new(HashMap::new()),
                epoch: 0,
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub fn query(&self) -> &MethodQuery {
        &self.query
    }

    /// Record that sources changed. Does not start a pass.
    pub fn notify_external_change(&self) {
        self.write_state().clock.changed_at = Instant::now();
    }

    pub fn is_computed(&self) -> bool {
        self.read_state().clock.computed_at.is_some()
    }

    pub fn is_stale(&self) -> bool {
        !self.read_state().clock.is_fresh()
    }

    /// Number of call sites using `code`, or [`COUNT_UNKNOWN`] before the first
    /// completed pass.
    pub fn get_count(&self, code: &Code) -> i64 {
        let state = self.read_state();
        if state.clock.computed_at.is_none() {
            return COUNT_UNKNOWN;
        }
        state
            .references
            .get(code)
            .map_or(0, |locations| locations.len() as i64)
    }

    pub fn references(&self, code: &Code) -> Vec<ReferenceLocation> {
        self.read_state()
            .references
            .get(code)
            .cloned()
            .unwrap_or_default()
    }

    /// Codes with at least one reference, sorted.
    pub fn codes(&self) -> Vec<Code> {
        let mut codes: Vec<Code> = self.read_state().references.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn snapshot(&self) -> Arc<ReferenceMap> {
        self.read_state().references.clone()
    }

    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Run one pass over `graph` if anyone listens and anything changed.
    pub async fn recompute<G>(&self, graph: &G) -> RecomputeOutcome
    where
        G: ReferenceGraph + ?Sized,
    {
        if self.subscriber_count() == 0 {
            return RecomputeOutcome::NoSubscribers;
        }
        if self.read_state().clock.is_fresh() {
            // Late subscribers still need one notification to leave "loading"
            self.publish();
            return RecomputeOutcome::Republished;
        }
        let Ok(permit) = self.gate.try_acquire() else {
            debug!("Reference pass already running, request dropped");
            return RecomputeOutcome::Busy;
        };

        let (epoch, started) = (self.read_state().epoch, Instant::now());
        let references = match self.scan(graph).await {
            Ok(references) => references,
            Err(message) => {
                warn!("Reference pass failed: {}", message);
                return RecomputeOutcome::Failed(message);
            }
        };
        let codes = references.len();
        let total = references.values().map(Vec::len).sum();

        {
            let mut state = self.write_state();
            if state.epoch != epoch {
                debug!("Reference pass finished after dispose, result dropped");
                return RecomputeOutcome::Discarded;
            }
            state.references = Arc::new(references);
            state.clock.computed_at = Some(started);
        }
        drop(permit);

        info!(
            "Reference pass complete: {} references to {} codes in {:?}",
            total,
            codes,
            started.elapsed()
        );
        self.publish();
        RecomputeOutcome::Completed {
            codes,
            references: total,
        }
    }

    /// Forget everything: map, timestamps and subscribers. Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.write_state();
            state.clock = Clock::new();
            state.references = Arc::new(HashMap::new());
            state.epoch += 1;
        }
        self.lock_subscribers().clear();
    }

    async fn scan<G>(&self, graph: &G) -> Result<ReferenceMap, String>
    where
        G: ReferenceGraph + ?Sized,
    {
        let units = graph.units().await.map_err(|e| e.to_string())?;

        let mut references: ReferenceMap = HashMap::new();
        let mut seen: HashSet<LocationKey> = HashSet::new();

        for unit in &units {
            let method = match graph.find_method(unit, &self.query).await {
                Ok(Some(method)) => method,
                Ok(None) => {
                    debug!("{} does not see {}", unit, self.query.type_name);
                    continue;
                }
                Err(err) => {
                    warn!("Skipping unit {}: {}", unit, err);
                    continue;
                }
            };

            let sites = match graph.find_call_sites(&method).await {
                Ok(sites) => sites,
                Err(err) => {
                    warn!("Failed to find call sites from {}: {}", unit, err);
                    continue;
                }
            };

            for site in sites {
                let Some(code) = resolve_argument(graph, &site).await else {
                    continue;
                };
                if seen.insert(site.location.key()) {
                    references.entry(code).or_default().push(site.location);
                }
            }
        }

        Ok(references)
    }

    fn publish(&self) {
        // Callbacks may subscribe, unsubscribe or query; never call them locked
        let callbacks: Vec<RefreshCallback> = self
            .lock_subscribers()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, RefreshCallback)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Statically resolve the first argument of a loader call.
///
/// Accepts a string literal, or a name whose declaration is initialized with
/// a string literal. Deeper chains are not followed.
pub async fn resolve_argument<G>(graph: &G, site: &CallSite) -> Option<Code>
where
    G: ReferenceGraph + ?Sized,
{
    let value = match site.argument.as_ref()? {
        ArgumentExpr::StringLiteral(value) => value.clone(),
        ArgumentExpr::Symbol(symbol) => match graph.declaration_initializer(symbol).await {
            Ok(Some(ArgumentExpr::StringLiteral(value))) => value,
            Ok(_) => return None,
            Err(err) => {
                debug!("Cannot resolve {} at {}: {}", symbol.name, symbol.file.display(), err);
                return None;
            }
        },
        ArgumentExpr::Other => return None,
    };

    let value = value.trim();
    (!value.is_empty()).then(|| Code::new(value))
}
