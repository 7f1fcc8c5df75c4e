//! Lifecycle of polling sessions: at most one running loop per scope.

use super::{Poller, RequestTicket, ScopeKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lower bound applied to every polling interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct PollSession {
    interval: Duration,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollSession {
    fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

/// Owns every polling loop of a chat session.
///
/// Sessions are stopped when replaced, on [`PollingManager::stop`], and when
/// the manager is dropped.
#[derive(Default)]
pub struct PollingManager {
    sessions: Mutex<HashMap<ScopeKey, PollSession>>,
    sequences: Mutex<HashMap<ScopeKey, Arc<AtomicU64>>>,
}

impl PollingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling `scope`: one fetch immediately, then one per `period`.
    ///
    /// A session already running for `scope` is cancelled first. Must be
    /// called from within a Tokio runtime.
    pub fn start<P: Poller>(&self, scope: ScopeKey, period: Duration, poller: P) {
        let period = period.max(MIN_POLL_INTERVAL);
        let sequence = self.sequence(scope);

        let mut sessions = self.sessions();
        if let Some(previous) = sessions.remove(&scope) {
            previous.token.cancel();
            debug!(%scope, "restarting polling session");
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(run_session(scope, period, poller, token.clone(), sequence));
        sessions.insert(
            scope,
            PollSession {
                interval: period,
                token,
                task,
            },
        );
    }

    /// Stop polling `scope`. Returns whether a session was running.
    pub fn stop(&self, scope: ScopeKey) -> bool {
        match self.sessions().remove(&scope) {
            Some(session) => {
                session.token.cancel();
                debug!(%scope, "polling session stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        for (scope, session) in self.sessions().drain() {
            session.token.cancel();
            debug!(%scope, "polling session stopped");
        }
    }

    pub fn is_active(&self, scope: ScopeKey) -> bool {
        self.sessions()
            .get(&scope)
            .is_some_and(PollSession::is_running)
    }

    pub fn active_scopes(&self) -> Vec<ScopeKey> {
        self.sessions()
            .iter()
            .filter(|(_, session)| session.is_running())
            .map(|(scope, _)| *scope)
            .collect()
    }

    pub fn interval(&self, scope: ScopeKey) -> Option<Duration> {
        self.sessions().get(&scope).map(|session| session.interval)
    }

    /// Ticket for a fetch made outside the loop (manual refresh). Issuing it
    /// invalidates any older request still in flight for `scope`.
    pub fn issue(&self, scope: ScopeKey) -> RequestTicket {
        let sequence = self.sequence(scope);
        let token = self
            .sessions()
            .get(&scope)
            .map(|session| session.token.clone())
            .unwrap_or_default();
        RequestTicket::issue(scope, &sequence, token)
    }

    /// Make every request already in flight for `scope` stale without
    /// starting a new one. The running loop, if any, keeps its schedule.
    pub fn supersede(&self, scope: ScopeKey) {
        self.sequence(scope).fetch_add(1, Ordering::SeqCst);
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ScopeKey, PollSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sequence(&self, scope: ScopeKey) -> Arc<AtomicU64> {
        let mut sequences = self.sequences.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sequences.entry(scope).or_default())
    }
}

impl Drop for PollingManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn run_session<P: Poller>(
    scope: ScopeKey,
    period: Duration,
    poller: P,
    token: CancellationToken,
    sequence: Arc<AtomicU64>,
) {
    let mut ticker = interval(period);
    // A tick that fires while a fetch is pending is dropped, not queued.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(%scope, ?period, "polling session started");

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let ticket = RequestTicket::issue(scope, &sequence, token.clone());
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = poller.fetch() => result,
        };

        match result {
            Ok(output) if ticket.is_current() => poller.apply(&ticket, output).await,
            Ok(_) => {
                debug!(%scope, request_id = ticket.request_id(), "discarding stale poll result");
            }
            Err(err) => {
                warn!(%scope, %err, "poll fetch failed");
                poller.on_error(&ticket, err).await;
            }
        }
    }
}
