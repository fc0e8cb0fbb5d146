//! Task poller: submits a backtest and tracks it until a terminal state.
//!
//! A poller drives at most one task at a time. After a successful submission
//! it queries the task status on a fixed cadence, each query running in its
//! own tokio task so a slow reply never delays the next tick. Every piece of
//! work carries the generation it was started under; `submit` and `cancel`
//! bump the generation, so replies belonging to a superseded or cancelled
//! task are recognised and dropped. The outcome callback is consumed by the
//! first terminal reply, which makes resolution happen at most once.
//!
//! The next tick is due one interval after the previous one. A query reply
//! that changes the run of failed queries wakes the ticker, which then
//! re-arms against the backed-off interval.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::{ApiError, FailureKind, SubmissionError, TaskFailure};
use super::object::{
    BacktestRequest, BacktestResult, ResultEnvelope, TaskHandle, TaskStatus, SUBMITTED_STATUS,
};
use crate::gateway::constants::{MAX_POLL_INTERVAL, POLL_INTERVAL, REQUEST_TIMEOUT};
use crate::gateway::BacktestApi;
use crate::platform::Settings;

/// Terminal result of a submitted task
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Resolved(BacktestResult),
    Failed(TaskFailure),
}

/// Callback receiving the outcome of a task
pub type OutcomeCallback = Box<dyn FnOnce(PollOutcome) + Send + 'static>;

/// Lifecycle phase of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Submitting,
    Polling,
}

/// Timing and retry policy of a poller
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Delay between status queries while they succeed
    pub poll_interval: Duration,
    /// Upper bound on waiting for the submission reply
    pub submit_timeout: Duration,
    /// Consecutive failed status queries tolerated before giving up; `None` retries forever
    pub max_poll_failures: Option<u32>,
    /// Interval multiplier applied per consecutive failed query; 1.0 keeps the cadence fixed
    pub backoff_factor: f64,
    /// Ceiling for the backed-off interval
    pub max_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            submit_timeout: REQUEST_TIMEOUT,
            max_poll_failures: None,
            backoff_factor: 1.0,
            max_interval: MAX_POLL_INTERVAL,
        }
    }
}

impl PollerConfig {
    /// Read `poll.*` keys (and `api.timeout` for submission) from settings
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            settings
                .get_int(key)
                .filter(|ms| *ms > 0)
                .map(|ms| Duration::from_millis(ms as u64))
        };

        Self {
            poll_interval: millis("poll.interval").unwrap_or(defaults.poll_interval),
            submit_timeout: settings
                .get_int("api.timeout")
                .filter(|secs| *secs > 0)
                .map(|secs| Duration::from_secs(secs as u64))
                .unwrap_or(defaults.submit_timeout),
            max_poll_failures: settings
                .get_int("poll.max_failures")
                .filter(|n| *n > 0)
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
            backoff_factor: settings
                .get_float("poll.backoff_factor")
                .filter(|f| f.is_finite() && *f >= 1.0)
                .unwrap_or(defaults.backoff_factor),
            max_interval: millis("poll.max_interval").unwrap_or(defaults.max_interval),
        }
    }

    /// Delay before the next query given the current run of failed queries
    pub fn interval_after(&self, failures: u32) -> Duration {
        if failures == 0 || self.backoff_factor <= 1.0 {
            return self.poll_interval;
        }
        let ceiling = self.max_interval.max(self.poll_interval);
        let secs = self.poll_interval.as_secs_f64() * self.backoff_factor.powi(failures.min(64) as i32);
        if !secs.is_finite() || secs >= ceiling.as_secs_f64() {
            ceiling
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

struct PollerState {
    phase: PollerPhase,
    generation: u64,
    handle: Option<TaskHandle>,
    ticker: Option<JoinHandle<()>>,
    on_outcome: Option<OutcomeCallback>,
    consecutive_failures: u32,
}

impl PollerState {
    fn is_polling(&self, generation: u64) -> bool {
        self.generation == generation && self.phase == PollerPhase::Polling
    }

    /// Stop the cadence and forget the task without reporting anything
    fn clear(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.phase = PollerPhase::Idle;
        self.handle = None;
        self.on_outcome = None;
        self.consecutive_failures = 0;
    }

    /// Move to idle and hand back the callback owed this outcome
    fn finish(&mut self, outcome: PollOutcome) -> Option<(OutcomeCallback, PollOutcome)> {
        let callback = self.on_outcome.take();
        self.clear();
        callback.map(|cb| (cb, outcome))
    }
}

struct Shared<A> {
    api: Arc<A>,
    config: PollerConfig,
    state: Mutex<PollerState>,
    /// Signalled when the failure count changes and the pending tick must be re-armed
    reschedule: Notify,
}

impl<A: BacktestApi + 'static> Shared<A> {
    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay until the next tick, or `None` once this generation stopped polling
    fn next_delay(&self, generation: u64) -> Option<Duration> {
        let state = self.lock();
        state
            .is_polling(generation)
            .then(|| self.config.interval_after(state.consecutive_failures))
    }

    async fn run_ticker(self: Arc<Self>, generation: u64, handle: TaskHandle) {
        let mut last_tick = Instant::now();
        while let Some(delay) = self.next_delay(generation) {
            tokio::select! {
                _ = tokio::time::sleep_until(last_tick + delay) => {}
                _ = self.reschedule.notified() => continue,
            }
            if !self.lock().is_polling(generation) {
                break;
            }
            last_tick = Instant::now();
            let shared = Arc::clone(&self);
            let handle = handle.clone();
            tokio::spawn(async move { shared.on_poll_tick(generation, handle).await });
        }
    }

    async fn on_poll_tick(&self, generation: u64, handle: TaskHandle) {
        debug!("Querying status of task {}", handle);
        let reply = self.api.get_status(&handle).await;

        let resolved = {
            let mut state = self.lock();
            if !state.is_polling(generation) {
                debug!("Discarding stale status reply for task {}", handle);
                return;
            }

            match reply {
                Ok(TaskStatus::Pending) | Ok(TaskStatus::Started) => {
                    if state.consecutive_failures > 0 {
                        state.consecutive_failures = 0;
                        self.reschedule.notify_one();
                    }
                    debug!("Task {} still running", handle);
                    return;
                }
                Ok(TaskStatus::Success(ResultEnvelope::Success(result))) => {
                    info!("Task {} finished", handle);
                    state.finish(PollOutcome::Resolved(result))
                }
                Ok(TaskStatus::Success(ResultEnvelope::Error(message))) => {
                    warn!("Task {} completed with backtest error: {}", handle, message);
                    state.finish(PollOutcome::Failed(TaskFailure::new(FailureKind::Business, message)))
                }
                Ok(TaskStatus::Failure(message)) => {
                    warn!("Task {} failed: {}", handle, message);
                    state.finish(PollOutcome::Failed(TaskFailure::new(FailureKind::Task, message)))
                }
                Err(e) if e.is_transient() => {
                    state.consecutive_failures += 1;
                    let failures = state.consecutive_failures;
                    warn!("Status query for task {} failed ({} in a row): {}", handle, failures, e);

                    match self.config.max_poll_failures {
                        Some(max) if failures >= max => state.finish(PollOutcome::Failed(TaskFailure::new(
                            FailureKind::RetriesExhausted,
                            format!("status query failed {} times in a row: {}", failures, e),
                        ))),
                        _ => {
                            self.reschedule.notify_one();
                            return;
                        }
                    }
                }
                Err(ApiError::Decode(e)) => {
                    warn!("Unusable status reply for task {}: {}", handle, e);
                    state.finish(PollOutcome::Failed(TaskFailure::new(FailureKind::Decode, e.to_string())))
                }
                Err(e) => {
                    warn!("Status query for task {} rejected: {}", handle, e);
                    state.finish(PollOutcome::Failed(TaskFailure::new(FailureKind::Request, e.to_string())))
                }
            }
        };

        // Run the callback outside the lock so it may call back into the poller
        if let Some((callback, outcome)) = resolved {
            callback(outcome);
        }
    }
}

/// Submits backtests and polls them to completion, one task at a time
pub struct TaskPoller<A: BacktestApi + 'static> {
    shared: Arc<Shared<A>>,
}

impl<A: BacktestApi + 'static> TaskPoller<A> {
    pub fn new(api: Arc<A>, config: PollerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                config,
                state: Mutex::new(PollerState {
                    phase: PollerPhase::Idle,
                    generation: 0,
                    handle: None,
                    ticker: None,
                    on_outcome: None,
                    consecutive_failures: 0,
                }),
                reschedule: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.shared.config
    }

    pub fn phase(&self) -> PollerPhase {
        self.shared.lock().phase
    }

    /// Task currently being polled
    pub fn current_task(&self) -> Option<TaskHandle> {
        self.shared.lock().handle.clone()
    }

    /// Submit a backtest and start polling it.
    ///
    /// Any task already tracked by this poller is cancelled first, without an
    /// outcome. On success `on_outcome` will be called exactly once, when the
    /// task reaches a terminal state, unless the task is cancelled first.
    pub async fn submit<F>(
        &self,
        request: BacktestRequest,
        on_outcome: F,
    ) -> Result<TaskHandle, SubmissionError>
    where
        F: FnOnce(PollOutcome) + Send + 'static,
    {
        let generation = {
            let mut state = self.shared.lock();
            if let Some(previous) = &state.handle {
                info!("Cancelling task {} in favour of a new submission", previous);
            }
            state.clear();
            state.generation += 1;
            state.phase = PollerPhase::Submitting;
            state.generation
        };

        info!(
            "Submitting backtest {} on {} from {} to {}",
            request.strategy(),
            request.symbol(),
            request.start_date(),
            request.end_date()
        );

        let timeout = self.shared.config.submit_timeout;
        let reply = tokio::time::timeout(timeout, self.shared.api.run_backtest(&request)).await;

        let mut state = self.shared.lock();
        if state.generation != generation {
            debug!("Submission superseded before the service replied");
            return Err(SubmissionError::Cancelled);
        }

        let response = match reply {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                state.phase = PollerPhase::Idle;
                warn!("Backtest submission failed: {}", e);
                return Err(SubmissionError::Api(e));
            }
            Err(_) => {
                state.phase = PollerPhase::Idle;
                warn!("Backtest submission timed out after {:?}", timeout);
                return Err(SubmissionError::Timeout(timeout));
            }
        };

        if response.status != SUBMITTED_STATUS {
            state.phase = PollerPhase::Idle;
            warn!("Backtest submission answered with status {:?}", response.status);
            return Err(SubmissionError::Rejected(response.status));
        }

        let handle = response.task_id;
        state.phase = PollerPhase::Polling;
        state.handle = Some(handle.clone());
        state.on_outcome = Some(Box::new(on_outcome));
        state.consecutive_failures = 0;
        state.ticker = Some(tokio::spawn(
            Arc::clone(&self.shared).run_ticker(generation, handle.clone()),
        ));

        info!("Backtest submitted as task {}", handle);
        Ok(handle)
    }

    /// Submit a backtest and wait for its outcome.
    ///
    /// Returns `Ok(None)` if the task was cancelled or superseded before it
    /// reached a terminal state.
    pub async fn submit_and_wait(
        &self,
        request: BacktestRequest,
    ) -> Result<Option<PollOutcome>, SubmissionError> {
        let (tx, rx) = oneshot::channel();
        self.submit(request, move |outcome| {
            let _ = tx.send(outcome);
        })
        .await?;
        Ok(rx.await.ok())
    }

    /// Stop polling and forget the current task without reporting an outcome.
    ///
    /// Safe to call at any time and any number of times.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        if state.phase != PollerPhase::Idle {
            match &state.handle {
                Some(handle) => info!("Cancelling task {}", handle),
                None => info!("Cancelling pending submission"),
            }
        }
        state.generation += 1;
        state.clear();
    }

    /// List strategies offered by the service
    pub async fn strategies(&self) -> Result<Vec<String>, ApiError> {
        self.shared.api.get_strategies().await
    }
}

impl<A: BacktestApi + 'static> Drop for TaskPoller<A> {
    fn drop(&mut self) {
        self.cancel();
    }
}
