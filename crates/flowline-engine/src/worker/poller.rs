//! Due-execution polling with adaptive backoff
//!
//! The poller is the default timer mechanism behind delay steps: it claims
//! scheduled executions whose `scheduled_for` has passed and re-enters the
//! step processor for each. The claim is atomic in the store, so running more
//! than one poller (or a poller alongside the resumption endpoint) never
//! resumes the same execution twice.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace};

use crate::engine::{EngineError, TriggerDispatcher};

/// Polling configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Minimum poll interval (when due executions are found)
    pub min_interval: Duration,

    /// Maximum poll interval (when idle)
    pub max_interval: Duration,

    /// Backoff multiplier when nothing is due
    pub backoff_multiplier: f64,

    /// Maximum executions to claim per poll
    pub batch_size: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
            backoff_multiplier: 1.5,
            batch_size: 10,
        }
    }
}

impl PollerConfig {
    /// Create a new poller configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment
    ///
    /// `RESUME_POLL_INTERVAL_MS` sets the minimum interval;
    /// `RESUME_POLL_MAX_INTERVAL_MS` the idle ceiling;
    /// `RESUME_POLL_BATCH_SIZE` the per-poll claim limit.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("RESUME_POLL_INTERVAL_MS") {
            config.min_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("RESUME_POLL_MAX_INTERVAL_MS") {
            config.max_interval = Duration::from_millis(ms);
        }
        if let Some(size) = env_u64("RESUME_POLL_BATCH_SIZE") {
            config.batch_size = (size as usize).max(1);
        }
        config
    }

    /// Set minimum poll interval
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set maximum poll interval
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Poller that resumes due scheduled executions
///
/// Backs off exponentially while idle and resets to the minimum interval
/// whenever a poll finds work.
pub struct ResumePoller {
    dispatcher: TriggerDispatcher,
    config: PollerConfig,
    current_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl ResumePoller {
    /// Create a new poller
    pub fn new(
        dispatcher: TriggerDispatcher,
        config: PollerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            dispatcher,
            current_interval: config.min_interval,
            config,
            shutdown_rx,
        }
    }

    /// Claim and resume every currently-due execution, up to the batch size
    ///
    /// Returns the number of executions resumed. Workflow-logic failures stay
    /// on the execution rows; only store failures surface here.
    #[instrument(skip(self))]
    pub async fn poll_due(&mut self) -> Result<usize, EngineError> {
        let claimed = self
            .dispatcher
            .store()
            .claim_due_executions(Utc::now(), self.config.batch_size)
            .await?;

        if claimed.is_empty() {
            self.increase_backoff();
            trace!(
                interval_ms = self.current_interval.as_millis(),
                "nothing due, backing off"
            );
            return Ok(0);
        }

        self.reset_backoff();
        debug!(count = claimed.len(), "claimed due executions");

        let mut resumed = 0;
        for execution in &claimed {
            match self.dispatcher.resume_claimed(execution).await {
                Ok(()) => resumed += 1,
                Err(err) => {
                    // Infrastructure failure for this row; the others still run
                    error!(execution_id = %execution.id, "failed to resume execution: {}", err);
                }
            }
        }
        Ok(resumed)
    }

    /// Run the poll loop until shutdown is signaled
    pub async fn run(mut self) {
        info!(
            min_interval_ms = self.config.min_interval.as_millis(),
            max_interval_ms = self.config.max_interval.as_millis(),
            batch_size = self.config.batch_size,
            "resume poller started"
        );

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }
            if let Err(err) = self.poll_due().await {
                error!("resume poll failed: {}", err);
                self.increase_backoff();
            }
            if self.wait().await {
                break;
            }
        }

        info!("resume poller stopped");
    }

    /// Wait for the current backoff interval
    ///
    /// Returns true if shutdown was signaled during the wait.
    pub async fn wait(&mut self) -> bool {
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.current_interval) => false,
            _ = shutdown_rx.changed() => {
                debug!("shutdown signal received during wait");
                true
            }
        }
    }

    /// Get the current poll interval
    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    fn reset_backoff(&mut self) {
        self.current_interval = self.config.min_interval;
    }

    fn increase_backoff(&mut self) {
        let new_interval = Duration::from_secs_f64(
            self.current_interval.as_secs_f64() * self.config.backoff_multiplier,
        );
        self.current_interval = new_interval.min(self.config.max_interval);
    }
}
