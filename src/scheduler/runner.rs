//! Completion sweeper.
//!
//! Subscriptions carry a persisted `due_at`, so completions survive restarts.
//! The sweeper wakes up on a fixed interval and:
//! 1. Collects users with at least one due subscription
//! 2. Completes each user's due subscriptions in parallel, one task per user
//! 3. Flushes the state file if anything changed

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::engine::SlotEngine;

/// Messages that can be sent to the sweeper.
#[derive(Debug, Clone)]
pub enum SweeperMessage {
    /// Run a sweep right away.
    TriggerSweep,
    /// Stop the sweeper.
    Shutdown,
}

/// Totals for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Users that had due subscriptions.
    pub users: usize,
    /// Subscriptions moved to `completed`.
    pub completed: usize,
}

/// Periodically completes subscriptions whose grace period is over.
pub struct CompletionSweeper {
    engine: Arc<SlotEngine>,

    /// Where to flush the store after a sweep; `None` keeps state in memory.
    state_path: Option<PathBuf>,

    /// Time between sweeps.
    check_interval: Duration,
}

impl CompletionSweeper {
    /// Creates a new sweeper.
    #[must_use]
    pub const fn new(engine: Arc<SlotEngine>, state_path: Option<PathBuf>) -> Self {
        Self {
            engine,
            state_path,
            check_interval: Duration::from_secs(5),
        }
    }

    /// Sets the time between sweeps.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Runs the sweep loop until shutdown.
    pub async fn run(&self, mut rx: mpsc::Receiver<SweeperMessage>) {
        info!(
            "Completion sweeper started (interval: {:?})",
            self.check_interval
        );

        let mut check_timer = interval(self.check_interval);

        loop {
            tokio::select! {
                _ = check_timer.tick() => {
                    self.tick().await;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(SweeperMessage::TriggerSweep) => {
                            debug!("Received trigger sweep message");
                            self.tick().await;
                        }
                        Some(SweeperMessage::Shutdown) | None => {
                            info!("Sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Single sweep followed by a state flush.
    async fn tick(&self) -> SweepReport {
        let report = self.sweep().await;
        if report.completed > 0 {
            info!(
                "Sweep completed {} subscription(s) for {} user(s)",
                report.completed, report.users
            );
        }

        if let Some(path) = &self.state_path
            && let Err(e) = self.engine.store().flush(path).await
        {
            warn!("Failed to save state: {}", e);
        }
        report
    }

    /// Completes all subscriptions due now.
    pub async fn sweep(&self) -> SweepReport {
        let now = Utc::now();
        let users = self.engine.due_users(now).await;
        if users.is_empty() {
            return SweepReport::default();
        }

        let mut tasks = JoinSet::new();
        for user_id in &users {
            let engine = Arc::clone(&self.engine);
            let user_id = *user_id;
            tasks.spawn(async move { engine.complete_due(user_id, now).await });
        }

        let mut completed = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(count) => completed += count,
                Err(e) => error!("Completion task failed: {}", e),
            }
        }

        SweepReport {
            users: users.len(),
            completed,
        }
    }

    /// Gets a reference to the engine.
    #[must_use]
    pub const fn engine(&self) -> &Arc<SlotEngine> {
        &self.engine
    }
}

impl std::fmt::Debug for CompletionSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSweeper")
            .field("state_path", &self.state_path)
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}
