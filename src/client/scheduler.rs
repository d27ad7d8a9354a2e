//! Background task scheduling for the client engine.
//!
//! A [`TaskRegistry`] owns every periodic loop the engine runs: health
//! check, heartbeat, idle-connection sweep, stats logging, and the
//! consumer-layer rescans. Centralizing them gives one shutdown path and
//! one place to observe task health.
//!
//! Tasks are cancelled, not awaited, on shutdown: each spawned future races
//! against a broadcast shutdown signal, and stragglers past the shutdown
//! timeout are aborted with a loud diagnostic.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Status of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task is currently running.
    Running,
    /// Task future completed on its own.
    Completed,
}

/// Registry of named background tasks with unified shutdown.
pub struct TaskRegistry {
    tasks: HashMap<&'static str, JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: bool,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            tasks: HashMap::new(),
            shutdown_tx,
            shutting_down: false,
        }
    }

    /// Spawn a named task that exits when the registry shuts down.
    ///
    /// Spawning under an already-used name aborts the previous instance.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutting_down {
            tracing::warn!(task = name, "Ignoring spawn during shutdown");
            return;
        }

        if let Some(old) = self.tasks.remove(name) {
            old.abort();
            tracing::debug!(task = name, "Aborted previous task instance");
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let task_name = name;
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task => {
                    tracing::debug!(task = task_name, "Task completed");
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!(task = task_name, "Task received shutdown signal");
                }
            }
        });

        tracing::debug!(task = name, "Spawned background task");
        self.tasks.insert(name, handle);
    }

    /// Spawn a periodic task running at a fixed delay.
    ///
    /// The closure is invoked once per tick; a tick that outlives the
    /// period simply delays the next one, so rounds never overlap.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, period: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.spawn(name, async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
    }

    /// Status of every registered task.
    pub fn health_check(&self) -> Vec<(&'static str, TaskStatus)> {
        self.tasks
            .iter()
            .map(|(name, handle)| {
                let status = if handle.is_finished() {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Running
                };
                (*name, status)
            })
            .collect()
    }

    /// Number of registered tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Number of tasks still running.
    pub fn running_count(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Signal every task and wait up to `timeout` for them to finish.
    ///
    /// A task that ignores the signal past the deadline is aborted and
    /// logged as a defect; shutdown always completes.
    pub async fn shutdown_all(&mut self, timeout: Duration) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;

        tracing::debug!(task_count = self.tasks.len(), "Stopping background tasks");
        let _ = self.shutdown_tx.send(());

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, handle) in self.tasks.drain() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                tracing::error!(task = name, "Timeout to stop background task, aborting");
                handle.abort();
                continue;
            }
            match tokio::time::timeout(remaining, handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Task shutdown complete"),
                Ok(Err(e)) => {
                    tracing::warn!(task = name, error = %e, "Task panicked during shutdown")
                }
                Err(_) => {
                    tracing::error!(task = name, "Timeout to stop background task, aborting")
                }
            }
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        if !self.shutting_down {
            let _ = self.shutdown_tx.send(());
            for (name, handle) in self.tasks.drain() {
                tracing::debug!(task = name, "Aborting task on registry drop");
                handle.abort();
            }
        }
    }
}
