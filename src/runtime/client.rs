//! Runtime client backing pipeline execution.
//!
//! The client owns a bounded pool of worker slots on the ambient tokio
//! runtime. `start` opens the pool, `stop` waits for in-flight work and closes
//! it. [`RuntimeClient::scope`] brackets a closure with both, so the pool is
//! released even when the closure fails.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::MetricsCollector;
use crate::pipeline::config::{ConfigError, RuntimeConfig};

/// Errors that can occur in the runtime client.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `start` was called on a running client.
    #[error("Runtime is already started")]
    AlreadyStarted,

    /// The client is not running, or was stopped while work was submitted.
    #[error("Runtime is not started")]
    NotStarted,

    /// In-flight work did not finish before the shutdown timeout.
    #[error("Shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),

    /// The runtime configuration is invalid.
    #[error("Invalid runtime configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Statistics about the worker pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Total number of worker slots.
    pub num_workers: usize,
    /// Number of tasks currently holding a slot.
    pub active_tasks: u64,
    /// Total number of tasks that have finished.
    pub tasks_completed: u64,
}

/// Shared state for one started pool.
struct PoolState {
    permits: Arc<Semaphore>,
    num_workers: u32,
    active: AtomicU64,
    completed: AtomicU64,
    metrics: MetricsCollector,
}

/// Marks a task active for as long as it is alive.
struct ActiveGuard {
    state: Arc<PoolState>,
}

impl ActiveGuard {
    fn new(state: Arc<PoolState>) -> Self {
        state.active.fetch_add(1, Ordering::SeqCst);
        state.metrics.worker_started();
        Self { state }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.completed.fetch_add(1, Ordering::SeqCst);
        self.state.metrics.worker_finished();
    }
}

/// Cheap, clonable view of a started [`RuntimeClient`].
#[derive(Clone)]
pub struct RuntimeHandle {
    state: Arc<PoolState>,
}

impl RuntimeHandle {
    /// Spawns `future` once a worker slot is free.
    ///
    /// Waiting for the slot applies backpressure to the submitter.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotStarted` if the client has been stopped.
    pub async fn submit<F, T>(&self, future: F) -> Result<JoinHandle<T>, RuntimeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.state.permits)
            .acquire_owned()
            .await
            .map_err(|_| RuntimeError::NotStarted)?;
        let guard = ActiveGuard::new(Arc::clone(&self.state));

        Ok(tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            future.await
        }))
    }

    /// Whether the owning client is still running.
    pub fn is_running(&self) -> bool {
        !self.state.permits.is_closed()
    }

    /// Number of worker slots.
    pub fn num_workers(&self) -> usize {
        self.state.num_workers as usize
    }

    /// Returns current pool statistics.
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            num_workers: self.num_workers(),
            active_tasks: self.state.active.load(Ordering::SeqCst),
            tasks_completed: self.state.completed.load(Ordering::SeqCst),
        }
    }
}

/// Process-level handle to the execution backend.
///
/// State machine: stopped -> started -> stopped. Each `start` must be matched
/// by exactly one `stop`.
pub struct RuntimeClient {
    config: RuntimeConfig,
    handle: Option<RuntimeHandle>,
}

impl RuntimeClient {
    /// Creates a stopped client.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            handle: None,
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Acquires the worker pool.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::AlreadyStarted` if the client is running, or
    /// `RuntimeError::Config` if the configuration is invalid.
    pub fn start(&mut self) -> Result<RuntimeHandle, RuntimeError> {
        if self.handle.is_some() {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.config.validate()?;

        let num_workers = u32::try_from(self.config.num_workers).map_err(|_| {
            ConfigError::ValidationFailed(format!(
                "num_workers must fit in u32, got {}",
                self.config.num_workers
            ))
        })?;

        let handle = RuntimeHandle {
            state: Arc::new(PoolState {
                permits: Arc::new(Semaphore::new(num_workers as usize)),
                num_workers,
                active: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                metrics: MetricsCollector::new(),
            }),
        };
        self.handle = Some(handle.clone());

        info!(num_workers, "Runtime started");
        Ok(handle)
    }

    /// Releases the worker pool, waiting for in-flight work.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::NotStarted` if the client is not running, or
    /// `RuntimeError::ShutdownTimeout` if work is still running after the
    /// configured timeout. The pool is closed in both the success and the
    /// timeout case.
    pub async fn stop(&mut self) -> Result<(), RuntimeError> {
        let Some(handle) = self.handle.take() else {
            return Err(RuntimeError::NotStarted);
        };

        info!("Initiating runtime shutdown");

        let state = &handle.state;
        let timeout = self.config.shutdown_timeout();
        // Holding every permit means no task is in flight.
        let drained =
            tokio::time::timeout(timeout, state.permits.acquire_many(state.num_workers)).await;
        state.permits.close();

        match drained {
            Ok(_) => {
                info!(
                    tasks_completed = state.completed.load(Ordering::SeqCst),
                    "Runtime stopped"
                );
                Ok(())
            }
            Err(_) => {
                warn!(
                    active_tasks = state.active.load(Ordering::SeqCst),
                    "Runtime shutdown timed out"
                );
                Err(RuntimeError::ShutdownTimeout(timeout))
            }
        }
    }

    /// Whether the client is running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Handle to the running pool, if started.
    pub fn handle(&self) -> Option<RuntimeHandle> {
        self.handle.clone()
    }

    /// Starts the client, runs `f`, and always stops the client afterwards.
    ///
    /// An error from `f` takes precedence over an error from `stop`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut client = RuntimeClient::new(RuntimeConfig::default());
    /// let result = client
    ///     .scope(|runtime| async move { pipeline.run(&runtime).await })
    ///     .await?;
    /// ```
    pub async fn scope<F, Fut, T, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(RuntimeHandle) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<RuntimeError> + std::fmt::Display,
    {
        let handle = self.start()?;
        let result = f(handle).await;
        let stopped = self.stop().await;

        match (result, stopped) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(stop_err)) => Err(stop_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(stop_err)) => {
                warn!(error = %err, stop_error = %stop_err, "Runtime stop failed after run error");
                Err(err)
            }
        }
    }
}

impl Drop for RuntimeClient {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.state.permits.close();
            warn!("Runtime client dropped while started; worker pool closed without draining");
        } else {
            debug!("Runtime client dropped");
        }
    }
}
