//! Execution engine
//!
//! Public facade over the queue-and-worker pipeline. The engine itself
//! holds no per-request state: configuration, the backend registry, and
//! the sender half of the job queue. Every accepted request gets exactly
//! one verdict back, even when the pipeline faults internally. Only
//! caller misuse (an unknown language, a shut-down engine) surfaces as
//! an error.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::{BackendRegistry, Fidelity};
use crate::config::{self, EngineConfig};
use crate::result::ExecutionResult;
use crate::worker::{run_worker, ExecutionJob};

/// Requests waiting for the worker queue here, oldest first.
const JOB_QUEUE_CAPACITY: usize = 64;

/// Caller misuse. Anything that goes wrong inside an accepted request is
/// reported through [`ExecutionResult`] instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is shut down")]
    ShutDown,
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
}

pub struct ExecutionEngine {
    config: EngineConfig,
    timeout_ms: AtomicU64,
    registry: BackendRegistry,
    sender: Mutex<Option<mpsc::Sender<ExecutionJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionEngine {
    /// Start an engine and its worker task. Must be called from within a
    /// tokio runtime.
    pub fn new(config: EngineConfig) -> Self {
        let mut config = config;
        config.timeout_ms = config::clamp_timeout(config.timeout_ms);

        let (sender, receiver) = mpsc::channel(JOB_QUEUE_CAPACITY);
        let worker = tokio::spawn(run_worker(receiver, config.clone()));
        info!(
            "Execution engine started: timeout {} ms, default language {}",
            config.timeout_ms, config.language
        );

        Self {
            timeout_ms: AtomicU64::new(config.timeout_ms),
            registry: BackendRegistry::from_languages(),
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Execute a snippet in the configured default language.
    pub async fn execute(&self, source: &str) -> Result<ExecutionResult, EngineError> {
        self.execute_in(&self.config.language, source).await
    }

    /// Execute a snippet in the named language (name or alias).
    pub async fn execute_in(
        &self,
        language: &str,
        source: &str,
    ) -> Result<ExecutionResult, EngineError> {
        let backend = self
            .registry
            .resolve(language)
            .ok_or_else(|| EngineError::UnsupportedLanguage(language.to_string()))?;

        // Rejected before compilation; nothing to queue
        if source.trim().is_empty() {
            return Ok(ExecutionResult::CompileError {
                message: "Code is empty".to_string(),
                line: None,
            });
        }

        if backend.fidelity() == Fidelity::Approximate {
            warn!(
                "Backend {} is approximate; results may differ from a real toolchain",
                backend.id()
            );
        }

        let budget_ms = self.timeout_ms.load(Ordering::Relaxed);
        let sender = match self.sender.lock().await.as_ref() {
            Some(sender) => sender.clone(),
            None => return Err(EngineError::ShutDown),
        };

        let (reply, receiver) = oneshot::channel();
        let job = ExecutionJob {
            source: source.to_string(),
            backend,
            budget_ms,
            reply,
        };
        if sender.send(job).await.is_err() {
            error!("Job queue is closed but the engine was not shut down");
            return Ok(worker_unavailable());
        }

        match receiver.await {
            Ok(result) => Ok(result),
            Err(_) => {
                error!("Execution worker dropped a request without replying");
                Ok(worker_unavailable())
            }
        }
    }

    /// Change the execution budget for subsequent requests. The value is
    /// clamped to the supported range; the effective value is returned.
    pub fn set_timeout(&self, timeout_ms: u64) -> u64 {
        let effective = config::clamp_timeout(timeout_ms);
        self.timeout_ms.store(effective, Ordering::Relaxed);
        info!("Execution timeout set to {} ms", effective);
        effective
    }

    /// Budget applied to requests accepted now, in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.load(Ordering::Relaxed)
    }

    /// Language names and aliases this engine can execute.
    pub fn supported_languages(&self) -> Vec<String> {
        self.registry.supported()
    }

    /// Stop accepting requests, let queued work drain within the grace
    /// period, then abort the worker. Idempotent; requests submitted
    /// afterwards get [`EngineError::ShutDown`].
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().await.take();
        drop(sender);

        let handle = self.worker.lock().await.take();
        if let Some(mut handle) = handle {
            let grace = std::time::Duration::from_millis(self.config.shutdown_grace_ms);
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => info!("Execution engine shut down"),
                Ok(Err(e)) => error!("Worker task failed during shutdown: {}", e),
                Err(_) => {
                    warn!(
                        "Worker did not drain within {} ms; aborting",
                        self.config.shutdown_grace_ms
                    );
                    handle.abort();
                }
            }
        }
    }

    /// Run a known-good snippet end to end and report whether the engine
    /// produced its output.
    pub async fn self_test(&self) -> bool {
        let result = match self.execute("println!(\"Test\");").await {
            Ok(result) => result,
            Err(e) => {
                error!("Self test could not run: {}", e);
                return false;
            }
        };

        let passed = matches!(
            &result,
            ExecutionResult::Success { output, .. } if output.contains("Test")
        );
        if passed {
            info!("Self test passed");
        } else {
            error!("Self test failed: {}", result.summary());
        }
        passed
    }
}

fn worker_unavailable() -> ExecutionResult {
    ExecutionResult::RuntimeError {
        message: "Unexpected error: execution worker terminated".to_string(),
        partial_output: String::new(),
    }
}
