//! Execution worker
//!
//! Single consumer of the engine's job queue. Each job runs the whole
//! pipeline in order: prepare, compile, invoke, classify. One job at a
//! time; a second request waits in the queue until the first finishes
//! or is preempted. Internal faults never escape as panics or errors,
//! they degrade to a reportable result so the caller always hears back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::backend::{CompileLimits, CompileOutcome, CompilerBackend};
use crate::classify::classify_run;
use crate::config::EngineConfig;
use crate::prepare::prepare;
use crate::result::ExecutionResult;
use crate::runner::run_command;

/// Slack above the request budget before a wedged pipeline is abandoned
/// and a timeout verdict synthesized, in milliseconds. The pipeline's own
/// deadlines fire first in every healthy run.
const PIPELINE_GRACE_MS: u64 = 1_000;

/// One queued execution request, answered over a oneshot channel.
pub struct ExecutionJob {
    pub source: String,
    pub backend: Arc<dyn CompilerBackend>,
    pub budget_ms: u64,
    pub reply: oneshot::Sender<ExecutionResult>,
}

/// Drain the job queue until every sender is dropped.
pub async fn run_worker(mut jobs: mpsc::Receiver<ExecutionJob>, config: EngineConfig) {
    info!("Execution worker started");

    while let Some(job) = jobs.recv().await {
        let started = Instant::now();
        let watchdog = Duration::from_millis(job.budget_ms + PIPELINE_GRACE_MS);
        let result = match tokio::time::timeout(watchdog, run_job(&job, &config)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Execution pipeline failed: {:#}", e);
                ExecutionResult::RuntimeError {
                    message: format!("Unexpected error: {:#}", e),
                    partial_output: String::new(),
                }
            }
            // Dropping the pipeline future kills any spawned process
            Err(_) => {
                warn!(
                    "Pipeline overran its budget by more than {} ms; preempted",
                    PIPELINE_GRACE_MS
                );
                ExecutionResult::Timeout {
                    budget_ms: job.budget_ms,
                }
            }
        };

        info!(
            "Request finished in {} ms: {}",
            started.elapsed().as_millis(),
            result.summary()
        );
        if job.reply.send(result).is_err() {
            debug!("Caller gave up before the result was ready");
        }
    }

    info!("Execution worker stopped: job queue closed");
}

async fn run_job(job: &ExecutionJob, config: &EngineConfig) -> Result<ExecutionResult> {
    let started = Instant::now();
    let budget = Duration::from_millis(job.budget_ms);
    let backend = &job.backend;

    let program = prepare(&job.source, backend.wrap());

    // Compile under the tighter of the compile cap and what is left of
    // the request budget; which bound was hit decides the verdict below.
    let compile_cap = Duration::from_millis(config.compile_timeout_ms);
    let remaining = budget.saturating_sub(started.elapsed());
    let budget_bound = remaining <= compile_cap;

    let outcome = backend
        .compile(
            &program,
            CompileLimits {
                deadline: compile_cap.min(remaining),
                max_output_bytes: config.max_output_bytes,
            },
        )
        .await?;

    let unit = match outcome {
        CompileOutcome::Compiled(unit) => unit,
        CompileOutcome::Rejected(diagnostic) => {
            debug!("Compilation rejected: {:?}", diagnostic);
            return Ok(ExecutionResult::CompileError {
                message: diagnostic.message,
                line: diagnostic.line,
            });
        }
        CompileOutcome::TimedOut => {
            return Ok(if budget_bound {
                ExecutionResult::Timeout {
                    budget_ms: job.budget_ms,
                }
            } else {
                ExecutionResult::CompileError {
                    message: "Compilation timed out".to_string(),
                    line: None,
                }
            });
        }
    };

    let remaining = budget.saturating_sub(started.elapsed());
    if remaining.is_zero() {
        return Ok(ExecutionResult::Timeout {
            budget_ms: job.budget_ms,
        });
    }

    let run = run_command(&unit.run, remaining, config.max_output_bytes).await?;
    if run.stdout.truncated || run.stderr.truncated {
        warn!(
            "Program output exceeded {} bytes and was truncated",
            config.max_output_bytes
        );
    }

    Ok(classify_run(
        run,
        backend.source_file(),
        program.line_offset,
        started.elapsed().as_millis() as u64,
        job.budget_ms,
    ))
}
