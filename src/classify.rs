//! Result classification
//!
//! Maps one finished invocation onto exactly one `ExecutionResult`
//! variant. Classification is pure; logging happens at the call site.

use crate::diagnostics::extract_runtime_fault;
use crate::result::ExecutionResult;
use crate::runner::{RunOutcome, RunStatus};

/// Number of trailing stderr lines kept when no structured fault was found
const STDERR_TAIL_LINES: usize = 3;

/// Build the final result from a finished invocation.
///
/// `pipeline_ms` is the wall-clock time of the whole request (prepare,
/// compile, invoke); `budget_ms` is the configured deadline it ran under.
pub fn classify_run(
    outcome: RunOutcome,
    source_file: &str,
    line_offset: u32,
    pipeline_ms: u64,
    budget_ms: u64,
) -> ExecutionResult {
    match outcome.status {
        RunStatus::Exited(0) => ExecutionResult::Success {
            output: outcome.stdout.text,
            duration_ms: pipeline_ms,
        },
        RunStatus::Exited(code) => {
            let message = extract_runtime_fault(&outcome.stderr.text, source_file, line_offset)
                .unwrap_or_else(|| {
                    with_stderr_tail(
                        format!("process exited with code {}", code),
                        &outcome.stderr.text,
                    )
                });
            ExecutionResult::RuntimeError {
                message,
                partial_output: outcome.stdout.text,
            }
        }
        RunStatus::Signaled(signal) => {
            let message = extract_runtime_fault(&outcome.stderr.text, source_file, line_offset)
                .unwrap_or_else(|| {
                    with_stderr_tail(
                        format!("terminated by signal {}", signal),
                        &outcome.stderr.text,
                    )
                });
            ExecutionResult::RuntimeError {
                message,
                partial_output: outcome.stdout.text,
            }
        }
        RunStatus::TimedOut => ExecutionResult::Timeout { budget_ms },
    }
}

fn with_stderr_tail(mut message: String, stderr: &str) -> String {
    let tail: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if tail.is_empty() {
        return message;
    }
    let start = tail.len().saturating_sub(STDERR_TAIL_LINES);
    for line in &tail[start..] {
        message.push('\n');
        message.push_str(line);
    }
    message
}
