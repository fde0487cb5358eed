//! Execution result model
//!
//! The tagged union callers branch on. The serialized `kind` literals
//! (`SUCCESS`, `COMPILATION_ERROR`, `RUNTIME_ERROR`, `TIMEOUT_ERROR`) are
//! a stable contract; `error_kind()` preserves the older convention that
//! the absence of an error kind implies success.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error kinds for behavior branching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "COMPILATION_ERROR")]
    CompilationError,
    #[serde(rename = "RUNTIME_ERROR")]
    RuntimeError,
    #[serde(rename = "TIMEOUT_ERROR")]
    TimeoutError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::CompilationError => "COMPILATION_ERROR",
            ErrorKind::RuntimeError => "RUNTIME_ERROR",
            ErrorKind::TimeoutError => "TIMEOUT_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one execution request. Exactly one variant per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ExecutionResult {
    /// The snippet compiled, ran, and exited cleanly
    #[serde(rename = "SUCCESS")]
    Success {
        /// Captured stdout (empty string if nothing was printed)
        output: String,
        /// Wall-clock time of the whole pipeline in milliseconds
        duration_ms: u64,
    },
    /// The snippet did not produce an invocable unit
    #[serde(rename = "COMPILATION_ERROR")]
    CompileError {
        message: String,
        /// Best-effort line in the user's snippet; None if unknown
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
    },
    /// The snippet compiled but faulted while running
    #[serde(rename = "RUNTIME_ERROR")]
    RuntimeError {
        message: String,
        /// Output produced before the fault (empty string if none)
        partial_output: String,
    },
    /// The deadline elapsed before the snippet finished
    #[serde(rename = "TIMEOUT_ERROR")]
    Timeout { budget_ms: u64 },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// The error kind, or None for success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::CompileError { .. } => Some(ErrorKind::CompilationError),
            ExecutionResult::RuntimeError { .. } => Some(ErrorKind::RuntimeError),
            ExecutionResult::Timeout { .. } => Some(ErrorKind::TimeoutError),
        }
    }

    /// Whatever the snippet managed to print (empty for variants that
    /// carry no captured output).
    pub fn output(&self) -> &str {
        match self {
            ExecutionResult::Success { output, .. } => output,
            ExecutionResult::RuntimeError { partial_output, .. } => partial_output,
            _ => "",
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self {
            ExecutionResult::Success { duration_ms, .. } => {
                format!("Success ({} ms)", duration_ms)
            }
            ExecutionResult::CompileError { line: Some(n), .. } => {
                format!("Compilation error at line {}", n)
            }
            ExecutionResult::CompileError { line: None, .. } => "Compilation error".to_string(),
            ExecutionResult::RuntimeError { .. } => "Runtime error".to_string(),
            ExecutionResult::Timeout { budget_ms } => {
                format!("Timed out after {} ms", budget_ms)
            }
        }
    }

    /// Multi-line display text with a kind-specific label.
    pub fn formatted(&self) -> String {
        match self {
            ExecutionResult::Success { output, .. } => output.clone(),
            ExecutionResult::CompileError {
                message,
                line: Some(n),
            } => {
                format!("Compilation error (line {}):\n{}", n, message)
            }
            ExecutionResult::CompileError {
                message,
                line: None,
            } => {
                format!("Compilation error:\n{}", message)
            }
            ExecutionResult::RuntimeError {
                message,
                partial_output,
            } => {
                let mut text = format!("Runtime error:\n{}", message);
                if !partial_output.is_empty() {
                    text.push_str("\n\nOutput before error:\n");
                    text.push_str(partial_output);
                }
                text
            }
            ExecutionResult::Timeout { budget_ms } => {
                format!("Timeout:\n{}", timeout_message(*budget_ms))
            }
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Canonical timeout message shown to users.
pub fn timeout_message(budget_ms: u64) -> String {
    format!(
        "Code execution timed out after {} ms. Check for infinite loops or excessive computation.",
        budget_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_are_stable() {
        let cases = [
            (
                ExecutionResult::Success {
                    output: "15\n".into(),
                    duration_ms: 12,
                },
                "SUCCESS",
            ),
            (
                ExecutionResult::CompileError {
                    message: "expected `;`".into(),
                    line: Some(2),
                },
                "COMPILATION_ERROR",
            ),
            (
                ExecutionResult::RuntimeError {
                    message: "index out of bounds".into(),
                    partial_output: String::new(),
                },
                "RUNTIME_ERROR",
            ),
            (ExecutionResult::Timeout { budget_ms: 2000 }, "TIMEOUT_ERROR"),
        ];

        for (result, tag) in cases {
            let value = serde_json::to_value(&result).unwrap();
            assert_eq!(value["kind"], tag);
        }
    }

    #[test]
    fn test_error_kind_absent_for_success() {
        let success = ExecutionResult::Success {
            output: String::new(),
            duration_ms: 0,
        };
        assert!(success.error_kind().is_none());
        assert!(success.is_success());

        let timeout = ExecutionResult::Timeout { budget_ms: 2000 };
        assert_eq!(timeout.error_kind(), Some(ErrorKind::TimeoutError));
        assert_eq!(timeout.error_kind().unwrap().to_string(), "TIMEOUT_ERROR");
    }

    #[test]
    fn test_round_trip_without_line() {
        let result = ExecutionResult::CompileError {
            message: "Code is empty".into(),
            line: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("line"));
        let back: ExecutionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_summary_strings() {
        let ok = ExecutionResult::Success {
            output: "15\n".into(),
            duration_ms: 37,
        };
        assert_eq!(ok.summary(), "Success (37 ms)");

        let compile = ExecutionResult::CompileError {
            message: "expected `;`".into(),
            line: Some(3),
        };
        assert_eq!(compile.summary(), "Compilation error at line 3");

        let timeout = ExecutionResult::Timeout { budget_ms: 2000 };
        assert_eq!(timeout.summary(), "Timed out after 2000 ms");
    }

    #[test]
    fn test_formatted_compile_error_names_line() {
        let result = ExecutionResult::CompileError {
            message: "expected `;`, found `}`".into(),
            line: Some(2),
        };
        let text = result.formatted();
        assert!(text.starts_with("Compilation error (line 2):"));
        assert!(text.contains("expected `;`"));
    }

    #[test]
    fn test_formatted_runtime_error_includes_partial_output() {
        let with_output = ExecutionResult::RuntimeError {
            message: "attempt to divide by zero".into(),
            partial_output: "step 1\n".into(),
        };
        let text = with_output.formatted();
        assert!(text.contains("Output before error:"));
        assert!(text.contains("step 1"));

        let without_output = ExecutionResult::RuntimeError {
            message: "attempt to divide by zero".into(),
            partial_output: String::new(),
        };
        assert!(!without_output.formatted().contains("Output before error:"));
    }

    #[test]
    fn test_formatted_timeout_states_budget() {
        let result = ExecutionResult::Timeout { budget_ms: 2000 };
        assert!(result.formatted().contains("timed out after 2000 ms"));
    }
}
