//! External-toolchain backend
//!
//! Drives a real compiler or interpreter from the language table: write
//! the prepared program into a fresh scratch directory, run the compile
//! command there, and map any rejection to a snippet-relative diagnostic.
//! Languages without a compile command (interpreters) skip straight to
//! the invocable unit; their syntax errors surface at run time instead.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{CompileLimits, CompileOutcome, CompilerBackend, Fidelity, InvocableUnit};
use crate::diagnostics::{extract_plain_diagnostic, extract_structured_diagnostic, CompileDiagnostic};
use crate::languages::{DiagnosticsMode, LanguageConfig, WrapMode};
use crate::prepare::PreparedProgram;
use crate::runner::{run_command, CommandSpec, RunOutcome, RunStatus};

/// Backend that shells out to the toolchain named in the language table.
pub struct ToolchainBackend {
    config: LanguageConfig,
}

impl ToolchainBackend {
    pub fn new(config: LanguageConfig) -> Self {
        Self { config }
    }

    /// Compiler output to parse: stderr when present, stdout otherwise.
    fn raw_output<'a>(&self, outcome: &'a RunOutcome) -> &'a str {
        if outcome.stderr.text.trim().is_empty() {
            &outcome.stdout.text
        } else {
            &outcome.stderr.text
        }
    }

    fn extract_diagnostic(&self, raw: &str, program: &PreparedProgram) -> CompileDiagnostic {
        match self.config.diagnostics {
            DiagnosticsMode::Structured => {
                extract_structured_diagnostic(raw, &self.config.source_file, program.line_offset)
                    .unwrap_or_else(|| extract_plain_diagnostic(raw, program.line_offset))
            }
            DiagnosticsMode::Plain => extract_plain_diagnostic(raw, program.line_offset),
        }
    }
}

#[async_trait]
impl CompilerBackend for ToolchainBackend {
    fn id(&self) -> &str {
        &self.config.key
    }

    fn source_file(&self) -> &str {
        &self.config.source_file
    }

    fn wrap(&self) -> WrapMode {
        self.config.wrap
    }

    fn fidelity(&self) -> Fidelity {
        Fidelity::Full
    }

    async fn compile(
        &self,
        program: &PreparedProgram,
        limits: CompileLimits,
    ) -> Result<CompileOutcome> {
        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let source_path = scratch.path().join(&self.config.source_file);
        tokio::fs::write(&source_path, &program.text)
            .await
            .with_context(|| format!("Failed to write {}", source_path.display()))?;

        if let Some(compile_cmd) = &self.config.compile_command {
            let spec = CommandSpec::from_vec(compile_cmd).with_work_dir(scratch.path());
            let outcome = run_command(&spec, limits.deadline, limits.max_output_bytes).await?;
            debug!(
                "Compile phase for {} finished with {:?} in {:?}",
                self.config.key, outcome.status, outcome.duration
            );

            match outcome.status {
                RunStatus::Exited(0) => {}
                RunStatus::TimedOut => return Ok(CompileOutcome::TimedOut),
                RunStatus::Signaled(_) => {
                    return Ok(CompileOutcome::Rejected(CompileDiagnostic {
                        message: "Compiler crashed".to_string(),
                        line: None,
                    }));
                }
                RunStatus::Exited(code) => {
                    let raw = self.raw_output(&outcome);
                    let diagnostic = if raw.trim().is_empty() {
                        CompileDiagnostic {
                            message: format!("Compilation failed with exit code {}", code),
                            line: None,
                        }
                    } else {
                        self.extract_diagnostic(raw, program)
                    };
                    return Ok(CompileOutcome::Rejected(diagnostic));
                }
            }
        }

        // RUST_BACKTRACE feeds the fault extractor; other runtimes ignore it
        let run = CommandSpec::from_vec(&self.config.run_command)
            .with_work_dir(scratch.path())
            .with_env_var("RUST_BACKTRACE", "1");
        Ok(CompileOutcome::Compiled(InvocableUnit::new(run, scratch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::get_language_config;
    use crate::prepare::{prepare, PreparedProgram};
    use std::time::Duration;

    fn rust_backend() -> ToolchainBackend {
        ToolchainBackend::new(get_language_config("rust").unwrap())
    }

    fn limits() -> CompileLimits {
        CompileLimits {
            deadline: Duration::from_secs(30),
            max_output_bytes: 64 * 1024,
        }
    }

    #[tokio::test]
    async fn test_compile_produces_runnable_unit() {
        let backend = rust_backend();
        let program = prepare("println!(\"ok\");", crate::languages::WrapMode::BracedMain);

        let outcome = backend.compile(&program, limits()).await.unwrap();
        let unit = match outcome {
            CompileOutcome::Compiled(unit) => unit,
            other => panic!("expected compiled unit, got {:?}", other),
        };

        let run = run_command(&unit.run, Duration::from_secs(10), 64 * 1024)
            .await
            .unwrap();
        assert!(run.is_success());
        assert_eq!(run.stdout.text.trim(), "ok");
    }

    #[tokio::test]
    async fn test_rejection_reports_snippet_relative_line() {
        let backend = rust_backend();
        // Wrapped in a main shell, so the toolchain sees the bad line one
        // further down than the snippet author wrote it.
        let program = prepare(
            "let x = 1\nprintln!(\"{}\", x);",
            crate::languages::WrapMode::BracedMain,
        );
        assert_eq!(program.line_offset, 1);

        let outcome = backend.compile(&program, limits()).await.unwrap();
        match outcome {
            CompileOutcome::Rejected(diag) => {
                assert_eq!(diag.line, Some(1));
                assert!(!diag.message.is_empty());
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compile_deadline_reports_timeout() {
        let backend = rust_backend();
        let program = prepare("println!(\"slow\");", crate::languages::WrapMode::BracedMain);

        // No compiler finishes in a millisecond
        let outcome = backend
            .compile(
                &program,
                CompileLimits {
                    deadline: Duration::from_millis(1),
                    max_output_bytes: 64 * 1024,
                },
            )
            .await
            .unwrap();
        assert!(matches!(outcome, CompileOutcome::TimedOut));
    }

    #[tokio::test]
    async fn test_interpreter_skips_compile_phase() {
        let config = LanguageConfig {
            key: "shell".to_string(),
            source_file: "main.sh".to_string(),
            compile_command: None,
            run_command: vec!["sh".to_string(), "main.sh".to_string()],
            diagnostics: DiagnosticsMode::Plain,
            wrap: crate::languages::WrapMode::None,
        };
        let backend = ToolchainBackend::new(config);
        let program = PreparedProgram {
            text: "echo from-script\n".to_string(),
            line_offset: 0,
        };

        let outcome = backend.compile(&program, limits()).await.unwrap();
        let unit = match outcome {
            CompileOutcome::Compiled(unit) => unit,
            other => panic!("expected compiled unit, got {:?}", other),
        };

        let run = run_command(&unit.run, Duration::from_secs(10), 64 * 1024)
            .await
            .unwrap();
        assert_eq!(run.stdout.text.trim(), "from-script");
    }

    #[tokio::test]
    #[ignore = "requires python3"]
    async fn test_python_syntax_error_rejected_at_compile() {
        let backend = ToolchainBackend::new(get_language_config("python").unwrap());
        let program = prepare("def broken(:\n    pass", crate::languages::WrapMode::None);

        let outcome = backend.compile(&program, limits()).await.unwrap();
        match outcome {
            CompileOutcome::Rejected(diag) => {
                assert!(diag.message.contains("SyntaxError"), "got {:?}", diag);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
