//! Compilation backends
//!
//! A backend turns a prepared program into an invocable unit or rejects
//! it with a diagnostic. Backends live in a registry keyed by language
//! name and alias, and each one declares its fidelity: whether it runs
//! real toolchain semantics or only approximates them. Callers can always
//! tell the two apart; approximate execution is never silently conflated
//! with the real thing.

pub mod toolchain;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use crate::diagnostics::CompileDiagnostic;
use crate::languages::{self, WrapMode};
use crate::prepare::PreparedProgram;
use crate::runner::CommandSpec;

pub use toolchain::ToolchainBackend;

/// A backend's declared execution guarantee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    /// Real toolchain semantics
    Full,
    /// Pattern-level simulation only
    Approximate,
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Fidelity::Full => "full",
            Fidelity::Approximate => "approximate",
        };
        write!(f, "{}", s)
    }
}

/// Artifact of a successful compile: the entry-point command plus the
/// scratch directory that owns source and binaries. Dropping the unit
/// removes the scratch directory.
#[derive(Debug)]
pub struct InvocableUnit {
    /// Command that invokes the unit's entry point
    pub run: CommandSpec,
    _scratch: TempDir,
}

impl InvocableUnit {
    pub(crate) fn new(run: CommandSpec, scratch: TempDir) -> Self {
        Self {
            run,
            _scratch: scratch,
        }
    }
}

/// Result of one compile attempt
#[derive(Debug)]
pub enum CompileOutcome {
    /// The program compiled into a runnable unit
    Compiled(InvocableUnit),
    /// The toolchain rejected the program
    Rejected(CompileDiagnostic),
    /// The compile phase hit its deadline
    TimedOut,
}

/// Bounds applied to one compile phase
#[derive(Debug, Clone, Copy)]
pub struct CompileLimits {
    pub deadline: Duration,
    pub max_output_bytes: usize,
}

/// One pluggable compilation capability
#[async_trait]
pub trait CompilerBackend: Send + Sync {
    /// Canonical language key (registry identity)
    fn id(&self) -> &str;

    /// File name the prepared program is written to
    fn source_file(&self) -> &str;

    /// How snippets must be wrapped before this backend sees them
    fn wrap(&self) -> WrapMode;

    /// Declared execution guarantee
    fn fidelity(&self) -> Fidelity;

    /// Compile a prepared program into an invocable unit, or reject it
    /// with a diagnostic. `Err` means the backend itself failed (spawn
    /// error, filesystem error), not that the program was bad.
    async fn compile(
        &self,
        program: &PreparedProgram,
        limits: CompileLimits,
    ) -> Result<CompileOutcome>;
}

/// Capability-keyed registry of compilation backends
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn CompilerBackend>>,
}

impl BackendRegistry {
    /// Build the registry from the language configuration table. Aliases
    /// of one language share a single backend instance.
    pub fn from_languages() -> Self {
        let configs = languages::languages();

        let mut canonical: HashMap<String, Arc<dyn CompilerBackend>> = HashMap::new();
        for config in configs.values() {
            canonical
                .entry(config.key.clone())
                .or_insert_with(|| Arc::new(ToolchainBackend::new(config.clone())));
        }

        let mut backends = HashMap::new();
        for (name, config) in configs {
            if let Some(backend) = canonical.get(&config.key) {
                backends.insert(name.clone(), Arc::clone(backend));
            }
        }

        Self { backends }
    }

    /// Look up a backend by language name or alias (case-insensitive).
    pub fn resolve(&self, language: &str) -> Option<Arc<dyn CompilerBackend>> {
        self.backends.get(&language.to_lowercase()).cloned()
    }

    /// All registered names and aliases, sorted.
    pub fn supported(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}
