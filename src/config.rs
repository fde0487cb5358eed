//! Engine configuration
//!
//! Defaults live here; every knob can be overridden from the environment
//! (`SNIPBOX_*`). The timeout is clamped to a fixed range so a caller can
//! never configure an unbounded or effectively-zero wait.

use tracing::warn;

/// Lower bound for the execution timeout in milliseconds
pub const MIN_TIMEOUT_MS: u64 = 500;
/// Upper bound for the execution timeout in milliseconds
pub const MAX_TIMEOUT_MS: u64 = 10_000;
/// Default execution timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Execution timeout in milliseconds, clamped to [500, 10000]
    pub timeout_ms: u64,
    /// Compile phase cap in milliseconds (default: 10000ms = 10s)
    pub compile_timeout_ms: u64,
    /// Captured output cap per stream in bytes (default: 64 KiB)
    pub max_output_bytes: usize,
    /// Grace period for draining the worker on shutdown, in milliseconds
    pub shutdown_grace_ms: u64,
    /// Default language key used by `execute`
    pub language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            compile_timeout_ms: 10_000,
            max_output_bytes: 64 * 1024,
            shutdown_grace_ms: 1_000,
            language: "rust".into(),
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: clamp_timeout(env_u64("SNIPBOX_TIMEOUT_MS", defaults.timeout_ms)),
            compile_timeout_ms: env_u64("SNIPBOX_COMPILE_TIMEOUT_MS", defaults.compile_timeout_ms),
            max_output_bytes: env_u64("SNIPBOX_MAX_OUTPUT_BYTES", defaults.max_output_bytes as u64)
                as usize,
            shutdown_grace_ms: env_u64("SNIPBOX_SHUTDOWN_GRACE_MS", defaults.shutdown_grace_ms),
            language: std::env::var("SNIPBOX_LANGUAGE").unwrap_or(defaults.language),
        }
    }
}

/// Clamp a requested timeout into the supported range, warning when the
/// requested value had to be adjusted.
pub fn clamp_timeout(ms: u64) -> u64 {
    let clamped = ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
    if clamped != ms {
        warn!(
            "Requested timeout {}ms outside [{}, {}], clamped to {}ms",
            ms, MIN_TIMEOUT_MS, MAX_TIMEOUT_MS, clamped
        );
    }
    clamped
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.compile_timeout_ms, 10_000);
        assert_eq!(config.max_output_bytes, 64 * 1024);
        assert_eq!(config.language, "rust");
    }

    #[test]
    fn test_clamp_timeout() {
        assert_eq!(clamp_timeout(100), 500);
        assert_eq!(clamp_timeout(500), 500);
        assert_eq!(clamp_timeout(2_000), 2_000);
        assert_eq!(clamp_timeout(10_000), 10_000);
        assert_eq!(clamp_timeout(60_000), 10_000);
    }
}
