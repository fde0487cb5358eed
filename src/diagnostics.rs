//! Diagnostic extraction
//!
//! Turns raw toolchain output into user-facing diagnostics:
//! - compile failures: structured JSON diagnostics when the toolchain
//!   emits them, otherwise a best-effort text scan (`line <N>` token,
//!   absent means unknown - never a guess)
//! - runtime faults: panic reports and tracebacks, reduced to the fault
//!   kind and message plus up to three frames from the user's own unit
//!
//! Line numbers are reported in the user's snippet coordinates: the
//! preparer's synthetic shell lines are subtracted out before surfacing.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

/// Maximum stack frames from the user's unit included in a fault message
const MAX_USER_FRAMES: usize = 3;

/// A compile failure, reduced to what the caller can act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    pub message: String,
    /// Best-effort line in the user's snippet; None if unknown
    pub line: Option<u32>,
}

/// Map a line in the prepared program back to the user's snippet.
pub fn map_line(raw_line: u32, line_offset: u32) -> u32 {
    raw_line.saturating_sub(line_offset).max(1)
}

// -------- structured diagnostics (rustc JSON) --------

#[derive(Debug, Deserialize)]
struct ToolDiagnostic {
    message: String,
    level: String,
    #[serde(default)]
    spans: Vec<ToolSpan>,
}

#[derive(Debug, Deserialize)]
struct ToolSpan {
    file_name: String,
    line_start: u32,
    is_primary: bool,
}

/// Parse machine-readable diagnostics (one JSON object per line) and
/// return the first real error. Lines that are not valid diagnostic JSON
/// are skipped; returns None when no error-level diagnostic was found so
/// the caller can fall back to the plain-text scan.
pub fn extract_structured_diagnostic(
    output: &str,
    source_file: &str,
    line_offset: u32,
) -> Option<CompileDiagnostic> {
    for line in output.lines() {
        let Ok(diag) = serde_json::from_str::<ToolDiagnostic>(line) else {
            continue;
        };
        if diag.level != "error" || diag.message.starts_with("aborting due to") {
            continue;
        }

        let line = diag
            .spans
            .iter()
            .find(|span| span.is_primary && span.file_name.ends_with(source_file))
            .map(|span| map_line(span.line_start, line_offset));

        return Some(CompileDiagnostic {
            message: diag.message,
            line,
        });
    }
    None
}

// -------- plain-text diagnostics --------

fn line_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bline\s+(\d+)").unwrap())
}

fn error_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*[\w.]*(?:Error|Exception)\s*:").unwrap())
}

fn error_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^error(?:\[\w+\])?:\s*").unwrap())
}

/// Best-effort extraction from plain toolchain text.
pub fn extract_plain_diagnostic(output: &str, line_offset: u32) -> CompileDiagnostic {
    let line = line_number_re()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|n| map_line(n, line_offset));

    CompileDiagnostic {
        message: clean_plain_message(output),
        line,
    }
}

/// Strip toolchain-internal scaffolding from a textual failure report.
fn clean_plain_message(raw: &str) -> String {
    // Prefer the final explicit error line when one exists
    if let Some(found) = error_line_re().find_iter(raw).last() {
        if let Some(line) = raw[found.start()..].lines().next() {
            return line.trim().to_string();
        }
    }

    // Otherwise keep the text minus traceback/location noise
    let kept: Vec<&str> = raw
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let t = line.trim_start();
            !t.is_empty()
                && !t.starts_with("Traceback (most recent call last)")
                && !t.starts_with("File \"")
                && !t.starts_with("-->")
                && !t.starts_with('^')
        })
        .collect();

    let joined = kept.join("\n");
    let cleaned = error_prefix_re().replace(joined.trim(), "").to_string();
    if cleaned.is_empty() {
        "Compilation failed".to_string()
    } else {
        cleaned
    }
}

// -------- runtime faults --------

fn panic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^thread '[^']*'(?: \(\d+\))? panicked at ([^:\n]+):(\d+):(\d+):\s*$")
            .unwrap()
    })
}

fn panic_legacy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"thread '[^']*'(?: \(\d+\))? panicked at '([^']*)', ([^:\n]+):(\d+):(\d+)")
            .unwrap()
    })
}

fn backtrace_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s+\d+:\s+(\S.*)$").unwrap())
}

fn traceback_frame_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?m)^\s*File "([^"]+)", line (\d+)(?:, in (.+))?$"#).unwrap())
}

/// Extract a fault description from a failed run's stderr: the fault kind
/// and message, a snippet-relative line when the report names one, and up
/// to three frames belonging to the user's unit. Returns None when the
/// stderr matches no known fault shape.
pub fn extract_runtime_fault(
    stderr: &str,
    source_file: &str,
    line_offset: u32,
) -> Option<String> {
    extract_panic_fault(stderr, source_file, line_offset)
        .or_else(|| extract_traceback_fault(stderr, source_file, line_offset))
}

fn extract_panic_fault(stderr: &str, source_file: &str, line_offset: u32) -> Option<String> {
    let (payload, file, raw_line) = if let Some(caps) = panic_re().captures(stderr) {
        // Payload is the first non-empty line after the location header
        let after = &stderr[caps.get(0)?.end()..];
        let payload = after
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .filter(|l| !l.starts_with("note:") && !l.starts_with("stack backtrace"))
            .unwrap_or("panic")
            .to_string();
        let file = caps.get(1)?.as_str().trim().to_string();
        let raw_line = caps.get(2)?.as_str().parse::<u32>().ok();
        (payload, file, raw_line)
    } else if let Some(caps) = panic_legacy_re().captures(stderr) {
        let payload = caps.get(1)?.as_str().to_string();
        let file = caps.get(2)?.as_str().trim().to_string();
        let raw_line = caps.get(3)?.as_str().parse::<u32>().ok();
        (payload, file, raw_line)
    } else {
        return None;
    };

    let mut message = match raw_line {
        Some(n) if file.ends_with(source_file) => {
            format!("panicked at line {}: {}", map_line(n, line_offset), payload)
        }
        _ => format!("panicked: {}", payload),
    };

    // The unit is compiled as crate `main`, so its symbols carry that
    // prefix; everything else is runtime internals.
    let user_frames: Vec<&str> = backtrace_frame_re()
        .captures_iter(stderr)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|symbol| symbol.starts_with("main::") || *symbol == "main")
        .take(MAX_USER_FRAMES)
        .collect();
    for frame in user_frames {
        message.push_str("\n  at ");
        message.push_str(frame);
    }

    Some(message)
}

fn extract_traceback_fault(stderr: &str, source_file: &str, line_offset: u32) -> Option<String> {
    let found = error_line_re().find_iter(stderr).last()?;
    let error_line = stderr[found.start()..].lines().next()?.trim().to_string();

    // Traceback frames run outermost to innermost; the last ones are
    // closest to the fault.
    let frames: Vec<String> = traceback_frame_re()
        .captures_iter(stderr)
        .filter(|caps| {
            caps.get(1)
                .map(|m| m.as_str().ends_with(source_file))
                .unwrap_or(false)
        })
        .filter_map(|caps| {
            let raw_line = caps.get(2)?.as_str().parse::<u32>().ok()?;
            let location = match caps.get(3) {
                Some(ctx) => format!("line {}, in {}", map_line(raw_line, line_offset), ctx.as_str()),
                None => format!("line {}", map_line(raw_line, line_offset)),
            };
            Some(location)
        })
        .collect();

    let mut message = error_line;
    for frame in frames.iter().rev().take(MAX_USER_FRAMES).rev() {
        message.push_str("\n  at ");
        message.push_str(frame);
    }

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_line_subtracts_offset() {
        assert_eq!(map_line(5, 1), 4);
        assert_eq!(map_line(3, 0), 3);
        // Errors attributed to the synthetic shell clamp to the first line
        assert_eq!(map_line(1, 1), 1);
    }

    #[test]
    fn test_structured_takes_first_error() {
        let output = concat!(
            r#"{"message":"unused variable: `x`","level":"warning","spans":[{"file_name":"main.rs","line_start":2,"is_primary":true}]}"#,
            "\n",
            r#"{"message":"expected `;`, found `}`","level":"error","spans":[{"file_name":"main.rs","line_start":3,"is_primary":true}]}"#,
            "\n",
            r#"{"message":"aborting due to 1 previous error","level":"error","spans":[]}"#,
        );
        let diag = extract_structured_diagnostic(output, "main.rs", 1).unwrap();
        assert_eq!(diag.message, "expected `;`, found `}`");
        assert_eq!(diag.line, Some(2));
    }

    #[test]
    fn test_structured_without_primary_span() {
        let output =
            r#"{"message":"`main` function not found in crate `main`","level":"error","spans":[]}"#;
        let diag = extract_structured_diagnostic(output, "main.rs", 0).unwrap();
        assert_eq!(diag.line, None);
    }

    #[test]
    fn test_structured_ignores_non_json_noise() {
        let output = "warning: some plain text\nnot json at all";
        assert!(extract_structured_diagnostic(output, "main.rs", 0).is_none());
    }

    #[test]
    fn test_plain_python_syntax_error() {
        let output = concat!(
            "  File \"main.py\", line 2\n",
            "    print(oops\n",
            "         ^\n",
            "SyntaxError: '(' was never closed\n",
        );
        let diag = extract_plain_diagnostic(output, 0);
        assert_eq!(diag.message, "SyntaxError: '(' was never closed");
        assert_eq!(diag.line, Some(2));
    }

    #[test]
    fn test_plain_line_token_is_case_insensitive() {
        let diag = extract_plain_diagnostic("Syntax problem on Line 7", 0);
        assert_eq!(diag.line, Some(7));
    }

    #[test]
    fn test_plain_without_line_is_unknown() {
        let diag = extract_plain_diagnostic("something went wrong", 0);
        assert_eq!(diag.line, None);
        assert_eq!(diag.message, "something went wrong");
    }

    #[test]
    fn test_plain_strips_error_prefix_and_location_noise() {
        let output = "error[E0433]: failed to resolve: use of undeclared crate\n --> main.rs:2:5\n";
        let diag = extract_plain_diagnostic(output, 0);
        assert_eq!(diag.message, "failed to resolve: use of undeclared crate");
    }

    #[test]
    fn test_plain_empty_output_has_fallback_message() {
        let diag = extract_plain_diagnostic("", 0);
        assert_eq!(diag.message, "Compilation failed");
        assert_eq!(diag.line, None);
    }

    #[test]
    fn test_panic_fault_modern_format() {
        let stderr = concat!(
            "thread 'main' panicked at main.rs:3:25:\n",
            "index out of bounds: the len is 3 but the index is 7\n",
            "note: run with `RUST_BACKTRACE=1` environment variable to display a backtrace\n",
        );
        let fault = extract_runtime_fault(stderr, "main.rs", 1).unwrap();
        assert!(fault.contains("panicked at line 2"));
        assert!(fault.contains("index out of bounds"));
    }

    #[test]
    fn test_panic_fault_legacy_format() {
        let stderr = "thread 'main' panicked at 'attempt to divide by zero', main.rs:2:13\n";
        let fault = extract_runtime_fault(stderr, "main.rs", 1).unwrap();
        assert!(fault.contains("panicked at line 1"));
        assert!(fault.contains("divide by zero"));
    }

    #[test]
    fn test_panic_fault_keeps_at_most_three_user_frames() {
        let stderr = concat!(
            "thread 'main' panicked at main.rs:4:9:\n",
            "boom\n",
            "stack backtrace:\n",
            "   0: rust_begin_unwind\n",
            "   1: core::panicking::panic_fmt\n",
            "   2: main::deep\n",
            "   3: main::mid\n",
            "   4: main::outer\n",
            "   5: main::main\n",
            "   6: std::rt::lang_start\n",
        );
        let fault = extract_runtime_fault(stderr, "main.rs", 1).unwrap();
        assert_eq!(fault.matches("\n  at ").count(), 3);
        assert!(fault.contains("main::deep"));
        assert!(!fault.contains("rust_begin_unwind"));
        assert!(!fault.contains("lang_start"));
    }

    #[test]
    fn test_traceback_fault() {
        let stderr = concat!(
            "Traceback (most recent call last):\n",
            "  File \"main.py\", line 3, in <module>\n",
            "    print(1 / 0)\n",
            "ZeroDivisionError: division by zero\n",
        );
        let fault = extract_runtime_fault(stderr, "main.py", 0).unwrap();
        assert!(fault.starts_with("ZeroDivisionError: division by zero"));
        assert!(fault.contains("line 3, in <module>"));
    }

    #[test]
    fn test_traceback_skips_foreign_frames() {
        let stderr = concat!(
            "Traceback (most recent call last):\n",
            "  File \"/usr/lib/python3.10/runpy.py\", line 196, in _run_module_as_main\n",
            "  File \"main.py\", line 5, in <module>\n",
            "ValueError: invalid literal\n",
        );
        let fault = extract_runtime_fault(stderr, "main.py", 0).unwrap();
        assert!(fault.contains("line 5"));
        assert!(!fault.contains("runpy"));
    }

    #[test]
    fn test_unrecognized_stderr_yields_none() {
        assert!(extract_runtime_fault("Segmentation fault", "main.rs", 0).is_none());
        assert!(extract_runtime_fault("", "main.rs", 0).is_none());
    }
}
