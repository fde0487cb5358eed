//! Snippet preparation
//!
//! Normalizes a raw submission into a complete compilable program:
//! - a snippet that already has an entry point passes through unchanged
//! - a bare function (or other top-level items) is kept as items with an
//!   empty entry point appended, so it compiles but is not invoked
//! - anything else is treated as bare statements and wrapped in a `main`
//!   shell
//!
//! The preparer does NOT:
//! - Reject malformed snippets (they fall through and fail at compile time)
//! - Touch languages whose snippets are already complete programs
//!
//! Callers reject empty/whitespace-only input before calling in here.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::languages::WrapMode;

/// A snippet normalized into a complete compilable program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedProgram {
    /// Full program text handed to the compiler
    pub text: String,
    /// Synthetic shell lines prepended before the user's first line
    pub line_offset: u32,
}

/// What the preparer decided a snippet is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnippetShape {
    /// Already a complete program with an entry point
    Complete,
    /// Top-level item definitions without an entry point
    Items,
    /// A sequence of bare statements
    Statements,
}

fn main_fn_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:pub\s+)?(?:async\s+)?fn\s+main\s*\(").unwrap()
    })
}

fn fn_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+"[^"]*"\s+)?fn\s+[A-Za-z_][A-Za-z0-9_]*\s*[(<]"#,
        )
        .unwrap()
    })
}

fn shape(source: &str) -> SnippetShape {
    if main_fn_re().is_match(source) {
        return SnippetShape::Complete;
    }

    // First line that is not blank, a line comment, or an attribute
    let lead = source
        .lines()
        .map(str::trim_start)
        .find(|line| !line.is_empty() && !line.starts_with("//") && !line.starts_with("#["));

    match lead {
        Some(line) if fn_item_re().is_match(line) => SnippetShape::Items,
        _ => SnippetShape::Statements,
    }
}

/// Prepare a snippet according to the language's wrap strategy.
pub fn prepare(source: &str, wrap: WrapMode) -> PreparedProgram {
    match wrap {
        WrapMode::None => PreparedProgram {
            text: source.to_string(),
            line_offset: 0,
        },
        WrapMode::BracedMain => {
            let shape = shape(source);
            debug!("Prepared snippet as {:?}", shape);
            match shape {
                SnippetShape::Complete => PreparedProgram {
                    text: source.to_string(),
                    line_offset: 0,
                },
                // Items compile but are not invoked; the empty main keeps
                // the unit linkable and the inner attribute keeps the
                // compiler quiet about unused definitions.
                SnippetShape::Items => PreparedProgram {
                    text: format!("#![allow(dead_code)]\n{}\nfn main() {{}}\n", source),
                    line_offset: 1,
                },
                SnippetShape::Statements => PreparedProgram {
                    text: format!("fn main() {{\n{}\n}}\n", source),
                    line_offset: 1,
                },
            }
        }
    }
}
