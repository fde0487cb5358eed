//! snipbox: compile-and-run engine for untrusted source snippets.
//!
//! Hand the engine a snippet; it prepares the text into a compilable
//! program, drives the language's toolchain, runs the result in its own
//! process group under a time budget, and classifies whatever happened
//! into a stable verdict: success, compile error, runtime error, or
//! timeout. Requests are serialized through a single worker, so one
//! snippet runs at a time and a runaway program never outlives its
//! budget by more than the kill latency.
//!
//! ```no_run
//! use snipbox::ExecutionEngine;
//!
//! # async fn demo() {
//! let engine = ExecutionEngine::with_defaults();
//! let result = engine.execute("println!(\"hi\");").await.unwrap();
//! println!("{}", result.formatted());
//! engine.shutdown().await;
//! # }
//! ```

pub mod backend;
pub mod capture;
pub mod classify;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod languages;
pub mod prepare;
pub mod result;
pub mod runner;
pub mod worker;

pub use config::EngineConfig;
pub use engine::{EngineError, ExecutionEngine};
pub use result::{ErrorKind, ExecutionResult};
