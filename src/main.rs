use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use snipbox::{EngineConfig, EngineError, ExecutionEngine};

/// Compile, run, and classify a source snippet.
#[derive(Parser, Debug)]
#[command(name = "snipbox", version, about)]
struct Args {
    /// Snippet file; reads stdin when omitted
    file: Option<PathBuf>,

    /// Language name or alias
    #[arg(short, long)]
    language: Option<String>,

    /// Execution budget in milliseconds, clamped to 500..=10000
    #[arg(short = 't', long)]
    timeout_ms: Option<u64>,

    /// Print the verdict as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Run the built-in smoke test and exit
    #[arg(long)]
    self_test: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("snipbox=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let engine = ExecutionEngine::new(EngineConfig::from_env());

    if let Some(timeout_ms) = args.timeout_ms {
        engine.set_timeout(timeout_ms);
    }

    if args.self_test {
        let passed = engine.self_test().await;
        engine.shutdown().await;
        println!("self test: {}", if passed { "ok" } else { "failed" });
        return Ok(if passed {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let source = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read snippet from stdin")?;
            buffer
        }
    };
    info!("Read {} bytes of source", source.len());

    let outcome = match &args.language {
        Some(language) => engine.execute_in(language, &source).await,
        None => engine.execute(&source).await,
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {}", e);
            if matches!(e, EngineError::UnsupportedLanguage(_)) {
                eprintln!("supported: {}", engine.supported_languages().join(", "));
            }
            engine.shutdown().await;
            return Ok(ExitCode::from(2));
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to encode result")?
        );
    } else {
        let text = result.formatted();
        if text.ends_with('\n') {
            print!("{}", text);
        } else {
            println!("{}", text);
        }
    }

    let code = if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    };
    engine.shutdown().await;
    Ok(code)
}
