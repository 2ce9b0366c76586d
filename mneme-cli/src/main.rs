//! Mneme CLI - inspect configuration, explore decay curves, and drive the
//! memory engine from scripted operations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mneme_core::prelude::*;

#[derive(Parser)]
#[command(name = "mneme")]
#[command(about = "Associative memory engine with forgetting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Version information
    Version,
    /// Print the resolved configuration as JSON
    Config {
        /// Configuration file (defaults to mneme.toml and MNEME_* variables)
        #[arg(short, long, env = "MNEME_CONFIG_PATH")]
        path: Option<PathBuf>,
    },
    /// Print a decay curve
    Decay {
        /// Decay rate per unit of elapsed time
        #[arg(long, default_value_t = 0.1)]
        rate: f64,
        /// Starting strength
        #[arg(long, default_value_t = 1.0)]
        initial: f64,
        /// Forgetting threshold
        #[arg(long, default_value_t = 0.01)]
        threshold: f64,
        /// Number of steps to print
        #[arg(long, default_value_t = 10)]
        steps: usize,
        /// Elapsed units per step
        #[arg(long, default_value_t = 10.0)]
        step_size: f64,
    },
    /// Execute a JSON-lines script of memory operations
    Run {
        /// Script file, or `-` for stdin
        script: PathBuf,
        /// Configuration file
        #[arg(short, long, env = "MNEME_CONFIG_PATH")]
        config: Option<PathBuf>,
    },
}

/// One scripted operation
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum ScriptOp {
    Add {
        owner: String,
        content: String,
        #[serde(default)]
        metadata: Metadata,
    },
    Query {
        owner: String,
        text: String,
        #[serde(default = "default_results")]
        n: usize,
    },
    Context {
        owner: String,
        text: String,
    },
    Stats {
        owner: String,
    },
    Cleanup {
        #[serde(default)]
        owner: Option<String>,
    },
    Access {
        owner: String,
        id: String,
    },
    Hottest {
        owner: String,
        #[serde(default = "default_results")]
        limit: usize,
    },
    Advance {
        #[serde(with = "humantime_serde")]
        by: Duration,
    },
    Health,
}

fn default_results() -> usize {
    5
}

fn load_config(path: Option<&Path>) -> Result<MnemeConfig> {
    let config = match path {
        Some(path) => MnemeConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => MnemeConfig::load().context("loading configuration")?,
    };
    Ok(config)
}

fn print_decay_curve(rate: f64, initial: f64, threshold: f64, steps: usize, step_size: f64) {
    let mut forgotten_at = None;
    println!("{:>10}  {:>12}", "elapsed", "strength");
    for step in 0..=steps {
        let elapsed = step as f64 * step_size;
        let strength = mneme_core::lifecycle::retention(initial, elapsed, rate);
        let tier = if strength < threshold { " (forgotten)" } else { "" };
        println!("{:>10.1}  {:>12.7}{}", elapsed, strength, tier);
        if strength < threshold && forgotten_at.is_none() {
            forgotten_at = Some(elapsed);
        }
    }
    match forgotten_at {
        Some(elapsed) => println!("Strength falls below {} at {:.1} units", threshold, elapsed),
        None => println!("Strength stays above {} for the whole curve", threshold),
    }
}

async fn execute(
    memory: &MemoryOrchestrator,
    clock: &ManualClock,
    op: ScriptOp,
) -> Result<serde_json::Value> {
    let value = match op {
        ScriptOp::Add {
            owner,
            content,
            metadata,
        } => serde_json::to_value(memory.add(&owner, &content, metadata).await?)?,
        ScriptOp::Query { owner, text, n } => {
            serde_json::to_value(memory.query(&owner, &text, n).await?)?
        }
        ScriptOp::Context { owner, text } => {
            let context = &memory.config().context;
            let recalled = memory.query(&owner, &text, context.max_items).await?;
            json!(render_memory_context(&recalled, context))
        }
        ScriptOp::Stats { owner } => serde_json::to_value(memory.stats(&owner))?,
        ScriptOp::Cleanup { owner } => serde_json::to_value(memory.cleanup(owner.as_deref()).await)?,
        ScriptOp::Access { owner, id } => {
            let record = memory.access(&owner, &id).await?;
            json!({
                "id": record.id,
                "strength": record.strength,
                "access_count": record.access_count,
            })
        }
        ScriptOp::Hottest { owner, limit } => {
            let now = clock.now();
            let hottest: Vec<_> = memory
                .hottest(&owner, limit)
                .into_iter()
                .map(|r| {
                    let idle = (now - r.last_accessed_at).to_std().unwrap_or_default();
                    json!({
                        "id": r.id,
                        "content": r.content,
                        "strength": r.strength,
                        "idle": format_elapsed(idle),
                    })
                })
                .collect();
            json!(hottest)
        }
        ScriptOp::Advance { by } => {
            clock.advance(by);
            json!({ "now": clock.now().to_rfc3339() })
        }
        ScriptOp::Health => serde_json::to_value(memory.health().await)?,
    };
    Ok(value)
}

async fn run_script(script: &Path, config: MnemeConfig) -> Result<()> {
    let source = if script == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(script)
            .with_context(|| format!("reading script {}", script.display()))?
    };

    let clock = Arc::new(ManualClock::starting_now());
    let memory = MemoryOrchestrator::builder()
        .embeddings(EmbeddingProviderFactory::create(&config.embeddings)?)
        .index(Arc::new(InMemoryVectorIndex::new()))
        .clock(clock.clone())
        .hook(Arc::new(LoggingHook))
        .config(config)
        .build()?;

    for (number, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let op: ScriptOp = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid operation", number + 1))?;
        let output = match execute(&memory, &clock, op).await {
            Ok(result) => json!({ "line": number + 1, "result": result }),
            Err(e) => {
                tracing::warn!(line = number + 1, error = %e, "Operation failed");
                json!({ "line": number + 1, "error": e.to_string() })
            }
        };
        println!("{}", output);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("mneme {}", env!("CARGO_PKG_VERSION"));
            println!("mneme-core {}", mneme_core::VERSION);
        }
        Commands::Config { path } => {
            let config = load_config(path.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Decay {
            rate,
            initial,
            threshold,
            steps,
            step_size,
        } => print_decay_curve(rate, initial, threshold, steps, step_size),
        Commands::Run { script, config } => {
            let config = load_config(config.as_deref())?;
            run_script(&script, config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_script_ops_parse() {
        let op: ScriptOp =
            serde_json::from_str(r#"{"op":"add","owner":"u","content":"likes tea"}"#).unwrap();
        assert!(matches!(op, ScriptOp::Add { ref owner, .. } if owner == "u"));

        let op: ScriptOp = serde_json::from_str(r#"{"op":"query","owner":"u","text":"tea"}"#).unwrap();
        assert!(matches!(op, ScriptOp::Query { n: 5, .. }));

        let op: ScriptOp = serde_json::from_str(r#"{"op":"advance","by":"100s"}"#).unwrap();
        assert!(matches!(op, ScriptOp::Advance { by } if by == Duration::from_secs(100)));

        let op: ScriptOp = serde_json::from_str(r#"{"op":"cleanup"}"#).unwrap();
        assert!(matches!(op, ScriptOp::Cleanup { owner: None }));
    }

    #[tokio::test]
    async fn test_scripted_forgetting() {
        let clock = Arc::new(ManualClock::starting_now());
        let memory = MemoryOrchestrator::builder()
            .embeddings(Arc::new(HashingEmbeddings::new(64).unwrap()))
            .index(Arc::new(InMemoryVectorIndex::new()))
            .clock(clock.clone())
            .build()
            .unwrap();

        let ops = [
            r#"{"op":"add","owner":"u","content":"likes tea"}"#,
            r#"{"op":"advance","by":"100s"}"#,
            r#"{"op":"cleanup","owner":"u"}"#,
        ];
        let mut last = serde_json::Value::Null;
        for op in ops {
            last = execute(&memory, &clock, serde_json::from_str(op).unwrap())
                .await
                .unwrap();
        }
        assert_eq!(last["removed_count"], 1);
    }
}
