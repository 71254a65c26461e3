//! claimcal: recalibrate settlement prediction weights from the command line.
//!
//! Reads a claim set and weight definitions from JSON files, runs one engine
//! operation and prints the result as pretty JSON on stdout. Logs go to
//! stderr (`RUST_LOG`, default `claimcal=info,warn`).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use claimcal_common::{Claim, EngineConfig, WeightDefinition, WeightMapping};
use claimcal_engine::{spawn_optimization, CalibrationSession, StrategyKind, Termination};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "CLAIMCAL_CONFIG";

/// Settlement prediction weight recalibration
#[derive(Parser, Debug)]
#[command(name = "claimcal")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Claim records (JSON array)
    #[arg(long, value_name = "FILE", global = true)]
    claims: Option<PathBuf>,

    /// Weight definitions (JSON array)
    #[arg(long, value_name = "FILE", global = true)]
    weights: Option<PathBuf>,

    /// Engine configuration (YAML, JSON or TOML); falls back to $CLAIMCAL_CONFIG
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// MAPE/RMSE of a weight mapping (base weights by default)
    Evaluate {
        /// Partial weight mapping (JSON object); omitted factors use base_weight
        #[arg(long, value_name = "FILE")]
        candidate: Option<PathBuf>,

        /// Include the worst per-claim results
        #[arg(long)]
        detailed: bool,
    },
    /// Base weights against a candidate mapping
    Compare {
        #[arg(long, value_name = "FILE")]
        candidate: PathBuf,
    },
    /// Factor impact ranking
    Impact {
        #[arg(long, value_name = "FILE")]
        candidate: Option<PathBuf>,
    },
    /// Advisory weight adjustments
    Recommend {
        #[arg(long, value_name = "FILE")]
        candidate: Option<PathBuf>,
    },
    /// One-factor sensitivity sweep from min_weight to max_weight
    Sweep {
        #[arg(long)]
        factor: String,

        #[arg(long, default_value = "10")]
        steps: usize,

        #[arg(long, value_name = "FILE")]
        candidate: Option<PathBuf>,
    },
    /// Search for better weights
    Optimize {
        /// grid, gradient or smart
        #[arg(long, default_value = "smart")]
        strategy: StrategyKind,

        /// Hold a factor at base_weight (repeatable)
        #[arg(long = "keep", value_name = "FACTOR")]
        keep: Vec<String>,

        #[arg(long)]
        max_iterations: Option<usize>,
    },
    /// Weight table as CSV
    Export {
        #[arg(long, value_name = "FILE")]
        candidate: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct EvaluateOutput<'a> {
    metrics: &'a claimcal_engine::AggregateMetrics,
    unrecognised_values: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    worst: Option<Vec<&'a claimcal_engine::ClaimResult>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("claimcal=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let top_n = config.output.top_n;

    let claims: Vec<Claim> = read_json(require(&cli.claims, "--claims")?)?;
    let definitions: Vec<WeightDefinition> = read_json(require(&cli.weights, "--weights")?)?;
    info!(claims = claims.len(), factors = definitions.len(), "inputs loaded");
    let session = CalibrationSession::new(&claims, definitions, config)?;

    match cli.command {
        Command::Evaluate { candidate, detailed } => {
            let mapping = candidate_mapping(&session, candidate.as_deref())?;
            let report = session.evaluate_detailed(&mapping)?;
            emit(&EvaluateOutput {
                metrics: &report.metrics,
                unrecognised_values: session.dataset().unrecognised_values(),
                worst: detailed.then(|| report.worst(top_n)),
            })?;
        }
        Command::Compare { candidate } => {
            let candidate = candidate_mapping(&session, Some(candidate.as_path()))?;
            let comparison = session.compare(&session.base_mapping(), &candidate)?;
            emit(&serde_json::json!({
                "metrics": comparison.metrics,
                "top_changes": comparison.top_changes(top_n),
            }))?;
        }
        Command::Impact { candidate } => {
            let report = session.impact(&candidate_mapping(&session, candidate.as_deref())?)?;
            emit(&serde_json::json!({
                "evaluated_claims": report.evaluated_claims,
                "factors": report.ranked(),
            }))?;
        }
        Command::Recommend { candidate } => {
            emit(&session.recommend(&candidate_mapping(&session, candidate.as_deref())?)?)?;
        }
        Command::Sweep { factor, steps, candidate } => {
            let mapping = candidate_mapping(&session, candidate.as_deref())?;
            emit(&session.sweep_linear(&mapping, &factor, steps)?)?;
        }
        Command::Optimize {
            strategy,
            keep,
            max_iterations,
        } => {
            let mut optimizer_config = session.config().optimizer.clone();
            optimizer_config.keep_constant.extend(keep);
            if let Some(n) = max_iterations {
                optimizer_config.max_iterations = n;
            }
            optimize(Arc::new(session), strategy, optimizer_config).await?;
        }
        Command::Export { candidate } => {
            print!("{}", session.export_csv(&candidate_mapping(&session, candidate.as_deref())?)?);
        }
    }
    Ok(())
}

async fn optimize(
    session: Arc<CalibrationSession>,
    strategy: StrategyKind,
    config: claimcal_common::OptimizerConfig,
) -> Result<()> {
    info!(%strategy, "starting optimization");
    let handle = spawn_optimization(session, strategy.build(), config);

    let mut progress = handle.progress();
    tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let point = *progress.borrow();
            if let Some(p) = point {
                debug!(iteration = p.iteration, objective = p.metric, "progress");
            }
        }
    });

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping at the next iteration");
            token.cancel();
        }
    });

    let result = handle.join().await?;
    if result.termination == Termination::Cancelled {
        warn!(
            iterations = result.iterations,
            "optimization cancelled; reporting best weights so far"
        );
    }
    emit(&result)
}

fn load_config(flag: Option<&Path>) -> Result<EngineConfig> {
    let path = match flag {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::var_os(CONFIG_ENV).map(PathBuf::from),
    };
    match path {
        Some(p) if p.exists() => {
            EngineConfig::load(&p).with_context(|| format!("loading config {}", p.display()))
        }
        Some(p) => {
            warn!(path = %p.display(), "config file not found; using defaults");
            Ok(EngineConfig::default())
        }
        None => Ok(EngineConfig::default()),
    }
}

fn require<'a>(path: &'a Option<PathBuf>, flag: &str) -> Result<&'a Path> {
    path.as_deref()
        .with_context(|| format!("{flag} <FILE> is required"))
}

/// A `--candidate` file completed from the base weights, or the base weights.
fn candidate_mapping(session: &CalibrationSession, path: Option<&Path>) -> Result<WeightMapping> {
    match path {
        Some(p) => {
            let partial: WeightMapping = read_json(p)?;
            Ok(session.weights().complete(&partial)?)
        }
        None => Ok(session.base_mapping()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
