//! RiskLab CLI — decision, risk and signal commands over local data.
//!
//! Commands:
//! - `decide` — full gated recommendation for one or more symbols
//! - `risk` — risk snapshot (VaR, CVaR, Sharpe, Sortino, drawdown, beta, correlation)
//!   for one symbol, or for a portfolio given as `--position SYM=VALUE`
//! - `signals` — technical and fundamental assessments only
//! - `config check` — load, validate and print the effective configuration
//!
//! Bars come from `<data-dir>/<SYMBOL>.csv`, fundamentals from a TOML file.
//! JSON goes to stdout, logs to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use risklab_core::domain::DatedReturns;
use risklab_core::signals::{
    assess_fundamentals, assess_technical, FundamentalAssessment, TechnicalAssessment,
};
use risklab_engine::rationale::HttpRationaleProvider;
use risklab_engine::risk::{RiskInputs, RiskSnapshot};
use risklab_engine::sources::{
    CsvDirectorySource, FundamentalSource, JsonlDecisionSink, MarketDataSource,
    TomlFundamentalsFile,
};
use risklab_engine::{
    DecisionEngine, DecisionRequest, DecisionService, EngineConfig, Holding, ValidatedConfig,
};

#[derive(Parser)]
#[command(name = "risklab", about = "RiskLab CLI — risk metrics and gated trade decisions")]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of `<SYMBOL>.csv` bar files.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Fundamentals file (TOML, one table per symbol).
    #[arg(long, global = true)]
    fundamentals: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score, gate and size one or more symbols.
    Decide {
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Total portfolio value, for notional and share counts.
        #[arg(long)]
        portfolio_value: Option<f64>,

        /// Current position value, used as VaR exposure.
        #[arg(long)]
        position_value: Option<f64>,

        /// Benchmark symbol for beta.
        #[arg(long)]
        benchmark: Option<String>,

        /// Symbols to report correlation against.
        #[arg(long = "peer")]
        peers: Vec<String>,

        /// Append each record to this JSONL file.
        #[arg(long)]
        sink: Option<PathBuf>,

        /// Skip the rationale call even when `[ai].enabled` is set.
        #[arg(long, default_value_t = false)]
        no_ai: bool,
    },
    /// Risk snapshot for one symbol or a whole portfolio.
    Risk {
        #[arg(required_unless_present = "positions", conflicts_with = "positions")]
        symbol: Option<String>,

        /// Portfolio position as `SYMBOL=MARKET_VALUE`; repeat per holding.
        #[arg(long = "position", value_parser = parse_holding)]
        positions: Vec<Holding>,

        #[arg(long)]
        benchmark: Option<String>,

        #[arg(long = "peer", conflicts_with = "positions")]
        peers: Vec<String>,

        /// Position value; VaR amounts are scaled by it.
        #[arg(long, default_value_t = 1.0, conflicts_with = "positions")]
        exposure: f64,
    },
    /// Technical and fundamental assessments for one symbol.
    Signals { symbol: String },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the configuration and print the effective values.
    Check,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("invalid configuration")?;

    match cli.command {
        Commands::Decide {
            symbols,
            portfolio_value,
            position_value,
            benchmark,
            peers,
            sink,
            no_ai,
        } => {
            let opts = DecideOptions {
                portfolio_value,
                position_value,
                benchmark,
                peers,
                sink,
                no_ai,
            };
            run_decide(config, &cli.data_dir, cli.fundamentals, &symbols, opts)
        }
        Commands::Risk {
            symbol: Some(symbol),
            benchmark,
            peers,
            exposure,
            ..
        } => run_risk(&config, &cli.data_dir, &symbol, benchmark.as_deref(), &peers, exposure),
        Commands::Risk {
            positions,
            benchmark,
            ..
        } => run_portfolio_risk(config, &cli.data_dir, &positions, benchmark),
        Commands::Signals { symbol } => {
            run_signals(&config, &cli.data_dir, cli.fundamentals, &symbol)
        }
        Commands::Config { action } => match action {
            ConfigAction::Check => print_json(&config),
        },
    }
}

/// Logs to stderr, `info` unless `RUST_LOG` says otherwise.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn load_fundamentals(path: Option<PathBuf>) -> Result<Option<TomlFundamentalsFile>> {
    path.map(|p| {
        TomlFundamentalsFile::load(&p)
            .with_context(|| format!("failed to load fundamentals from {}", p.display()))
    })
    .transpose()
}

// ─── decide ─────────────────────────────────────────────────────────

struct DecideOptions {
    portfolio_value: Option<f64>,
    position_value: Option<f64>,
    benchmark: Option<String>,
    peers: Vec<String>,
    sink: Option<PathBuf>,
    no_ai: bool,
}

fn run_decide(
    config: ValidatedConfig,
    data_dir: &std::path::Path,
    fundamentals: Option<PathBuf>,
    symbols: &[String],
    opts: DecideOptions,
) -> Result<()> {
    let ai = config.ai.clone();
    let market = Arc::new(CsvDirectorySource::new(data_dir));
    let mut service = DecisionService::new(DecisionEngine::new(config), market);

    if let Some(file) = load_fundamentals(fundamentals)? {
        service = service.with_fundamentals(Arc::new(file));
    }
    if let Some(path) = opts.sink {
        service = service.with_sink(Arc::new(JsonlDecisionSink::new(path)));
    }
    if let Some(bench) = opts.benchmark {
        service = service.with_benchmark(bench);
    }
    if ai.enabled && !opts.no_ai {
        match HttpRationaleProvider::from_env(&ai) {
            Ok(provider) => service = service.with_rationale(Arc::new(provider)),
            Err(e) => warn!(error = %e, "rationale disabled"),
        }
    }

    let requests: Vec<DecisionRequest> = symbols
        .iter()
        .map(|symbol| {
            let mut request = DecisionRequest::new(symbol.clone());
            request.portfolio_value = opts.portfolio_value;
            request.position_value = opts.position_value;
            request.peers = opts.peers.clone();
            request
        })
        .collect();

    let mut records = Vec::with_capacity(requests.len());
    for (request, result) in requests.iter().zip(service.decide_batch(&requests)) {
        let record = result.with_context(|| format!("decision failed for {}", request.symbol))?;
        records.push(record);
    }
    info!(count = records.len(), "decisions complete");
    print_json(&records)
}

// ─── risk ───────────────────────────────────────────────────────────

fn run_risk(
    config: &ValidatedConfig,
    data_dir: &std::path::Path,
    symbol: &str,
    benchmark: Option<&str>,
    peers: &[String],
    exposure: f64,
) -> Result<()> {
    if !(exposure.is_finite() && exposure > 0.0) {
        bail!("--exposure must be a positive number, got {exposure}");
    }
    let source = CsvDirectorySource::new(data_dir);
    let lookback = config.risk.lookback + 1;
    let returns_of = |s: &str| -> Result<DatedReturns> {
        let series = source
            .price_series(s, lookback)
            .with_context(|| format!("no bars for {s}"))?;
        Ok(series.dated_returns())
    };

    let returns = returns_of(symbol)?;
    let bench = benchmark.map(&returns_of).transpose()?;
    let mut universe = Vec::new();
    if !peers.is_empty() {
        universe.push((symbol.to_string(), returns.clone()));
        for peer in peers.iter().filter(|p| p.as_str() != symbol) {
            universe.push((peer.clone(), returns_of(peer)?));
        }
    }

    let mut inputs = RiskInputs::new(&returns, exposure).with_correlation_universe(&universe);
    if let Some(b) = &bench {
        inputs = inputs.with_benchmark(b);
    }
    let snapshot = RiskSnapshot::compute(&inputs, &config.risk, config.risk_free_rate);
    for gap in &snapshot.gaps {
        info!(metric = %gap.metric, reason = %gap.reason, "metric undefined");
    }
    print_json(&snapshot)
}

/// `SYMBOL=VALUE` with a positive market value.
fn parse_holding(raw: &str) -> std::result::Result<Holding, String> {
    let (symbol, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=VALUE, got {raw:?}"))?;
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(format!("missing symbol in {raw:?}"));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value in {raw:?}: {e}"))?;
    if !(value.is_finite() && value > 0.0) {
        return Err(format!("position value must be positive, got {value}"));
    }
    Ok(Holding::new(symbol, value))
}

fn run_portfolio_risk(
    config: ValidatedConfig,
    data_dir: &std::path::Path,
    positions: &[Holding],
    benchmark: Option<String>,
) -> Result<()> {
    let market = Arc::new(CsvDirectorySource::new(data_dir));
    let mut service = DecisionService::new(DecisionEngine::new(config), market);
    if let Some(bench) = benchmark {
        service = service.with_benchmark(bench);
    }

    let snapshot = service.portfolio_risk(positions);
    if snapshot.exposure <= 0.0 {
        bail!("none of the {} positions had bars in {}", positions.len(), data_dir.display());
    }
    for gap in &snapshot.gaps {
        info!(metric = %gap.metric, reason = %gap.reason, "metric undefined");
    }
    print_json(&snapshot)
}

// ─── signals ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SignalsReport {
    symbol: String,
    bars: usize,
    technical: TechnicalAssessment,
    fundamental: Option<FundamentalAssessment>,
}

fn run_signals(
    config: &ValidatedConfig,
    data_dir: &std::path::Path,
    fundamentals: Option<PathBuf>,
    symbol: &str,
) -> Result<()> {
    let source = CsvDirectorySource::new(data_dir);
    let series = source
        .price_series(symbol, config.risk.lookback + 1)
        .with_context(|| format!("no bars for {symbol}"))?;

    let fundamental = match load_fundamentals(fundamentals)? {
        Some(file) => match file.fundamentals(symbol) {
            Ok(snapshot) => Some(assess_fundamentals(&snapshot, &config.fundamental)),
            Err(e) => {
                warn!(error = %e, "no fundamentals");
                None
            }
        },
        None => None,
    };

    print_json(&SignalsReport {
        symbol: symbol.to_string(),
        bars: series.len(),
        technical: assess_technical(series.bars(), &config.technical),
        fundamental,
    })
}
