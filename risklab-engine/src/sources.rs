//! Collaborator contracts and their file-backed implementations.
//!
//! The engine never performs I/O itself. Market data, fundamentals and
//! persistence are reached through these traits; the service layer decides
//! what a failure means (usually: proceed with less input).

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use risklab_core::domain::{Bar, FundamentalSnapshot, PriceSeries};

use crate::decision::DecisionRecord;
use crate::error::CollaboratorError;

/// Supplies daily bars for a symbol.
///
/// May return fewer bars than requested; the engine degrades on short
/// history rather than failing.
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &str;

    /// The most recent `lookback` bars for `symbol`, oldest first.
    fn price_series(&self, symbol: &str, lookback: usize) -> Result<PriceSeries, CollaboratorError>;
}

/// Supplies fundamental ratios. Absent fields are simply missing keys.
pub trait FundamentalSource: Send + Sync {
    fn name(&self) -> &str;

    fn fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, CollaboratorError>;
}

/// Receives finished decision records. Status transitions after PROPOSED
/// belong to whoever sits behind this trait.
pub trait DecisionSink: Send + Sync {
    fn name(&self) -> &str;

    fn store(&self, record: &DecisionRecord) -> Result<(), CollaboratorError>;
}

fn check_symbol(collaborator: &str, symbol: &str) -> Result<(), CollaboratorError> {
    let bad = symbol.is_empty()
        || symbol.contains(['/', '\\'])
        || symbol.contains("..")
        || symbol.chars().any(char::is_whitespace);
    if bad {
        return Err(CollaboratorError::invalid(
            collaborator,
            format!("not a valid symbol: {symbol:?}"),
        ));
    }
    Ok(())
}

// ─── CSV bar directory ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// One `<SYMBOL>.csv` per symbol with header `date,open,high,low,close,volume`.
///
/// Rows that fail the basic OHLC sanity check are dropped.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn read_bars(&self, path: &Path) -> Result<Vec<Bar>, CollaboratorError> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| CollaboratorError::unavailable(self.name(), e))?;
        let mut bars = Vec::new();
        let mut dropped = 0usize;
        for row in reader.deserialize::<CsvBar>() {
            let row = row.map_err(|e| {
                CollaboratorError::invalid(self.name(), format!("{}: {e}", path.display()))
            })?;
            let bar = Bar::new(row.date, row.open, row.high, row.low, row.close, row.volume);
            if bar.is_sane() {
                bars.push(bar);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(path = %path.display(), dropped, "dropped insane bars");
        }
        Ok(bars)
    }
}

impl MarketDataSource for CsvDirectorySource {
    fn name(&self) -> &str {
        "csv"
    }

    fn price_series(&self, symbol: &str, lookback: usize) -> Result<PriceSeries, CollaboratorError> {
        check_symbol(self.name(), symbol)?;
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(CollaboratorError::NotFound {
                what: format!("bars for {symbol} at {}", path.display()),
            });
        }
        let bars = self.read_bars(&path)?;
        let series = PriceSeries::new(symbol, bars)
            .map_err(|e| CollaboratorError::invalid(self.name(), e))?;
        Ok(series.tail(lookback))
    }
}

// ─── TOML fundamentals ──────────────────────────────────────────────

/// A TOML file with one table per symbol:
///
/// ```toml
/// [AAPL]
/// pe_ratio = 28.5
/// sector_pe_median = 24.0
/// roe = 0.45
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlFundamentalsFile {
    snapshots: BTreeMap<String, FundamentalSnapshot>,
}

impl TomlFundamentalsFile {
    pub fn from_toml_str(content: &str) -> Result<Self, CollaboratorError> {
        let snapshots = toml::from_str(content)
            .map_err(|e| CollaboratorError::invalid("toml-fundamentals", e))?;
        Ok(Self { snapshots })
    }

    pub fn load(path: &Path) -> Result<Self, CollaboratorError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CollaboratorError::unavailable("toml-fundamentals", format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }
}

impl FundamentalSource for TomlFundamentalsFile {
    fn name(&self) -> &str {
        "toml-fundamentals"
    }

    fn fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, CollaboratorError> {
        self.snapshots
            .get(symbol)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound {
                what: format!("fundamentals for {symbol}"),
            })
    }
}

// ─── JSONL decision sink ────────────────────────────────────────────

/// Append-only JSONL file, one record per line.
#[derive(Debug)]
pub struct JsonlDecisionSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlDecisionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()
    }

    /// Every record in the file. Malformed lines are skipped.
    pub fn read_all(&self) -> Result<Vec<DecisionRecord>, CollaboratorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)
            .map_err(|e| CollaboratorError::unavailable(self.name(), e))?;
        let mut records = Vec::new();
        for (lineno, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| CollaboratorError::unavailable(self.name(), e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DecisionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = lineno + 1, error = %e, "skipping malformed decision line"),
            }
        }
        Ok(records)
    }
}

impl DecisionSink for JsonlDecisionSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn store(&self, record: &DecisionRecord) -> Result<(), CollaboratorError> {
        let json = serde_json::to_string(record)
            .map_err(|e| CollaboratorError::invalid(self.name(), e))?;
        self.append(&json)
            .map_err(|e| CollaboratorError::unavailable(self.name(), format!("{}: {e}", self.path.display())))
    }
}

/// Keeps records in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl DecisionSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn store(&self, record: &DecisionRecord) -> Result<(), CollaboratorError> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(record.clone());
        Ok(())
    }
}
