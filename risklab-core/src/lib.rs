//! RiskLab Core — pure scoring math, no I/O.
//!
//! This crate contains everything a decision is computed from:
//! - Domain value types (bars, price series, signal scores, fundamentals)
//! - Series utilities (returns, rolling windows, EMA, percentiles)
//! - Indicator trait and the six technical indicators
//! - Technical and fundamental signal scoring with excluded-weight averaging
//! - Position sizers (Kelly, fixed fraction)

pub mod domain;
pub mod error;
pub mod indicators;
pub mod params;
pub mod series;
pub mod signals;
pub mod sizers;

pub use error::{ComputeError, SeriesError};
pub use params::ParamError;
