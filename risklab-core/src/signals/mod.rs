//! Signal scoring: technical indicators and fundamental ratios, each reduced
//! to a single score in [-1, 1] with the excluded-weight policy.

pub mod fundamental;
pub mod technical;

pub use fundamental::{assess_fundamentals, FundamentalAssessment, FundamentalParams, RatioRule};
pub use technical::{
    assess_technical, ExcludedIndicator, IndicatorWeights, TechnicalAssessment,
    TechnicalIndicator, TechnicalParams,
};
