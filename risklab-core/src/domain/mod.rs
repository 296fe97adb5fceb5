//! Domain value types. All are plain data, owned by the call that produced
//! them, and never mutated after construction.

pub mod bar;
pub mod fundamentals;
pub mod price_series;
pub mod score;

pub use bar::Bar;
pub use fundamentals::{FundamentalSnapshot, Ratio};
pub use price_series::{DatedReturns, PriceSeries};
pub use score::SignalScore;
