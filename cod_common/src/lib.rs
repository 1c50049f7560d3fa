mod cents;
mod rate;

pub mod helpers;
pub mod op;

pub use cents::{Cents, CentsConversionError, CommissionSplit};
pub use rate::{Rate, RateError};
