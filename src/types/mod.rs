//! Type definitions for the serving layer

pub mod prediction;
pub mod record;
pub mod response;

pub use prediction::{Confidence, PredictionResult, Verdict};
pub use record::{NormalizedRecord, RawRecord, RawValue};
pub use response::{PredictionResponse, ResponseStatus};
