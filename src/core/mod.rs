pub mod engine;
pub mod executor;
pub mod matcher;
pub mod normalizer;
pub mod planner;
pub mod result;

pub use crate::domain::model::{
    DestinationRecord, MatchKey, MatchedPair, Mode, Operation, PlannedOperation, SourceRecord,
    TotpUri,
};
pub use crate::domain::ports::{ConfigProvider, Destination, Storage};
pub use crate::utils::error::Result;
