pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::Settings;

pub use adapters::{LocalStorage, OpCli};
pub use crate::core::engine::{MigrationEngine, RunOptions};
pub use crate::core::matcher::{match_records, MatchOutcome};
pub use crate::core::normalizer::normalize;
pub use crate::core::planner::{build_plan, PlanBuilder};
pub use crate::core::result::RunResult;
pub use utils::error::{MigrationError, Result};
