//! Domain model for the CADIS coding-improvement simulation: the scenario
//! catalog, the attempt simulator, progress aggregation and improvement cycles.

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod cycles;
mod error;
pub mod simulator;
pub mod types;

pub use aggregate::summarize;
pub use catalog::{seed_scenarios, Catalog};
pub use config::{load_config, load_from_env, Config};
pub use cycles::{CyclePlan, CycleReport, CycleRunner, MAX_ATTEMPTS_PER_CYCLE};
pub use error::CoreError;
pub use simulator::Simulator;
pub use types::{
    Attempt, Category, CategoryScores, Difficulty, Principle, PrincipleAdherence, Progress,
    Scenario,
};

/// RFC 3339 timestamp with millisecond precision, as stored and served.
pub fn ts(t: chrono::DateTime<chrono::Utc>) -> String {
    t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
