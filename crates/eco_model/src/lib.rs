//! # Eco Model
//!
//! Deterministic model of an RTS opponent's economy and production.
//!
//! From partial sightings of the opponent's units, buildings and research,
//! the model reconstructs what they must have built, when, and with what
//! resources, and bounds what they could have built that was not seen.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond explicit observation-log save/load
//! - No randomness
//! - No floating-point math (income uses fixed-point)
//!
//! ## Crate Structure
//!
//! - [`model`] - The model object: lifecycle, ingestion and queries
//! - [`income`] - Baseline income simulation
//! - [`ledger`] - Observed and implied unit records
//! - [`prerequisites`] - Backward tech-graph inference
//! - [`resources`] - Per-frame resource arrays and the spend/refund protocol
//! - [`scheduler`] - Producer assignment and implied producers
//! - [`query`] - Memoized query engine
//! - [`unit_type`] - Static game data
//! - [`view`] - What the host tells the model about the match
//! - [`observation_log`] - Recording and replay

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod error;
pub mod income;
pub mod ledger;
pub mod math;
pub mod model;
pub mod observation_log;
pub mod prerequisites;
pub mod query;
pub mod resources;
pub mod scheduler;
pub mod unit_type;
pub mod view;

/// Discrete simulation time, in game frames.
pub type Frame = i32;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ModelConfig, OpeningSchedule};
    pub use crate::error::{Disqualification, ModelError, Result};
    pub use crate::ledger::{UnitId, ALIVE};
    pub use crate::model::{Observation, OpponentEconomicModel};
    pub use crate::observation_log::{LogEntry, ObservationLog};
    pub use crate::query::UnitCountBound;
    pub use crate::unit_type::{Cost, Race, ResearchKind, UnitType, UpgradeOrTech};
    pub use crate::view::{MatchSnapshot, MatchView};
    pub use crate::Frame;
}
