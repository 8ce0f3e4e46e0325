//! Model configuration.
//!
//! [`ModelConfig::default`] carries the standard constants. Any subset can be
//! overridden from a RON file:
//!
//! ```ron
//! ModelConfig(
//!     frame_horizon: 20000,
//!     disable_frame: 15000,
//!     max_producers_per_type: 12,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::{fixed_serde, ratio, Fixed};
use crate::Frame;

/// Fixed standard-opening schedule the income simulator assumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningSchedule {
    /// Frame mineral income starts.
    pub income_start_frame: Frame,
    /// Mineral workers at the start of the match.
    pub initial_mineral_workers: i32,
    /// Supply headroom at the start of the match (half-units).
    pub initial_supply: i32,
    /// Frame the first supply building's builder leaves the mineral line.
    pub builder_departs: Frame,
    /// Frame the first supply building is placed.
    pub first_supply_placed: Frame,
    /// Frame the first supply building completes.
    pub first_supply_completes: Frame,
    /// Frame the builder is back mining.
    pub builder_returns: Frame,
    /// Frame the scouting worker leaves.
    pub scout_departs: Frame,
    /// Frame the scouting worker is assumed dead.
    pub scout_dies: Frame,
    /// Workers moved to each completed refinery.
    pub workers_per_refinery: i32,
    /// Delay between refinery completion and workers arriving.
    pub gas_worker_delay: Frame,
    /// Refinery start frame assumed by the alternate gas hypothesis.
    pub standard_gas_frame: Frame,
}

impl Default for OpeningSchedule {
    fn default() -> Self {
        Self {
            income_start_frame: 25,
            initial_mineral_workers: 4,
            initial_supply: 8,
            builder_departs: 1000,
            first_supply_placed: 1115,
            first_supply_completes: 1625,
            builder_returns: 1230,
            scout_departs: 1850,
            scout_dies: 4500,
            workers_per_refinery: 3,
            gas_worker_delay: 25,
            standard_gas_frame: 1900,
        }
    }
}

/// Tunable constants for the whole model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Length of every per-frame resource array.
    pub frame_horizon: Frame,
    /// Frame at which the model disqualifies itself.
    pub disable_frame: Frame,
    /// Minerals mined per worker per frame.
    #[serde(with = "fixed_serde")]
    pub minerals_per_worker_frame: Fixed,
    /// Gas mined per worker per frame.
    #[serde(with = "fixed_serde")]
    pub gas_per_worker_frame: Fixed,
    /// Percentage of cost refunded for a building killed before completion.
    pub cancel_refund_percent: i32,
    /// First frame scanned for supply shortfalls.
    pub supply_scan_start: Frame,
    /// Safety bound on producers of one type.
    pub max_producers_per_type: usize,
    /// Cap on steps of the worst-case production simulation.
    pub max_worst_case_steps: usize,
    /// Cap on prerequisite recursion depth.
    pub max_prerequisite_depth: usize,
    /// Standard opening.
    pub opening: OpeningSchedule,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            frame_horizon: 20_000,
            disable_frame: 15_000,
            minerals_per_worker_frame: ratio(445, 10_000),
            gas_per_worker_frame: ratio(71, 1000),
            cancel_refund_percent: 75,
            supply_scan_start: 0,
            max_producers_per_type: 12,
            max_worst_case_steps: 200,
            max_prerequisite_depth: 16,
            opening: OpeningSchedule::default(),
        }
    }
}

impl ModelConfig {
    /// Parse a config from a RON string. Missing fields take their defaults.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Ok(ron::from_str(ron)?)
    }

    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Horizon as an array length.
    #[must_use]
    pub fn horizon_len(&self) -> usize {
        self.frame_horizon.max(0) as usize
    }
}
