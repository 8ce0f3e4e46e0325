//! Observation log replay.

use std::path::Path;

use eco_model::error::Result;
use eco_model::observation_log::ObservationLog;
use eco_model::Frame;
use serde::Serialize;

use crate::scenario::ImpliedUnit;

/// What a replayed log leaves the model believing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Log format version.
    pub version: u32,
    /// Recorded sightings.
    pub observations: usize,
    /// Frame of the last recorded update.
    pub last_frame: Option<Frame>,
    /// Whether the model was running at the end.
    pub enabled: bool,
    /// Model state hash at the end.
    pub state_hash: u64,
    /// Units the model inferred.
    pub implied_units: Vec<ImpliedUnit>,
}

impl ReplaySummary {
    /// Replay a log into a fresh model and summarize the result.
    #[must_use]
    pub fn of(log: &ObservationLog) -> Self {
        let model = log.replay();
        Self {
            version: log.version,
            observations: log.observation_count(),
            last_frame: log.last_frame(),
            enabled: model.enabled(None),
            state_hash: model.state_hash(),
            implied_units: model
                .implied_units()
                .into_iter()
                .map(|(unit_type, frame)| ImpliedUnit { unit_type, frame })
                .collect(),
        }
    }
}

/// Load a recorded log from disk and replay it.
pub fn replay_file<P: AsRef<Path>>(path: P) -> Result<ReplaySummary> {
    let log = ObservationLog::load(path)?;
    Ok(ReplaySummary::of(&log))
}
