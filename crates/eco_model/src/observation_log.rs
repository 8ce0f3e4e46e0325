//! Recording and playback of everything fed to a model.
//!
//! A log stores the configuration and the ordered stream of lifecycle and
//! ingestion calls. Replaying it into a fresh model reproduces the original
//! model's state exactly, which is what determinism checks compare.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::model::{Observation, OpponentEconomicModel};
use crate::view::MatchSnapshot;

/// Observation log format version for compatibility.
pub const LOG_VERSION: u32 = 1;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEntry {
    /// `initialize` with the view at that moment.
    Initialize(MatchSnapshot),
    /// An ingestion call.
    Observe(Observation),
    /// `update` with the view at that moment.
    Update(MatchSnapshot),
}

/// Complete recorded session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationLog {
    /// Log format version.
    pub version: u32,
    /// Configuration the model ran with.
    pub config: ModelConfig,
    /// Calls in the order they were made.
    pub entries: Vec<LogEntry>,
}

impl ObservationLog {
    /// Start an empty log for a model using `config`.
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        Self {
            version: LOG_VERSION,
            config,
            entries: Vec::new(),
        }
    }

    /// Append a call.
    pub fn record(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Number of recorded observations, excluding lifecycle calls.
    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, LogEntry::Observe(_)))
            .count()
    }

    /// Frame of the last recorded update, if any.
    #[must_use]
    pub fn last_frame(&self) -> Option<crate::Frame> {
        self.entries.iter().rev().find_map(|e| match e {
            LogEntry::Initialize(view) | LogEntry::Update(view) => Some(view.frame),
            LogEntry::Observe(_) => None,
        })
    }

    /// Encode to bytes.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bytes, rejecting other format versions.
    ///
    /// # Errors
    /// Returns an error if deserialization fails or the version differs.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let log: Self = bincode::deserialize(bytes)?;
        if log.version != LOG_VERSION {
            return Err(ModelError::LogVersionMismatch {
                expected: LOG_VERSION,
                found: log.version,
            });
        }
        Ok(log)
    }

    /// Save the log to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes()?)?;
        Ok(())
    }

    /// Load a log from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or decoding fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Feed every recorded call into a fresh model.
    #[must_use]
    pub fn replay(&self) -> OpponentEconomicModel {
        let mut model = OpponentEconomicModel::new(self.config.clone());
        for entry in &self.entries {
            match entry {
                LogEntry::Initialize(view) => model.initialize(view),
                LogEntry::Observe(observation) => model.observe(observation.clone()),
                LogEntry::Update(view) => model.update(view),
            }
        }
        model
    }
}
