//! Error types for the opponent economic model.
//!
//! Recomputation stages return [`Result`] and propagate with `?`. The public
//! model API never surfaces these: any error reaching
//! [`OpponentEconomicModel::update`](crate::model::OpponentEconomicModel::update)
//! disables the model for the rest of the match.

use thiserror::Error;

use crate::unit_type::{Race, UnitType};
use crate::Frame;

/// Result type alias using [`ModelError`].
pub type Result<T> = std::result::Result<T, ModelError>;

/// Why the opponent fell outside the supported profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disqualification {
    /// Opponent plays a race the model does not cover.
    UnsupportedRace(Race),
    /// Opponent has more than one completed main base.
    MultipleBases(usize),
    /// The frame horizon is nearly exhausted.
    HorizonExhausted(Frame),
}

impl std::fmt::Display for Disqualification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedRace(race) => write!(f, "unsupported opponent race {race:?}"),
            Self::MultipleBases(count) => write!(f, "opponent has {count} completed bases"),
            Self::HorizonExhausted(frame) => write!(f, "frame horizon exhausted at {frame}"),
        }
    }
}

/// Top-level error type for all model failures.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Opponent no longer matches the supported profile.
    #[error("Model disqualified: {0}")]
    Disqualified(Disqualification),

    /// A prerequisite would have had to start before the match began.
    #[error("Prerequisite {unit_type:?} would need to have been started at frame {frame}")]
    NegativePrerequisiteFrame {
        /// Building type that could not have been built in time.
        unit_type: UnitType,
        /// The computed (negative) start frame.
        frame: Frame,
    },

    /// Prerequisite walk went deeper than the configured cap.
    #[error("Prerequisite chain for {unit_type:?} exceeds depth {depth}")]
    PrerequisiteDepthExceeded {
        /// Type whose chain was being walked.
        unit_type: UnitType,
        /// The configured depth cap.
        depth: usize,
    },

    /// A supply shortfall cannot be covered by any supply building.
    #[error("Supply shortfall at frame {frame} cannot be covered")]
    UncoverableSupplyGap {
        /// First frame with negative supply headroom.
        frame: Frame,
    },

    /// A synthesized unit would need a negative creation frame.
    #[error("Implied {unit_type:?} would need to have been started at frame {frame}")]
    NegativeImpliedFrame {
        /// Type of the synthesized unit.
        unit_type: UnitType,
        /// The computed (negative) creation frame.
        frame: Frame,
    },

    /// The scheduler needed more producers than the safety bound allows.
    #[error("Producer pool for {producer:?} exceeded the safety bound of {bound}")]
    ProducerBoundExceeded {
        /// Producer type whose pool overflowed.
        producer: UnitType,
        /// The configured bound.
        bound: usize,
    },

    /// Failed to parse a configuration file.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Observation log could not be encoded or decoded.
    #[error("Observation log serialization failed: {0}")]
    LogSerialization(#[from] bincode::Error),

    /// Observation log was written by an incompatible version.
    #[error("Observation log version mismatch: expected {expected}, got {found}")]
    LogVersionMismatch {
        /// Version this build understands.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Underlying IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    /// Whether this is an expected disqualification rather than a contradiction.
    #[must_use]
    pub const fn is_disqualification(&self) -> bool {
        matches!(self, Self::Disqualified(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disqualification_is_not_contradiction() {
        let err = ModelError::Disqualified(Disqualification::MultipleBases(2));
        assert!(err.is_disqualification());

        let err = ModelError::ProducerBoundExceeded {
            producer: UnitType::Gateway,
            bound: 12,
        };
        assert!(!err.is_disqualification());
    }

    #[test]
    fn test_error_messages_name_the_payload() {
        let err = ModelError::NegativePrerequisiteFrame {
            unit_type: UnitType::CyberneticsCore,
            frame: -120,
        };
        let message = err.to_string();
        assert!(message.contains("CyberneticsCore"));
        assert!(message.contains("-120"));
    }
}
