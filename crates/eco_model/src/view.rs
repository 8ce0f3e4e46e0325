//! Read-only view of the match supplied by the host.
//!
//! The map, base-geometry and tracking subsystems live outside this crate.
//! The model only sees them through [`MatchView`], passed by reference to
//! every lifecycle call.

use serde::{Deserialize, Serialize};

use crate::unit_type::Race;
use crate::Frame;

/// What the model needs to know about the running match.
pub trait MatchView {
    /// The current simulation frame.
    fn current_frame(&self) -> Frame;

    /// The opponent's race, as far as it is known.
    fn opponent_race(&self) -> Race;

    /// Number of completed main bases the opponent is known to own.
    fn opponent_completed_main_bases(&self) -> usize;

    /// Mineral patches at a main base.
    fn main_mineral_patches(&self) -> u32;

    /// Geysers at a main base.
    fn main_geysers(&self) -> u32;

    /// Command latency; delays the opponent's first worker.
    fn latency_frames(&self) -> Frame {
        0
    }

    /// Last frame the opponent's main geyser was seen without a refinery.
    fn opponent_geyser_last_scouted(&self) -> Option<Frame> {
        None
    }

    /// Worker count at which the opponent stops building workers.
    fn worker_limit(&self) -> i32 {
        (self.main_mineral_patches() * 2 + self.main_geysers() * 3) as i32
    }
}

/// Everything a [`MatchView`] reports, captured at one frame.
///
/// Used to record and replay observation logs, and as a plain view in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Frame the snapshot was taken.
    pub frame: Frame,
    /// Opponent race.
    pub race: Race,
    /// Completed main bases the opponent owns.
    pub completed_main_bases: usize,
    /// Mineral patches at a main base.
    pub mineral_patches: u32,
    /// Geysers at a main base.
    pub geysers: u32,
    /// Command latency.
    pub latency_frames: Frame,
    /// Last frame the opponent's main geyser was seen empty.
    pub geyser_last_scouted: Option<Frame>,
}

impl MatchSnapshot {
    /// Capture the current state of a view.
    #[must_use]
    pub fn capture<V: MatchView + ?Sized>(view: &V) -> Self {
        Self {
            frame: view.current_frame(),
            race: view.opponent_race(),
            completed_main_bases: view.opponent_completed_main_bases(),
            mineral_patches: view.main_mineral_patches(),
            geysers: view.main_geysers(),
            latency_frames: view.latency_frames(),
            geyser_last_scouted: view.opponent_geyser_last_scouted(),
        }
    }
}

impl Default for MatchSnapshot {
    /// A one-base Protoss opponent on a standard main at frame 0.
    fn default() -> Self {
        Self {
            frame: 0,
            race: Race::Protoss,
            completed_main_bases: 1,
            mineral_patches: 9,
            geysers: 1,
            latency_frames: 0,
            geyser_last_scouted: None,
        }
    }
}

impl MatchView for MatchSnapshot {
    fn current_frame(&self) -> Frame {
        self.frame
    }

    fn opponent_race(&self) -> Race {
        self.race
    }

    fn opponent_completed_main_bases(&self) -> usize {
        self.completed_main_bases
    }

    fn main_mineral_patches(&self) -> u32 {
        self.mineral_patches
    }

    fn main_geysers(&self) -> u32 {
        self.geysers
    }

    fn latency_frames(&self) -> Frame {
        self.latency_frames
    }

    fn opponent_geyser_last_scouted(&self) -> Option<Frame> {
        self.geyser_last_scouted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_limit() {
        let view = MatchSnapshot::default();
        assert_eq!(view.worker_limit(), 21);
    }

    #[test]
    fn test_capture_round_trips_view() {
        let view = MatchSnapshot {
            frame: 4200,
            race: Race::Unknown,
            geyser_last_scouted: Some(3000),
            ..MatchSnapshot::default()
        };
        assert_eq!(MatchSnapshot::capture(&view), view);
    }
}
