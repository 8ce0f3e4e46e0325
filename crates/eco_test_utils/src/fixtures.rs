//! Test fixtures and helpers.
//!
//! A [`ScriptedView`] stands in for the host's map and tracking
//! subsystems, and the canned sequences reproduce known opponent openings.

use eco_model::prelude::*;

/// An observation delivered to the model at `report_frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedObservation {
    /// Frame the sighting is reported.
    pub report_frame: Frame,
    /// The sighting.
    pub observation: Observation,
}

impl ScriptedObservation {
    /// A unit seen at `report_frame`.
    #[must_use]
    pub const fn created(
        report_frame: Frame,
        unit_type: UnitType,
        id: u32,
        creation_frame: Frame,
        known: bool,
    ) -> Self {
        Self {
            report_frame,
            observation: Observation::UnitCreated {
                unit_type,
                id: UnitId(id),
                creation_frame,
                creation_frame_known: known,
            },
        }
    }

    /// A unit seen dying at `report_frame`.
    #[must_use]
    pub const fn destroyed(report_frame: Frame, unit_type: UnitType, id: u32) -> Self {
        Self {
            report_frame,
            observation: Observation::UnitDestroyed {
                unit_type,
                id: UnitId(id),
                frame: Some(report_frame),
            },
        }
    }
}

/// A match view whose frame and opponent profile are driven by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedView {
    snapshot: MatchSnapshot,
}

impl ScriptedView {
    /// A one-base Protoss opponent at frame 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit snapshot.
    #[must_use]
    pub const fn from_snapshot(snapshot: MatchSnapshot) -> Self {
        Self { snapshot }
    }

    /// Move to a frame.
    pub fn set_frame(&mut self, frame: Frame) {
        self.snapshot.frame = frame;
    }

    /// Reveal (or change) the opponent's race.
    pub fn set_race(&mut self, race: Race) {
        self.snapshot.race = race;
    }

    /// Set how many completed main bases the opponent owns.
    pub fn set_completed_main_bases(&mut self, bases: usize) {
        self.snapshot.completed_main_bases = bases;
    }

    /// Record the opponent's geyser as seen empty now.
    pub fn scout_empty_geyser(&mut self) {
        self.snapshot.geyser_last_scouted = Some(self.snapshot.frame);
    }

    /// The current snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &MatchSnapshot {
        &self.snapshot
    }
}

impl MatchView for ScriptedView {
    fn current_frame(&self) -> Frame {
        self.snapshot.current_frame()
    }

    fn opponent_race(&self) -> Race {
        self.snapshot.opponent_race()
    }

    fn opponent_completed_main_bases(&self) -> usize {
        self.snapshot.opponent_completed_main_bases()
    }

    fn main_mineral_patches(&self) -> u32 {
        self.snapshot.main_mineral_patches()
    }

    fn main_geysers(&self) -> u32 {
        self.snapshot.main_geysers()
    }

    fn latency_frames(&self) -> Frame {
        self.snapshot.latency_frames()
    }

    fn opponent_geyser_last_scouted(&self) -> Option<Frame> {
        self.snapshot.opponent_geyser_last_scouted()
    }
}

/// A model initialized against a fresh [`ScriptedView`].
#[must_use]
pub fn started_model() -> (OpponentEconomicModel, ScriptedView) {
    let view = ScriptedView::new();
    let mut model = OpponentEconomicModel::new(ModelConfig::default());
    model.initialize(&view);
    (model, view)
}

/// Drive the model frame by frame up to `until`, delivering each scripted
/// observation just before the update of its report frame.
///
/// Observations must be sorted by report frame.
pub fn play(
    model: &mut OpponentEconomicModel,
    view: &mut ScriptedView,
    script: &[ScriptedObservation],
    until: Frame,
) {
    let mut pending = script.iter().peekable();
    for frame in view.current_frame()..=until {
        view.set_frame(frame);
        while let Some(next) = pending.next_if(|s| s.report_frame <= frame) {
            model.observe(next.observation.clone());
        }
        model.update(&*view);
    }
    tracing::debug!(until, enabled = model.enabled(None), "Scripted play finished");
}

/// Gateway opening into a tech path towards dark templar.
#[must_use]
pub fn dark_templar_opening() -> Vec<ScriptedObservation> {
    vec![
        ScriptedObservation::created(1900, UnitType::Gateway, 1, 1800, true),
        ScriptedObservation::created(2400, UnitType::Assimilator, 2, 2300, false),
        ScriptedObservation::created(3400, UnitType::Zealot, 3, 2775, false),
        ScriptedObservation::created(3500, UnitType::CyberneticsCore, 4, 3450, false),
        ScriptedObservation::created(4300, UnitType::Zealot, 5, 3625, false),
    ]
}

/// Two zealots created closer together than one gateway can manage.
#[must_use]
pub fn double_gateway_zealots() -> Vec<ScriptedObservation> {
    vec![
        ScriptedObservation::created(1800, UnitType::Gateway, 1, 1684, true),
        ScriptedObservation::created(2900, UnitType::Zealot, 2, 2700, true),
        ScriptedObservation::created(2900, UnitType::Zealot, 3, 2800, true),
    ]
}

/// A dragoon seen with none of its tech, forcing a chain of implied buildings.
#[must_use]
pub fn lone_dragoon() -> Vec<ScriptedObservation> {
    vec![ScriptedObservation::created(
        5600,
        UnitType::Dragoon,
        1,
        5200,
        false,
    )]
}
