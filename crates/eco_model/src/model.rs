//! The opponent economic model.
//!
//! [`OpponentEconomicModel`] owns every piece of state for one opponent in
//! one match. The host feeds it sightings through the ingestion methods,
//! calls [`update`](OpponentEconomicModel::update) once per frame, and asks
//! it questions through the query methods.
//!
//! Ingestion only marks the model dirty; the next update rebuilds the whole
//! picture:
//! 1. simulate baseline income
//! 2. infer missing prerequisites from every observation
//! 3. debit every unit, research item and supply shortfall
//! 4. schedule production, implying producers where needed
//! 5. build the alternate gas timeline if no refinery is known
//!
//! Any error along the way disables the model for the rest of the match.
//! Callers are expected to check [`enabled`](OpponentEconomicModel::enabled)
//! before trusting query results.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{Disqualification, ModelError, Result};
use crate::income::IncomeSimulator;
use crate::ledger::{UnitId, UnitLedger};
use crate::observation_log::{LogEntry, ObservationLog};
use crate::prerequisites::{ensure_non_negative, Prerequisite, PrerequisiteWalker};
use crate::query::{GasHypothesis, QueryContext, QueryEngine, UnitCountBound};
use crate::resources::{ResourceLedger, ResourceTimeline};
use crate::scheduler::ProductionScheduler;
use crate::unit_type::{ResearchKind, UnitType, UpgradeOrTech};
use crate::view::{MatchSnapshot, MatchView};
use crate::Frame;

/// Refinery type placed by the alternate gas hypothesis.
const HYPOTHETICAL_REFINERY: UnitType = UnitType::Assimilator;

/// A sighting reported by the tracking subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observation {
    /// A unit or building was seen for the first time (or seen again).
    UnitCreated {
        /// Type of the unit.
        unit_type: UnitType,
        /// Tracking identity.
        id: UnitId,
        /// Creation frame, exact or estimated.
        creation_frame: Frame,
        /// Whether `creation_frame` is exact.
        creation_frame_known: bool,
    },
    /// A unit or building died.
    UnitDestroyed {
        /// Type of the unit.
        unit_type: UnitType,
        /// Tracking identity.
        id: UnitId,
        /// Frame it died, or the current frame if not given.
        frame: Option<Frame>,
    },
    /// Research was seen in progress or completed.
    Researched {
        /// What was researched.
        item: UpgradeOrTech,
        /// Frame it started, or inferred from the current frame if not given.
        start_frame: Option<Frame>,
    },
}

/// Model of one opponent's economy.
#[derive(Debug, Clone)]
pub struct OpponentEconomicModel {
    config: ModelConfig,
    enabled: bool,
    dirty: bool,
    current_frame: Frame,
    worker_limit: i32,
    latency_frames: Frame,
    geyser_last_scouted: Option<Frame>,
    ledger: UnitLedger,
    research: Vec<(UpgradeOrTech, Frame)>,
    resources: ResourceLedger,
    /// Alternate arrays and the hypothetical refinery's completion frame.
    alternate: Option<(ResourceTimeline, Frame)>,
    queries: QueryEngine,
    recorder: Option<ObservationLog>,
}

impl OpponentEconomicModel {
    /// Create a model. It stays disabled until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(config: ModelConfig) -> Self {
        let horizon = config.horizon_len();
        Self {
            config,
            enabled: false,
            dirty: false,
            current_frame: 0,
            worker_limit: 0,
            latency_frames: 0,
            geyser_last_scouted: None,
            ledger: UnitLedger::new(),
            research: Vec::new(),
            resources: ResourceLedger::new(ResourceTimeline::new(horizon)),
            alternate: None,
            queries: QueryEngine::new(),
            recorder: None,
        }
    }

    /// Record every following call into an [`ObservationLog`].
    #[must_use]
    pub fn with_recording(mut self) -> Self {
        self.recorder = Some(ObservationLog::new(self.config.clone()));
        self
    }

    /// The recording, if enabled.
    #[must_use]
    pub fn observation_log(&self) -> Option<&ObservationLog> {
        self.recorder.as_ref()
    }

    /// Stop recording and return what was recorded.
    pub fn take_observation_log(&mut self) -> Option<ObservationLog> {
        self.recorder.take()
    }

    fn record(&mut self, entry: LogEntry) {
        if let Some(log) = &mut self.recorder {
            log.record(entry);
        }
    }

    /// Model constants.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Frame of the last lifecycle call.
    #[must_use]
    pub const fn current_frame(&self) -> Frame {
        self.current_frame
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reset all state for a new match and decide whether to run at all.
    pub fn initialize<V: MatchView + ?Sized>(&mut self, view: &V) {
        self.record(LogEntry::Initialize(MatchSnapshot::capture(view)));

        self.current_frame = view.current_frame();
        self.worker_limit = view.worker_limit();
        self.latency_frames = view.latency_frames();
        self.geyser_last_scouted = view.opponent_geyser_last_scouted();
        self.ledger.clear();
        self.research.clear();
        self.resources = ResourceLedger::new(ResourceTimeline::new(self.config.horizon_len()));
        self.alternate = None;
        self.queries.clear();
        self.enabled = true;
        self.dirty = true;

        if let Err(err) = self.check_profile(view) {
            self.disable(&err);
        }
    }

    /// Advance to the view's current frame, recomputing if anything changed.
    pub fn update<V: MatchView + ?Sized>(&mut self, view: &V) {
        self.record(LogEntry::Update(MatchSnapshot::capture(view)));
        if !self.enabled {
            return;
        }

        self.current_frame = view.current_frame();
        let scouted = view.opponent_geyser_last_scouted();
        if scouted != self.geyser_last_scouted {
            self.geyser_last_scouted = scouted;
            self.dirty |= !self.ledger.has_refinery();
        }

        if let Err(err) = self.check_profile(view) {
            self.disable(&err);
            return;
        }

        if self.dirty {
            match self.recompute() {
                Ok(()) => self.dirty = false,
                Err(err) => self.disable(&err),
            }
        }
    }

    fn check_profile<V: MatchView + ?Sized>(&self, view: &V) -> Result<()> {
        let race = view.opponent_race();
        if !race.is_supported() {
            return Err(ModelError::Disqualified(Disqualification::UnsupportedRace(race)));
        }
        let bases = view.opponent_completed_main_bases();
        if bases > 1 {
            return Err(ModelError::Disqualified(Disqualification::MultipleBases(bases)));
        }
        let frame = view.current_frame();
        if frame >= self.config.disable_frame {
            return Err(ModelError::Disqualified(Disqualification::HorizonExhausted(frame)));
        }
        Ok(())
    }

    fn disable(&mut self, err: &ModelError) {
        if err.is_disqualification() {
            tracing::info!(frame = self.current_frame, "Opponent economic model disabled: {err}");
        } else {
            tracing::error!(
                frame = self.current_frame,
                "Opponent economic model contradiction, disabling: {err}"
            );
        }
        self.enabled = false;
    }

    // ========================================================================
    // Recomputation
    // ========================================================================

    fn recompute(&mut self) -> Result<()> {
        let horizon = self.config.horizon_len();
        let simulator = IncomeSimulator::new(&self.config, self.worker_limit, self.latency_frames);

        self.ledger.clear_implied();
        let observed_refineries = self.ledger.observed_refinery_completions();
        let mut baseline = ResourceTimeline::new(horizon);
        simulator.simulate(&observed_refineries, None, &mut baseline);

        let prerequisites = self.infer_prerequisites()?;
        for p in &prerequisites {
            self.ledger.add_implied(p.unit_type, p.start_frame);
        }

        if observed_refineries.is_empty() {
            let implied_refinery = prerequisites
                .iter()
                .filter(|p| p.unit_type.is_refinery())
                .map(|p| p.start_frame + p.unit_type.build_time())
                .min();
            if let Some(completion) = implied_refinery {
                simulator.simulate(&[], Some(completion), &mut baseline);
            }
        }

        let alternate_start = (!self.ledger.has_refinery()).then(|| {
            self.config
                .opening
                .standard_gas_frame
                .max(self.geyser_last_scouted.map_or(Frame::MIN, |f| f + 1))
        });
        let alternate_baseline = alternate_start.map(|start| {
            let mut timeline = ResourceTimeline::new(horizon);
            let completion = start + HYPOTHETICAL_REFINERY.build_time();
            simulator.simulate(&[], Some(completion), &mut timeline);
            timeline
        });

        let refund = self.config.cancel_refund_percent;
        self.resources = ResourceLedger::new(baseline);
        debit_spending(&self.ledger, &self.research, refund, self.resources.timeline_mut());
        let supply_buildings = self.resources.fill_supply_gaps(self.config.supply_scan_start)?;

        let implied_producers =
            ProductionScheduler::new(&self.config, &mut self.ledger, &mut self.resources).run()?;

        self.alternate = alternate_start.zip(alternate_baseline).map(|(start, mut timeline)| {
            debit_spending(&self.ledger, &self.research, refund, &mut timeline);
            for &pylon in self.resources.supply_buildings() {
                timeline.apply_supply_building(pylon);
            }
            timeline.debit(HYPOTHETICAL_REFINERY.cost(), start);
            (timeline, start + HYPOTHETICAL_REFINERY.build_time())
        });

        self.queries.clear();

        tracing::debug!(
            frame = self.current_frame,
            observed = self.ledger.observed().len(),
            implied = self.ledger.implied().len(),
            implied_producers,
            supply_buildings,
            alternate_gas = ?alternate_start,
            resources = ?self.resources.timeline().at(self.current_frame),
            "Recomputed opponent economy"
        );
        Ok(())
    }

    /// Prerequisites of every observation not explained by an observed building.
    fn infer_prerequisites(&self) -> Result<Vec<Prerequisite>> {
        let ledger = &self.ledger;
        let mut walker = PrerequisiteWalker::new(
            |b: UnitType| ledger.earliest_observed_completion(b),
            self.config.max_prerequisite_depth,
            self.config.opening.gas_worker_delay,
        );

        for &handle in ledger.observed() {
            let unit = ledger.get(handle);
            walker.require(unit.unit_type, unit.creation_frame)?;
        }
        for &(item, start) in &self.research {
            walker.require_building(item.what_researches(), start)?;
            if let Some(required) = item.whats_required() {
                walker.require_building(required, start)?;
            }
            if item.cost().gas > 0 {
                walker.require_gas(start)?;
            }
        }

        let prerequisites = walker.finish();
        ensure_non_negative(&prerequisites)?;
        Ok(prerequisites)
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Apply one sighting. Ignored while disabled.
    pub fn observe(&mut self, observation: Observation) {
        self.record(LogEntry::Observe(observation.clone()));
        if !self.enabled {
            return;
        }

        let changed = match observation {
            Observation::UnitCreated {
                unit_type,
                id,
                creation_frame,
                creation_frame_known,
            } => {
                if is_assumed(unit_type, creation_frame) {
                    return;
                }
                self.ledger
                    .record_created(unit_type, id, creation_frame, creation_frame_known)
            }
            Observation::UnitDestroyed {
                unit_type,
                id,
                frame,
            } => {
                if is_assumed(unit_type, Frame::MIN) && !self.ledger.contains(id) {
                    return;
                }
                let frame = frame.unwrap_or(self.current_frame);
                self.ledger.record_destroyed(unit_type, id, frame)
            }
            Observation::Researched { item, start_frame } => {
                let start = start_frame.unwrap_or(self.current_frame - item.research_time());
                self.record_research(item, start)
            }
        };
        self.dirty |= changed;
    }

    fn record_research(&mut self, item: UpgradeOrTech, start: Frame) -> bool {
        match self.research.iter_mut().find(|(known, _)| *known == item) {
            Some((_, known_start)) if start < *known_start => {
                *known_start = start;
                true
            }
            Some(_) => false,
            None => {
                self.research.push((item, start));
                true
            }
        }
    }

    /// A unit was seen.
    pub fn unit_created(
        &mut self,
        unit_type: UnitType,
        id: UnitId,
        creation_frame: Frame,
        creation_frame_known: bool,
    ) {
        self.observe(Observation::UnitCreated {
            unit_type,
            id,
            creation_frame,
            creation_frame_known,
        });
    }

    /// A unit died, at `frame` or now.
    pub fn unit_destroyed(&mut self, unit_type: UnitType, id: UnitId, frame: Option<Frame>) {
        self.observe(Observation::UnitDestroyed {
            unit_type,
            id,
            frame,
        });
    }

    /// A tech was seen researching or researched.
    pub fn researched(&mut self, tech: ResearchKind, start_frame: Option<Frame>) {
        self.observe(Observation::Researched {
            item: UpgradeOrTech::tech(tech),
            start_frame,
        });
    }

    /// An upgrade level was seen in progress.
    pub fn upgraded(&mut self, upgrade: ResearchKind, level: u8, start_frame: Frame) {
        self.observe(Observation::Researched {
            item: UpgradeOrTech::upgrade(upgrade, level),
            start_frame: Some(start_frame),
        });
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether the model is running and `frame` (default: now) is inside the horizon.
    #[must_use]
    pub fn enabled(&self, frame: Option<Frame>) -> bool {
        self.enabled && frame.unwrap_or(self.current_frame) < self.config.frame_horizon
    }

    /// Units of a type seen alive at `frame` (default: now), and the most
    /// there could be.
    pub fn worst_case_unit_count(&mut self, unit_type: UnitType, frame: Option<Frame>) -> UnitCountBound {
        if !self.enabled {
            tracing::warn!(?unit_type, "Worst-case count queried while disabled");
            return UnitCountBound::default();
        }
        let frame = frame.unwrap_or(self.current_frame);
        let ctx = query_context(&self.config, &self.ledger, &self.resources, self.alternate.as_ref());
        self.queries.worst_case_unit_count(&ctx, unit_type, frame)
    }

    /// Producers of a type the opponent must have.
    #[must_use]
    pub fn minimum_producer_count(&self, producer: UnitType) -> usize {
        if !self.enabled {
            tracing::warn!(?producer, "Producer count queried while disabled");
            return 0;
        }
        let ctx = query_context(&self.config, &self.ledger, &self.resources, self.alternate.as_ref());
        QueryEngine::minimum_producer_count(&ctx, producer)
    }

    /// Whether the opponent has built (or must have built) a type.
    #[must_use]
    pub fn has_built(&self, unit_type: UnitType) -> bool {
        if !self.enabled {
            tracing::warn!(?unit_type, "Has-built queried while disabled");
            return false;
        }
        let ctx = query_context(&self.config, &self.ledger, &self.resources, self.alternate.as_ref());
        QueryEngine::has_built(&ctx, unit_type)
    }

    /// Earliest frame the opponent could have started a unit of this type.
    pub fn earliest_unit_production_frame(&mut self, unit_type: UnitType) -> Frame {
        if !self.enabled {
            tracing::warn!(?unit_type, "Earliest production queried while disabled");
            return self.current_frame;
        }
        let ctx = query_context(&self.config, &self.ledger, &self.resources, self.alternate.as_ref());
        self.queries.earliest_production_frame(&ctx, unit_type)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Implied units as `(type, creation frame)`, in frame order.
    #[must_use]
    pub fn implied_units(&self) -> Vec<(UnitType, Frame)> {
        self.ledger
            .implied()
            .iter()
            .map(|h| self.ledger.get(*h))
            .map(|u| (u.unit_type, u.effective_creation_frame()))
            .collect()
    }

    /// Start frames of the supply buildings the model placed.
    #[must_use]
    pub fn supply_buildings(&self) -> &[Frame] {
        self.resources.supply_buildings()
    }

    /// Modelled `(minerals, gas, supply)` left at a frame.
    #[must_use]
    pub fn modelled_resources_at(&self, frame: Frame) -> Option<(i32, i32, i32)> {
        self.resources.timeline().at(frame)
    }

    /// The unit ledger.
    #[must_use]
    pub const fn ledger(&self) -> &UnitLedger {
        &self.ledger
    }

    /// Hash of the model's derived state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.enabled.hash(&mut hasher);
        self.current_frame.hash(&mut hasher);
        for unit in self.ledger.iter() {
            unit.hash(&mut hasher);
        }
        self.research.hash(&mut hasher);
        self.resources.supply_buildings().hash(&mut hasher);
        self.resources
            .timeline()
            .hash_frame(self.current_frame, &mut hasher);
        if let Some((timeline, completion)) = &self.alternate {
            completion.hash(&mut hasher);
            timeline.hash_frame(self.current_frame, &mut hasher);
        }
        hasher.finish()
    }
}

/// Types the model assumes rather than tracks: workers, supply buildings
/// and the starting resource depot.
fn is_assumed(unit_type: UnitType, creation_frame: Frame) -> bool {
    if unit_type.is_resource_depot() {
        return creation_frame <= 0;
    }
    unit_type.is_worker() || unit_type.supply_provided() > 0
}

/// Debit every unit and research item.
fn debit_spending(
    ledger: &UnitLedger,
    research: &[(UpgradeOrTech, Frame)],
    refund_percent: i32,
    timeline: &mut ResourceTimeline,
) {
    for unit in ledger.iter() {
        timeline.apply_unit(unit, refund_percent);
    }
    for &(item, start) in research {
        timeline.apply_research(item, start);
    }
}

fn query_context<'a>(
    config: &'a ModelConfig,
    ledger: &'a UnitLedger,
    resources: &'a ResourceLedger,
    alternate: Option<&'a (ResourceTimeline, Frame)>,
) -> QueryContext<'a> {
    QueryContext {
        config,
        ledger,
        primary: resources.timeline(),
        alternate: alternate.map(|(timeline, completion)| GasHypothesis {
            timeline,
            refinery_completion: *completion,
        }),
    }
}
