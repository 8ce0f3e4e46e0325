//! Per-frame resource arrays and the spend/refund protocol.
//!
//! A [`ResourceTimeline`] holds, for every frame of the horizon, the
//! minerals, gas and supply headroom the opponent would have left after
//! every spend the model knows about. Every mutation is a constant offset
//! applied from some frame to the end of the horizon, so a refund is
//! simply the same offset negated.
//!
//! [`ResourceLedger`] adds the ordered list of supply buildings and the
//! snapshot/restore used by the scheduler to back out of dead ends.

use std::hash::{Hash, Hasher};

use crate::error::{ModelError, Result};
use crate::ledger::EcoUnit;
use crate::unit_type::{Cost, UnitType, UpgradeOrTech};
use crate::Frame;

/// Building type inserted to cover supply shortfalls.
pub const SUPPLY_BUILDING: UnitType = UnitType::Pylon;

/// Minerals, gas and supply headroom for every frame of the horizon.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceTimeline {
    minerals: Vec<i32>,
    gas: Vec<i32>,
    supply: Vec<i32>,
}

impl ResourceTimeline {
    /// Zeroed timeline spanning `horizon` frames.
    #[must_use]
    pub fn new(horizon: usize) -> Self {
        Self {
            minerals: vec![0; horizon],
            gas: vec![0; horizon],
            supply: vec![0; horizon],
        }
    }

    /// Number of frames covered.
    #[must_use]
    pub fn horizon(&self) -> Frame {
        self.minerals.len() as Frame
    }

    /// Mineral array.
    #[must_use]
    pub fn minerals(&self) -> &[i32] {
        &self.minerals
    }

    /// Gas array.
    #[must_use]
    pub fn gas(&self) -> &[i32] {
        &self.gas
    }

    /// Supply headroom array.
    #[must_use]
    pub fn supply(&self) -> &[i32] {
        &self.supply
    }

    /// `(minerals, gas, supply)` at a frame, if inside the horizon.
    #[must_use]
    pub fn at(&self, frame: Frame) -> Option<(i32, i32, i32)> {
        let i = usize::try_from(frame).ok()?;
        Some((*self.minerals.get(i)?, self.gas[i], self.supply[i]))
    }

    pub(crate) fn set(&mut self, frame: usize, minerals: i32, gas: i32, supply: i32) {
        self.minerals[frame] = minerals;
        self.gas[frame] = gas;
        self.supply[frame] = supply;
    }

    /// Subtract `cost` from every frame at or after `from`.
    ///
    /// Frames before zero are clamped; frames past the horizon are a no-op.
    pub fn debit(&mut self, cost: Cost, from: Frame) {
        let start = from.max(0) as usize;
        if start >= self.minerals.len() {
            return;
        }
        for (resource, amount) in [
            (&mut self.minerals, cost.minerals),
            (&mut self.gas, cost.gas),
            (&mut self.supply, cost.supply),
        ] {
            if amount != 0 {
                for value in &mut resource[start..] {
                    *value -= amount;
                }
            }
        }
    }

    /// Add `cost` back to every frame at or after `from`.
    pub fn credit(&mut self, cost: Cost, from: Frame) {
        self.debit(cost.negated(), from);
    }

    /// Move a debit of `cost` from one frame to another.
    pub fn move_debit(&mut self, cost: Cost, from: Frame, to: Frame) {
        if from != to {
            self.credit(cost, from);
            self.debit(cost, to);
        }
    }

    /// Whether `cost` could be paid at `frame` without going negative there.
    #[must_use]
    pub fn affords_at(&self, frame: usize, cost: Cost) -> bool {
        self.minerals[frame] >= cost.minerals
            && self.gas[frame] >= cost.gas
            && self.supply[frame] >= cost.supply
    }

    /// Earliest frame `>= lower` from which `cost` can be paid without any
    /// later frame going negative.
    ///
    /// Scans backwards from the end of the horizon. Returns `None` if even
    /// the last frame cannot afford it.
    #[must_use]
    pub fn earliest_affordable(&self, cost: Cost, lower: Frame) -> Option<Frame> {
        let horizon = self.horizon();
        let lower = lower.max(0);
        if lower >= horizon {
            return None;
        }
        let mut f = horizon - 1;
        while f >= lower {
            if !self.affords_at(f as usize, cost) {
                break;
            }
            f -= 1;
        }
        let earliest = f + 1;
        (earliest < horizon).then_some(earliest)
    }

    /// Debit a unit at its scheduled creation frame and apply what its death
    /// gives back: supply, plus a partial refund for unfinished buildings.
    pub fn apply_unit(&mut self, unit: &EcoUnit, refund_percent: i32) {
        let cost = unit.cost();
        let created = unit.effective_creation_frame();
        let completed = unit.effective_completion_frame();
        self.debit(cost, created);

        let provided = Cost::new(0, 0, -unit.unit_type.supply_provided());
        if provided.supply != 0 && completed < unit.death_frame {
            self.debit(provided, completed);
        }

        if unit.death_frame < self.horizon() {
            self.credit(Cost::new(0, 0, cost.supply), unit.death_frame);
            if provided.supply != 0 && completed < unit.death_frame {
                self.credit(provided, unit.death_frame);
            }
            if unit.unit_type.is_building() && completed > unit.death_frame {
                self.credit(cost.resources_percent(refund_percent), unit.death_frame);
            }
        }
    }

    /// Debit a research item at its start frame.
    pub fn apply_research(&mut self, item: UpgradeOrTech, start: Frame) {
        self.debit(item.cost(), start);
    }

    /// Debit a supply building started at `start` and credit its supply on completion.
    pub fn apply_supply_building(&mut self, start: Frame) {
        self.debit(SUPPLY_BUILDING.cost(), start);
        self.credit(
            Cost::new(0, 0, SUPPLY_BUILDING.supply_provided()),
            start + SUPPLY_BUILDING.build_time(),
        );
    }

    /// Exact inverse of [`apply_supply_building`](Self::apply_supply_building).
    pub fn remove_supply_building(&mut self, start: Frame) {
        self.credit(SUPPLY_BUILDING.cost(), start);
        self.debit(
            Cost::new(0, 0, SUPPLY_BUILDING.supply_provided()),
            start + SUPPLY_BUILDING.build_time(),
        );
    }

    /// Hash the values at one frame.
    pub fn hash_frame<H: Hasher>(&self, frame: Frame, state: &mut H) {
        self.at(frame).hash(state);
    }
}

/// Saved resource state to restore after a failed scheduling attempt.
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    timeline: ResourceTimeline,
    supply_buildings: Vec<Frame>,
}

/// Canonical resource timeline plus the supply buildings placed into it.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    timeline: ResourceTimeline,
    supply_buildings: Vec<Frame>,
}

impl ResourceLedger {
    /// Wrap a baseline timeline.
    #[must_use]
    pub fn new(timeline: ResourceTimeline) -> Self {
        Self {
            timeline,
            supply_buildings: Vec::new(),
        }
    }

    /// The timeline.
    #[must_use]
    pub fn timeline(&self) -> &ResourceTimeline {
        &self.timeline
    }

    /// The timeline, mutably.
    pub fn timeline_mut(&mut self) -> &mut ResourceTimeline {
        &mut self.timeline
    }

    /// Start frames of supply buildings the model has placed, ascending.
    #[must_use]
    pub fn supply_buildings(&self) -> &[Frame] {
        &self.supply_buildings
    }

    /// Save the current state.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            timeline: self.timeline.clone(),
            supply_buildings: self.supply_buildings.clone(),
        }
    }

    /// Return to a saved state.
    pub fn restore(&mut self, snapshot: &LedgerSnapshot) {
        self.timeline.clone_from(&snapshot.timeline);
        self.supply_buildings.clone_from(&snapshot.supply_buildings);
    }

    /// Place a supply building starting at `start`.
    pub fn add_supply_building(&mut self, start: Frame) {
        self.timeline.apply_supply_building(start);
        let index = self.supply_buildings.partition_point(|f| *f <= start);
        self.supply_buildings.insert(index, start);
    }

    /// Move the supply building at `index` to start at `new_start`.
    pub fn move_supply_building(&mut self, index: usize, new_start: Frame) {
        let old_start = self.supply_buildings.remove(index);
        self.timeline.remove_supply_building(old_start);
        self.add_supply_building(new_start);
    }

    /// Insert supply buildings wherever supply headroom goes negative.
    ///
    /// Each one is started exactly one build time before the shortfall so
    /// it completes as the shortfall begins. Returns how many were placed.
    pub fn fill_supply_gaps(&mut self, scan_start: Frame) -> Result<usize> {
        let build_time = SUPPLY_BUILDING.build_time();
        let mut placed = 0;
        for f in scan_start.max(0)..self.timeline.horizon() {
            while self.timeline.supply[f as usize] < 0 {
                let start = f - build_time;
                if start < 0 {
                    return Err(ModelError::UncoverableSupplyGap { frame: f });
                }
                self.add_supply_building(start);
                placed += 1;
            }
        }
        Ok(placed)
    }
}
