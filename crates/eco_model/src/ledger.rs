//! Unit ledger: observed and implied unit records.
//!
//! All records live in one arena and are addressed by [`UnitHandle`].
//! Every view (observed, implied, by type, by producer type) is a secondary
//! index of handles rebuilt from the arena, so a record is mutated in
//! exactly one place and the views cannot disagree.
//!
//! # Ordering
//!
//! Views are sorted by creation frame, then completion frame, then handle.
//! The scheduler's greedy assignment relies on this order.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::unit_type::{Cost, UnitType};
use crate::Frame;

/// Death frame of a unit that is alive or whose death is unknown.
pub const ALIVE: Frame = Frame::MAX;

/// Identity of an observed unit, as assigned by the tracking subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl UnitId {
    /// Create a new unit ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Stable index of a record in the ledger arena.
///
/// Handles stay valid until the next [`UnitLedger::clear_implied`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitHandle(u32);

impl UnitHandle {
    /// Arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which creation frame to sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrder {
    /// Nominal (observed or inferred) creation frame.
    Nominal,
    /// Creation frame after the scheduler pulled it earlier.
    Shifted,
}

/// One unit or building in the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EcoUnit {
    /// Type of the unit.
    pub unit_type: UnitType,
    /// Identity, present only for observed units.
    pub id: Option<UnitId>,
    /// Nominal creation frame.
    pub creation_frame: Frame,
    /// Nominal completion frame.
    pub completion_frame: Frame,
    /// Frame the unit died, or [`ALIVE`].
    pub death_frame: Frame,
    /// Whether `creation_frame` is exact rather than estimated.
    pub creation_frame_known: bool,

    // Scheduling state, reset at the start of every pass.
    /// Whether this producer has been bound to a consumer in the current pass.
    pub produced_this_pass: bool,
    /// Frame this producer can next start producing.
    pub next_available_frame: Frame,
    /// Earliest frame this unit's required buildings are complete.
    pub prerequisites_ready_frame: Frame,
    /// Working creation frame; may be pulled earlier than nominal.
    pub shifted_creation_frame: Frame,
}

impl EcoUnit {
    fn new(unit_type: UnitType, id: Option<UnitId>, creation_frame: Frame, known: bool) -> Self {
        let completion_frame = creation_frame + unit_type.build_time();
        Self {
            unit_type,
            id,
            creation_frame,
            completion_frame,
            death_frame: ALIVE,
            creation_frame_known: known,
            produced_this_pass: false,
            next_available_frame: completion_frame,
            prerequisites_ready_frame: 0,
            shifted_creation_frame: creation_frame,
        }
    }

    /// Whether this record was observed rather than implied.
    #[must_use]
    pub const fn is_observed(&self) -> bool {
        self.id.is_some()
    }

    /// Whether the unit existed at `frame` (from creation, until death).
    #[must_use]
    pub const fn is_alive_at(&self, frame: Frame) -> bool {
        self.creation_frame <= frame && frame < self.death_frame
    }

    /// Whether the unit finished before it died (always true while alive).
    #[must_use]
    pub const fn was_completed(&self) -> bool {
        self.completion_frame < self.death_frame
    }

    /// Whether the unit has not died.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.death_frame == ALIVE
    }

    /// Creation frame after scheduling.
    #[must_use]
    pub const fn effective_creation_frame(&self) -> Frame {
        self.shifted_creation_frame
    }

    /// Completion frame after scheduling.
    #[must_use]
    pub const fn effective_completion_frame(&self) -> Frame {
        self.shifted_creation_frame + self.unit_type.build_time()
    }

    /// Price of the unit.
    #[must_use]
    pub const fn cost(&self) -> Cost {
        self.unit_type.cost()
    }

    /// Reset scheduling state to the nominal frames.
    pub fn reset_transient(&mut self) {
        self.produced_this_pass = false;
        self.shifted_creation_frame = self.creation_frame;
        self.next_available_frame = self.completion_frame;
        self.prerequisites_ready_frame = 0;
    }

    fn set_creation_frame(&mut self, frame: Frame, known: bool) {
        self.creation_frame = frame;
        self.completion_frame = frame + self.unit_type.build_time();
        self.creation_frame_known = known;
        self.reset_transient();
    }

    fn order_key(&self, order: FrameOrder, handle: UnitHandle) -> (Frame, Frame, UnitHandle) {
        match order {
            FrameOrder::Nominal => (self.creation_frame, self.completion_frame, handle),
            FrameOrder::Shifted => (
                self.shifted_creation_frame,
                self.effective_completion_frame(),
                handle,
            ),
        }
    }
}

/// Arena of unit records plus its secondary indexes.
#[derive(Debug, Clone, Default)]
pub struct UnitLedger {
    units: Vec<EcoUnit>,
    observed: Vec<UnitHandle>,
    implied: Vec<UnitHandle>,
    by_id: HashMap<UnitId, UnitHandle>,
    by_type: BTreeMap<UnitType, Vec<UnitHandle>>,
    by_producer_type: BTreeMap<UnitType, Vec<UnitHandle>>,
    first_created: BTreeMap<UnitType, Frame>,
}

impl UnitLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Record a sighting of a newly created unit.
    ///
    /// A repeated identity updates the stored creation frame when the new
    /// report is exact, or when neither is exact and the new estimate is
    /// earlier. Returns whether anything changed.
    pub fn record_created(
        &mut self,
        unit_type: UnitType,
        id: UnitId,
        creation_frame: Frame,
        known: bool,
    ) -> bool {
        if let Some(&handle) = self.by_id.get(&id) {
            let unit = &mut self.units[handle.index()];
            let better = (known && (!unit.creation_frame_known || unit.creation_frame != creation_frame))
                || (!known && !unit.creation_frame_known && creation_frame < unit.creation_frame);
            if !better || unit.unit_type != unit_type {
                return false;
            }
            unit.set_creation_frame(creation_frame, known);
        } else {
            self.units
                .push(EcoUnit::new(unit_type, Some(id), creation_frame, known));
        }
        self.reindex();
        true
    }

    /// Record a death. Unknown identities get a synthetic record created one
    /// build time before they died.
    pub fn record_destroyed(&mut self, unit_type: UnitType, id: UnitId, frame: Frame) -> bool {
        if let Some(&handle) = self.by_id.get(&id) {
            let unit = &mut self.units[handle.index()];
            if unit.death_frame == frame {
                return false;
            }
            unit.death_frame = frame;
        } else {
            tracing::debug!(?unit_type, id = id.0, frame, "Non-observed unit died");
            let mut unit = EcoUnit::new(unit_type, Some(id), frame - unit_type.build_time(), false);
            unit.death_frame = frame;
            self.units.push(unit);
        }
        self.reindex();
        true
    }

    /// Drop every implied record and reset scheduling state on the rest.
    ///
    /// Invalidates all handles.
    pub fn clear_implied(&mut self) {
        self.units.retain(EcoUnit::is_observed);
        for unit in &mut self.units {
            unit.reset_transient();
        }
        self.reindex();
    }

    /// Add an implied record.
    pub fn add_implied(&mut self, unit_type: UnitType, creation_frame: Frame) -> UnitHandle {
        let handle = UnitHandle(self.units.len() as u32);
        self.units
            .push(EcoUnit::new(unit_type, None, creation_frame, false));
        self.reindex();
        handle
    }

    fn reindex(&mut self) {
        self.observed.clear();
        self.implied.clear();
        self.by_id.clear();
        self.by_type.clear();
        self.by_producer_type.clear();
        self.first_created.clear();

        for (index, unit) in self.units.iter().enumerate() {
            let handle = UnitHandle(index as u32);
            match unit.id {
                Some(id) => {
                    self.observed.push(handle);
                    self.by_id.insert(id, handle);
                    self.first_created
                        .entry(unit.unit_type)
                        .and_modify(|f| *f = (*f).min(unit.creation_frame))
                        .or_insert(unit.creation_frame);
                }
                None => self.implied.push(handle),
            }
            self.by_type.entry(unit.unit_type).or_default().push(handle);
            if !unit.unit_type.is_building() {
                self.by_producer_type
                    .entry(unit.unit_type.what_builds())
                    .or_default()
                    .push(handle);
            }
        }

        let units = &self.units;
        let key = |h: &UnitHandle| units[h.index()].order_key(FrameOrder::Nominal, *h);
        self.observed.sort_by_key(key);
        self.implied.sort_by_key(key);
        for handles in self.by_type.values_mut() {
            handles.sort_by_key(key);
        }
        for handles in self.by_producer_type.values_mut() {
            handles.sort_by_key(key);
        }
    }

    /// Sort handles by the given frame order.
    pub fn sort_handles(&self, handles: &mut [UnitHandle], order: FrameOrder) {
        handles.sort_by_key(|h| self.units[h.index()].order_key(order, *h));
    }

    /// Whether a unit with this identity has been recorded.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Record behind a handle.
    #[must_use]
    pub fn get(&self, handle: UnitHandle) -> &EcoUnit {
        &self.units[handle.index()]
    }

    /// Mutable record behind a handle.
    pub fn get_mut(&mut self, handle: UnitHandle) -> &mut EcoUnit {
        &mut self.units[handle.index()]
    }

    /// Every record, observed and implied, in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &EcoUnit> {
        self.units.iter()
    }

    /// Observed records, in frame order.
    #[must_use]
    pub fn observed(&self) -> &[UnitHandle] {
        &self.observed
    }

    /// Implied records, in frame order.
    #[must_use]
    pub fn implied(&self) -> &[UnitHandle] {
        &self.implied
    }

    /// Records of one type, in frame order.
    #[must_use]
    pub fn of_type(&self, unit_type: UnitType) -> &[UnitHandle] {
        self.by_type.get(&unit_type).map_or(&[], Vec::as_slice)
    }

    /// Non-building records produced by `producer`, in frame order.
    #[must_use]
    pub fn consumers_of(&self, producer: UnitType) -> &[UnitHandle] {
        self.by_producer_type
            .get(&producer)
            .map_or(&[], Vec::as_slice)
    }

    /// Earliest observed creation frame per type.
    #[must_use]
    pub fn first_created(&self) -> &BTreeMap<UnitType, Frame> {
        &self.first_created
    }

    /// Earliest completion frame among observed records of a type that
    /// actually finished. A building cancelled or killed while under
    /// construction never counts.
    #[must_use]
    pub fn earliest_observed_completion(&self, unit_type: UnitType) -> Option<Frame> {
        self.of_type(unit_type)
            .iter()
            .map(|h| self.get(*h))
            .filter(|u| u.is_observed() && u.was_completed())
            .map(|u| u.completion_frame)
            .min()
    }

    /// Earliest scheduled completion among any records of a type.
    #[must_use]
    pub fn earliest_completion(&self, unit_type: UnitType) -> Option<Frame> {
        self.of_type(unit_type)
            .iter()
            .map(|h| self.get(*h).effective_completion_frame())
            .min()
    }

    /// Earliest scheduled completion among records of a type that are still alive.
    #[must_use]
    pub fn earliest_alive_completion(&self, unit_type: UnitType) -> Option<Frame> {
        self.of_type(unit_type)
            .iter()
            .map(|h| self.get(*h))
            .filter(|u| u.is_alive())
            .map(EcoUnit::effective_completion_frame)
            .min()
    }

    /// Frame by which every building `unit_type` requires is complete.
    ///
    /// Missing requirements are ignored; resource depots are assumed present.
    #[must_use]
    pub fn requirements_ready_frame(&self, unit_type: UnitType) -> Frame {
        unit_type
            .required_buildings()
            .iter()
            .filter(|r| !r.is_resource_depot())
            .filter_map(|r| self.earliest_completion(*r))
            .fold(0, Frame::max)
    }

    /// Completion frames of observed refineries, ascending.
    #[must_use]
    pub fn observed_refinery_completions(&self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = self
            .observed
            .iter()
            .map(|h| self.get(*h))
            .filter(|u| u.unit_type.is_refinery())
            .map(|u| u.completion_frame)
            .collect();
        frames.sort_unstable();
        frames
    }

    /// Whether any refinery record exists, observed or implied.
    #[must_use]
    pub fn has_refinery(&self) -> bool {
        UnitType::ALL
            .iter()
            .filter(|t| t.is_refinery())
            .any(|t| !self.of_type(*t).is_empty())
    }

    /// Observed units of a type alive at `frame`.
    #[must_use]
    pub fn observed_alive_count(&self, unit_type: UnitType, frame: Frame) -> usize {
        self.of_type(unit_type)
            .iter()
            .map(|h| self.get(*h))
            .filter(|u| u.is_observed() && u.is_alive_at(frame))
            .count()
    }

    /// Records of a type that have not died, observed or implied.
    #[must_use]
    pub fn alive_count(&self, unit_type: UnitType) -> usize {
        self.of_type(unit_type)
            .iter()
            .filter(|h| self.get(**h).is_alive())
            .count()
    }

    /// Total records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the ledger holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(units: &[(UnitType, u32, Frame)]) -> UnitLedger {
        let mut ledger = UnitLedger::new();
        for &(unit_type, id, frame) in units {
            ledger.record_created(unit_type, UnitId(id), frame, false);
        }
        ledger
    }

    #[test]
    fn test_views_share_one_record() {
        let mut ledger = ledger_with(&[(UnitType::Zealot, 1, 2000)]);
        let handle = ledger.observed()[0];

        ledger.get_mut(handle).shifted_creation_frame = 1500;

        let via_type = ledger.of_type(UnitType::Zealot)[0];
        let via_producer = ledger.consumers_of(UnitType::Gateway)[0];
        assert_eq!(ledger.get(via_type).shifted_creation_frame, 1500);
        assert_eq!(ledger.get(via_producer).shifted_creation_frame, 1500);
    }

    #[test]
    fn test_ordering_tie_breaks() {
        let ledger = ledger_with(&[
            (UnitType::Dragoon, 1, 3000),
            (UnitType::Zealot, 2, 3000),
            (UnitType::Zealot, 3, 2500),
        ]);
        let order: Vec<UnitType> = ledger
            .observed()
            .iter()
            .map(|h| ledger.get(*h).unit_type)
            .collect();
        // Zealots complete before dragoons created on the same frame
        assert_eq!(
            order,
            vec![UnitType::Zealot, UnitType::Zealot, UnitType::Dragoon]
        );
    }

    #[test]
    fn test_repeated_sighting_keeps_best_estimate() {
        let mut ledger = ledger_with(&[(UnitType::Zealot, 1, 3000)]);

        assert!(ledger.record_created(UnitType::Zealot, UnitId(1), 2900, false));
        assert!(!ledger.record_created(UnitType::Zealot, UnitId(1), 3100, false));
        assert!(ledger.record_created(UnitType::Zealot, UnitId(1), 3050, true));
        assert!(!ledger.record_created(UnitType::Zealot, UnitId(1), 2000, false));

        let unit = ledger.get(ledger.observed()[0]);
        assert_eq!(unit.creation_frame, 3050);
        assert!(unit.creation_frame_known);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_death_window() {
        let mut ledger = ledger_with(&[(UnitType::Gateway, 1, 1800)]);
        ledger.record_destroyed(UnitType::Gateway, UnitId(1), 2000);

        assert_eq!(ledger.observed_alive_count(UnitType::Gateway, 1799), 0);
        assert_eq!(ledger.observed_alive_count(UnitType::Gateway, 1800), 1);
        assert_eq!(ledger.observed_alive_count(UnitType::Gateway, 1999), 1);
        assert_eq!(ledger.observed_alive_count(UnitType::Gateway, 2000), 0);
        assert_eq!(ledger.alive_count(UnitType::Gateway), 0);
    }

    #[test]
    fn test_cancelled_building_never_completes() {
        let mut ledger = ledger_with(&[
            (UnitType::CyberneticsCore, 1, 3000),
            (UnitType::Gateway, 2, 1700),
        ]);
        ledger.record_destroyed(UnitType::CyberneticsCore, UnitId(1), 3100);
        let gateway_done = 1700 + UnitType::Gateway.build_time();
        ledger.record_destroyed(UnitType::Gateway, UnitId(2), gateway_done + 500);

        assert_eq!(ledger.earliest_observed_completion(UnitType::CyberneticsCore), None);
        // Killed after finishing still counts
        assert_eq!(
            ledger.earliest_observed_completion(UnitType::Gateway),
            Some(gateway_done)
        );
    }

    #[test]
    fn test_unseen_death_is_synthesized() {
        let mut ledger = UnitLedger::new();
        ledger.record_destroyed(UnitType::Zealot, UnitId(9), 5000);

        let unit = ledger.get(ledger.observed()[0]);
        assert_eq!(unit.creation_frame, 4400);
        assert_eq!(unit.death_frame, 5000);
        assert_eq!(ledger.first_created()[&UnitType::Zealot], 4400);
    }

    #[test]
    fn test_clear_implied_keeps_observed() {
        let mut ledger = ledger_with(&[(UnitType::Zealot, 1, 2700)]);
        ledger.add_implied(UnitType::Gateway, 1700);
        ledger.record_created(UnitType::Zealot, UnitId(2), 3300, false);
        assert_eq!(ledger.implied().len(), 1);
        assert_eq!(ledger.alive_count(UnitType::Gateway), 1);

        ledger.clear_implied();

        assert!(ledger.implied().is_empty());
        assert_eq!(ledger.observed().len(), 2);
        assert!(ledger.of_type(UnitType::Gateway).is_empty());
        assert_eq!(ledger.consumers_of(UnitType::Gateway).len(), 2);
    }

    #[test]
    fn test_requirements_ready_frame() {
        let mut ledger = ledger_with(&[(UnitType::CyberneticsCore, 1, 3000)]);
        ledger.add_implied(UnitType::CyberneticsCore, 2800);

        let ready = ledger.requirements_ready_frame(UnitType::Dragoon);
        assert_eq!(ready, 2800 + UnitType::CyberneticsCore.build_time());
        assert_eq!(ledger.requirements_ready_frame(UnitType::Zealot), 0);
    }
}
