//! Backward prerequisite inference over the tech graph.
//!
//! Given something that must exist by some frame, walk its required
//! buildings (and, for units, the building that produces them) and collect
//! every building not already known, with the latest frame it must have
//! been started to be ready in time.
//!
//! Anything with a gas cost additionally needs a refinery finished early
//! enough for gas workers to have arrived.

use crate::error::{ModelError, Result};
use crate::unit_type::UnitType;
use crate::Frame;

/// Refinery type implied by gas spending.
const REFINERY: UnitType = UnitType::Assimilator;

/// A building that must have been started by `start_frame`.
///
/// Field order gives the sort order: earliest start first, then type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prerequisite {
    /// Latest frame the building could have been started.
    pub start_frame: Frame,
    /// Building type.
    pub unit_type: UnitType,
}

/// Collects missing prerequisites for any number of needs.
///
/// `known` answers "when is the first building of this type complete",
/// or `None` if there is none.
pub struct PrerequisiteWalker<K> {
    known: K,
    max_depth: usize,
    gas_lead: Frame,
    found: Vec<Prerequisite>,
}

impl<K> PrerequisiteWalker<K>
where
    K: Fn(UnitType) -> Option<Frame>,
{
    /// Create a walker.
    ///
    /// `gas_lead` is how long before a gas-costing start its refinery must
    /// already be complete.
    pub fn new(known: K, max_depth: usize, gas_lead: Frame) -> Self {
        Self {
            known,
            max_depth,
            gas_lead,
            found: Vec::new(),
        }
    }

    /// Require whatever is needed to start `unit_type` at `frame`.
    ///
    /// Returns the earliest frame at which all of it could be ready,
    /// given the buildings already known.
    pub fn require(&mut self, unit_type: UnitType, frame: Frame) -> Result<Frame> {
        self.walk(unit_type, frame, 0)
    }

    /// Require a building itself to be complete by `frame`.
    pub fn require_building(&mut self, building: UnitType, frame: Frame) -> Result<Frame> {
        self.add(building, frame, 0)
    }

    /// Require a refinery with workers already mining from it by `frame`.
    pub fn require_gas(&mut self, frame: Frame) -> Result<Frame> {
        self.add(REFINERY, frame - self.gas_lead, 0)
    }

    /// Finish, returning the prerequisites sorted by start frame with one
    /// entry per type (the earliest need wins).
    pub fn finish(self) -> Vec<Prerequisite> {
        let mut found = self.found;
        found.sort_unstable();
        let mut seen = Vec::with_capacity(found.len());
        found.retain(|p| {
            if seen.contains(&p.unit_type) {
                false
            } else {
                seen.push(p.unit_type);
                true
            }
        });
        found
    }

    fn walk(&mut self, unit_type: UnitType, frame: Frame, depth: usize) -> Result<Frame> {
        if depth > self.max_depth {
            return Err(ModelError::PrerequisiteDepthExceeded {
                unit_type,
                depth: self.max_depth,
            });
        }

        let mut ready: Frame = 0;
        for required in unit_type.required_buildings() {
            if required.is_resource_depot() {
                continue;
            }
            ready = ready.max(self.add(*required, frame, depth)?);
        }

        // Units always need their producer, even when it is not in the tech tree
        if !unit_type.is_building() {
            let producer = unit_type.what_builds();
            if !producer.is_resource_depot() {
                ready = ready.max(self.add(producer, frame, depth)?);
            }
        }

        if unit_type.cost().gas > 0 && unit_type != REFINERY {
            ready = ready.max(self.add(REFINERY, frame - self.gas_lead, depth)?);
        }

        Ok(ready)
    }

    fn add(&mut self, building: UnitType, frame: Frame, depth: usize) -> Result<Frame> {
        if let Some(completion) = (self.known)(building) {
            return Ok(completion);
        }

        let build_time = building.build_time();
        let start_frame = frame - build_time;
        self.found.push(Prerequisite {
            start_frame,
            unit_type: building,
        });

        Ok(self.walk(building, start_frame, depth + 1)? + build_time)
    }
}

/// Fail on the first prerequisite that would have had to start before the match.
pub fn ensure_non_negative(prerequisites: &[Prerequisite]) -> Result<()> {
    match prerequisites.iter().find(|p| p.start_frame < 0) {
        Some(p) => Err(ModelError::NegativePrerequisiteFrame {
            unit_type: p.unit_type,
            frame: p.start_frame,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAS_LEAD: Frame = 25;

    fn none(_: UnitType) -> Option<Frame> {
        None
    }

    fn types(found: &[Prerequisite]) -> Vec<UnitType> {
        found.iter().map(|p| p.unit_type).collect()
    }

    #[test]
    fn test_zealot_needs_only_gateway() {
        let mut walker = PrerequisiteWalker::new(none, 16, GAS_LEAD);
        walker.require(UnitType::Zealot, 3000).unwrap();
        let found = walker.finish();

        assert_eq!(
            found,
            vec![Prerequisite {
                start_frame: 3000 - UnitType::Gateway.build_time(),
                unit_type: UnitType::Gateway,
            }]
        );
    }

    #[test]
    fn test_dark_templar_chain() {
        let mut walker = PrerequisiteWalker::new(none, 16, GAS_LEAD);
        walker.require(UnitType::DarkTemplar, 10_000).unwrap();
        let found = walker.finish();

        assert_eq!(
            types(&found),
            vec![
                UnitType::Gateway,
                UnitType::CyberneticsCore,
                UnitType::Assimilator,
                UnitType::CitadelOfAdun,
                UnitType::TemplarArchives,
            ]
        );
        let archives = found.last().unwrap();
        assert_eq!(
            archives.start_frame,
            10_000 - UnitType::TemplarArchives.build_time()
        );
        // Gateway is needed both for the core and to warp the unit; the earlier need wins
        let gateway = found[0];
        assert_eq!(
            gateway.start_frame,
            10_000
                - UnitType::TemplarArchives.build_time()
                - UnitType::CitadelOfAdun.build_time()
                - UnitType::CyberneticsCore.build_time()
                - UnitType::Gateway.build_time()
        );
    }

    #[test]
    fn test_known_buildings_stop_the_walk() {
        let known = |t: UnitType| match t {
            UnitType::Gateway => Some(2600),
            UnitType::CyberneticsCore => Some(4300),
            UnitType::Assimilator => Some(2900),
            _ => None,
        };
        let mut walker = PrerequisiteWalker::new(known, 16, GAS_LEAD);
        let ready = walker.require(UnitType::Dragoon, 5000).unwrap();

        assert!(walker.finish().is_empty());
        assert_eq!(ready, 4300);
    }

    #[test]
    fn test_ready_frame_accounts_for_missing_chain() {
        let known = |t: UnitType| (t == UnitType::Gateway).then_some(2600);
        let mut walker = PrerequisiteWalker::new(known, 16, GAS_LEAD);
        let ready = walker.require(UnitType::Zealot, 0).unwrap();
        assert_eq!(ready, 2600);

        let mut walker = PrerequisiteWalker::new(known, 16, GAS_LEAD);
        let ready = walker.require(UnitType::Stargate, 0).unwrap();
        // Core must be built after the gateway completes
        assert_eq!(ready, 2600 + UnitType::CyberneticsCore.build_time());
    }

    #[test]
    fn test_gas_need_implies_refinery() {
        let known = |t: UnitType| (t == UnitType::Forge).then_some(2500);
        let mut walker = PrerequisiteWalker::new(known, 16, GAS_LEAD);
        walker.require_building(UnitType::Forge, 4000).unwrap();
        let ready = walker.require_gas(4000).unwrap();
        let found = walker.finish();

        assert_eq!(
            found,
            vec![Prerequisite {
                start_frame: 4000 - GAS_LEAD - UnitType::Assimilator.build_time(),
                unit_type: UnitType::Assimilator,
            }]
        );
        // Nothing gates a refinery, so it could be ready one build time in
        assert_eq!(ready, UnitType::Assimilator.build_time());
    }

    #[test]
    fn test_depth_cap() {
        let mut walker = PrerequisiteWalker::new(none, 1, GAS_LEAD);
        let result = walker.require(UnitType::Arbiter, 15_000);
        assert!(matches!(
            result,
            Err(ModelError::PrerequisiteDepthExceeded { .. })
        ));
    }

    #[test]
    fn test_negative_start_is_rejected() {
        let mut walker = PrerequisiteWalker::new(none, 16, GAS_LEAD);
        walker.require(UnitType::Dragoon, 1500).unwrap();
        let found = walker.finish();

        let err = ensure_non_negative(&found).unwrap_err();
        assert!(matches!(err, ModelError::NegativePrerequisiteFrame { .. }));
    }
}
