//! Static game data for the modelled race.
//!
//! This module is the single source of truth for unit identity and the
//! tech graph:
//! - [`UnitType`]: every unit and building the model reasons about
//! - [`UpgradeOrTech`]: research items, with level-scaled costs
//! - [`Race`]: opponent race, used to gate enablement
//!
//! All accessors are `const fn` lookups; there is no runtime registry.
//! Supply is counted in half-units (a worker costs 2).

use serde::{Deserialize, Serialize};

use crate::Frame;

/// Frames a building spends warping in after its nominal build time.
pub const WARP_IN_FRAMES: Frame = 71;

/// Opponent race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Race {
    /// The modelled race.
    Protoss,
    /// Not modelled.
    Terran,
    /// Not modelled.
    Zerg,
    /// Not yet revealed (random opponents before first sighting).
    #[default]
    Unknown,
}

impl Race {
    /// Whether the model can run against this race.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Protoss | Self::Unknown)
    }
}

/// Mineral, gas and supply price of something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Mineral price.
    pub minerals: i32,
    /// Gas price.
    pub gas: i32,
    /// Supply required (half-units).
    pub supply: i32,
}

impl Cost {
    /// Zero cost.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create a new cost.
    #[must_use]
    pub const fn new(minerals: i32, gas: i32, supply: i32) -> Self {
        Self {
            minerals,
            gas,
            supply,
        }
    }

    /// The same cost with every component negated.
    #[must_use]
    pub const fn negated(self) -> Self {
        Self::new(-self.minerals, -self.gas, -self.supply)
    }

    /// Scale minerals and gas by `percent`, dropping supply.
    #[must_use]
    pub const fn resources_percent(self, percent: i32) -> Self {
        Self::new(self.minerals * percent / 100, self.gas * percent / 100, 0)
    }
}

impl std::ops::Add for Cost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(
            self.minerals + rhs.minerals,
            self.gas + rhs.gas,
            self.supply + rhs.supply,
        )
    }
}

impl std::ops::AddAssign for Cost {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Cost {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self + rhs.negated();
    }
}

/// Every unit and building type the model knows about.
///
/// Declaration order is the iteration order everywhere the model walks
/// types (scheduler passes, caches), so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitType {
    // ========================================
    // Units
    // ========================================
    /// Worker.
    Probe,
    /// Basic melee infantry.
    Zealot,
    /// Ranged ground unit.
    Dragoon,
    /// Spellcaster.
    HighTemplar,
    /// Permanently cloaked melee unit.
    DarkTemplar,
    /// Air transport.
    Shuttle,
    /// Siege unit.
    Reaver,
    /// Cloaked detector.
    Observer,
    /// Air superiority fighter.
    Scout,
    /// Anti-air fighter.
    Corsair,
    /// Capital ship.
    Carrier,
    /// Cloaking field support ship.
    Arbiter,

    // ========================================
    // Buildings
    // ========================================
    /// Resource depot.
    Nexus,
    /// Supply provider.
    Pylon,
    /// Refinery.
    Assimilator,
    /// Basic ground production.
    Gateway,
    /// Ground upgrades.
    Forge,
    /// Static defense.
    PhotonCannon,
    /// Shield regeneration.
    ShieldBattery,
    /// Tier 2 tech.
    CyberneticsCore,
    /// Mechanical production.
    RoboticsFacility,
    /// Air production.
    Stargate,
    /// Tier 2 ground tech.
    CitadelOfAdun,
    /// Reaver tech.
    RoboticsSupportBay,
    /// Observer tech.
    Observatory,
    /// Capital ship tech.
    FleetBeacon,
    /// Templar tech.
    TemplarArchives,
    /// Arbiter tech.
    ArbiterTribunal,
}

impl UnitType {
    /// All types, in declaration order.
    pub const ALL: [Self; 28] = [
        Self::Probe,
        Self::Zealot,
        Self::Dragoon,
        Self::HighTemplar,
        Self::DarkTemplar,
        Self::Shuttle,
        Self::Reaver,
        Self::Observer,
        Self::Scout,
        Self::Corsair,
        Self::Carrier,
        Self::Arbiter,
        Self::Nexus,
        Self::Pylon,
        Self::Assimilator,
        Self::Gateway,
        Self::Forge,
        Self::PhotonCannon,
        Self::ShieldBattery,
        Self::CyberneticsCore,
        Self::RoboticsFacility,
        Self::Stargate,
        Self::CitadelOfAdun,
        Self::RoboticsSupportBay,
        Self::Observatory,
        Self::FleetBeacon,
        Self::TemplarArchives,
        Self::ArbiterTribunal,
    ];

    /// Mineral, gas and supply price.
    #[must_use]
    pub const fn cost(self) -> Cost {
        match self {
            Self::Probe => Cost::new(50, 0, 2),
            Self::Zealot => Cost::new(100, 0, 4),
            Self::Dragoon => Cost::new(125, 50, 4),
            Self::HighTemplar => Cost::new(50, 150, 4),
            Self::DarkTemplar => Cost::new(125, 100, 4),
            Self::Shuttle => Cost::new(200, 0, 4),
            Self::Reaver => Cost::new(200, 100, 8),
            Self::Observer => Cost::new(25, 75, 2),
            Self::Scout => Cost::new(275, 125, 6),
            Self::Corsair => Cost::new(150, 100, 4),
            Self::Carrier => Cost::new(350, 250, 12),
            Self::Arbiter => Cost::new(100, 350, 8),
            Self::Nexus => Cost::new(400, 0, 0),
            Self::Pylon => Cost::new(100, 0, 0),
            Self::Assimilator => Cost::new(100, 0, 0),
            Self::Gateway => Cost::new(150, 0, 0),
            Self::Forge => Cost::new(150, 0, 0),
            Self::PhotonCannon => Cost::new(150, 0, 0),
            Self::ShieldBattery => Cost::new(100, 0, 0),
            Self::CyberneticsCore => Cost::new(200, 0, 0),
            Self::RoboticsFacility => Cost::new(200, 200, 0),
            Self::Stargate => Cost::new(150, 150, 0),
            Self::CitadelOfAdun => Cost::new(150, 100, 0),
            Self::RoboticsSupportBay => Cost::new(150, 100, 0),
            Self::Observatory => Cost::new(50, 100, 0),
            Self::FleetBeacon => Cost::new(300, 200, 0),
            Self::TemplarArchives => Cost::new(150, 200, 0),
            Self::ArbiterTribunal => Cost::new(200, 150, 0),
        }
    }

    /// Supply provided once complete (half-units).
    #[must_use]
    pub const fn supply_provided(self) -> i32 {
        match self {
            Self::Nexus => 18,
            Self::Pylon => 16,
            _ => 0,
        }
    }

    /// Nominal build time in frames, excluding warp-in.
    #[must_use]
    pub const fn base_build_time(self) -> Frame {
        match self {
            Self::Probe => 300,
            Self::Zealot => 600,
            Self::Dragoon => 750,
            Self::HighTemplar => 750,
            Self::DarkTemplar => 750,
            Self::Shuttle => 900,
            Self::Reaver => 1050,
            Self::Observer => 600,
            Self::Scout => 1200,
            Self::Corsair => 600,
            Self::Carrier => 2100,
            Self::Arbiter => 2400,
            Self::Nexus => 1800,
            Self::Pylon => 450,
            Self::Assimilator => 600,
            Self::Gateway => 900,
            Self::Forge => 600,
            Self::PhotonCannon => 750,
            Self::ShieldBattery => 450,
            Self::CyberneticsCore => 900,
            Self::RoboticsFacility => 1200,
            Self::Stargate => 1050,
            Self::CitadelOfAdun => 900,
            Self::RoboticsSupportBay => 450,
            Self::Observatory => 450,
            Self::FleetBeacon => 900,
            Self::TemplarArchives => 900,
            Self::ArbiterTribunal => 900,
        }
    }

    /// Frames from creation to completion, including warp-in for buildings.
    #[must_use]
    pub const fn build_time(self) -> Frame {
        if self.is_building() {
            self.base_build_time() + WARP_IN_FRAMES
        } else {
            self.base_build_time()
        }
    }

    /// Whether this is a building.
    #[must_use]
    pub const fn is_building(self) -> bool {
        (self as u8) >= (Self::Nexus as u8)
    }

    /// Whether this is a worker.
    #[must_use]
    pub const fn is_worker(self) -> bool {
        matches!(self, Self::Probe)
    }

    /// Whether this is a refinery.
    #[must_use]
    pub const fn is_refinery(self) -> bool {
        matches!(self, Self::Assimilator)
    }

    /// Whether this is a resource depot.
    #[must_use]
    pub const fn is_resource_depot(self) -> bool {
        matches!(self, Self::Nexus)
    }

    /// The type that creates this one.
    #[must_use]
    pub const fn what_builds(self) -> Self {
        match self {
            Self::Probe => Self::Nexus,
            Self::Zealot | Self::Dragoon | Self::HighTemplar | Self::DarkTemplar => Self::Gateway,
            Self::Shuttle | Self::Reaver | Self::Observer => Self::RoboticsFacility,
            Self::Scout | Self::Corsair | Self::Carrier | Self::Arbiter => Self::Stargate,
            _ => Self::Probe,
        }
    }

    /// Buildings that must exist before this type can be started.
    #[must_use]
    pub const fn required_buildings(self) -> &'static [Self] {
        match self {
            Self::Dragoon => &[Self::CyberneticsCore],
            Self::HighTemplar | Self::DarkTemplar => &[Self::TemplarArchives],
            Self::Reaver => &[Self::RoboticsSupportBay],
            Self::Observer => &[Self::Observatory],
            Self::Carrier => &[Self::FleetBeacon],
            Self::Arbiter => &[Self::ArbiterTribunal],
            Self::Gateway | Self::Forge => &[Self::Nexus],
            Self::PhotonCannon => &[Self::Forge],
            Self::ShieldBattery | Self::CyberneticsCore => &[Self::Gateway],
            Self::RoboticsFacility | Self::Stargate | Self::CitadelOfAdun => {
                &[Self::CyberneticsCore]
            }
            Self::RoboticsSupportBay | Self::Observatory => &[Self::RoboticsFacility],
            Self::FleetBeacon => &[Self::Stargate],
            Self::TemplarArchives => &[Self::CitadelOfAdun],
            Self::ArbiterTribunal => &[Self::TemplarArchives, Self::Stargate],
            _ => &[],
        }
    }

    /// Whether some unit type is produced by this one.
    #[must_use]
    pub fn is_producer(self) -> bool {
        Self::ALL
            .iter()
            .any(|t| !t.is_building() && t.what_builds() == self)
    }
}

/// Research items the opponent can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResearchKind {
    /// Dragoon range.
    SingularityCharge,
    /// Zealot speed.
    LegEnhancements,
    /// Ground weapons (levelled).
    GroundWeapons,
    /// Ground armor (levelled).
    GroundArmor,
    /// Shields (levelled).
    PlasmaShields,
    /// Air weapons (levelled).
    AirWeapons,
    /// Air armor (levelled).
    AirArmor,
    /// Carrier interceptor capacity.
    CarrierCapacity,
    /// Reaver scarab capacity.
    ReaverCapacity,
    /// High templar energy.
    KhaydarinAmulet,
    /// Storm tech.
    PsionicStorm,
    /// Hallucination tech.
    Hallucination,
    /// Stasis tech.
    StasisField,
}

/// Base price and per-level scaling for a research kind.
#[derive(Debug, Clone, Copy)]
struct ResearchData {
    base: Cost,
    base_time: Frame,
    level_minerals: i32,
    level_gas: i32,
    level_time: Frame,
    researcher: UnitType,
    higher_level_requirement: Option<UnitType>,
}

impl ResearchKind {
    const fn data(self) -> ResearchData {
        const fn flat(minerals: i32, gas: i32, time: Frame, researcher: UnitType) -> ResearchData {
            ResearchData {
                base: Cost::new(minerals, gas, 0),
                base_time: time,
                level_minerals: 0,
                level_gas: 0,
                level_time: 0,
                researcher,
                higher_level_requirement: None,
            }
        }
        const fn levelled(
            minerals: i32,
            gas: i32,
            factor: i32,
            researcher: UnitType,
            requirement: UnitType,
        ) -> ResearchData {
            ResearchData {
                base: Cost::new(minerals, gas, 0),
                base_time: 4000,
                level_minerals: factor,
                level_gas: factor,
                level_time: 480,
                researcher,
                higher_level_requirement: Some(requirement),
            }
        }

        match self {
            Self::SingularityCharge => flat(150, 150, 2500, UnitType::CyberneticsCore),
            Self::LegEnhancements => flat(150, 150, 2000, UnitType::CitadelOfAdun),
            Self::GroundWeapons => levelled(100, 100, 50, UnitType::Forge, UnitType::TemplarArchives),
            Self::GroundArmor => levelled(100, 100, 75, UnitType::Forge, UnitType::TemplarArchives),
            Self::PlasmaShields => levelled(200, 200, 100, UnitType::Forge, UnitType::CyberneticsCore),
            Self::AirWeapons => levelled(
                100,
                100,
                50,
                UnitType::CyberneticsCore,
                UnitType::FleetBeacon,
            ),
            Self::AirArmor => levelled(
                150,
                150,
                75,
                UnitType::CyberneticsCore,
                UnitType::FleetBeacon,
            ),
            Self::CarrierCapacity => flat(100, 100, 1500, UnitType::FleetBeacon),
            Self::ReaverCapacity => flat(200, 200, 2500, UnitType::RoboticsSupportBay),
            Self::KhaydarinAmulet => flat(150, 150, 2500, UnitType::TemplarArchives),
            Self::PsionicStorm => flat(200, 200, 1800, UnitType::TemplarArchives),
            Self::Hallucination => flat(150, 150, 1200, UnitType::TemplarArchives),
            Self::StasisField => flat(150, 150, 1500, UnitType::ArbiterTribunal),
        }
    }
}

/// A research item at a given level (techs are always level 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UpgradeOrTech {
    /// What is being researched.
    pub kind: ResearchKind,
    /// Level being researched, starting at 1.
    pub level: u8,
}

impl UpgradeOrTech {
    /// A level-1 research item.
    #[must_use]
    pub const fn tech(kind: ResearchKind) -> Self {
        Self { kind, level: 1 }
    }

    /// An upgrade at a specific level. Level 0 is treated as level 1.
    #[must_use]
    pub const fn upgrade(kind: ResearchKind, level: u8) -> Self {
        Self {
            kind,
            level: if level == 0 { 1 } else { level },
        }
    }

    const fn extra_levels(self) -> i32 {
        self.level.saturating_sub(1) as i32
    }

    /// Level-scaled price.
    #[must_use]
    pub const fn cost(self) -> Cost {
        let data = self.kind.data();
        Cost::new(
            data.base.minerals + data.level_minerals * self.extra_levels(),
            data.base.gas + data.level_gas * self.extra_levels(),
            0,
        )
    }

    /// Level-scaled research time in frames.
    #[must_use]
    pub const fn research_time(self) -> Frame {
        let data = self.kind.data();
        data.base_time + data.level_time * self.extra_levels()
    }

    /// Building that performs the research.
    #[must_use]
    pub const fn what_researches(self) -> UnitType {
        self.kind.data().researcher
    }

    /// Additional building required for this level, if any.
    #[must_use]
    pub const fn whats_required(self) -> Option<UnitType> {
        if self.level > 1 {
            self.kind.data().higher_level_requirement
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_building_classification_follows_declaration_order() {
        assert!(!UnitType::Arbiter.is_building());
        assert!(UnitType::Nexus.is_building());
        assert!(UnitType::ArbiterTribunal.is_building());
        assert_eq!(UnitType::ALL.len(), UnitType::ArbiterTribunal as usize + 1);
    }

    #[test]
    fn test_buildings_include_warp_in() {
        assert_eq!(UnitType::Gateway.build_time(), 900 + WARP_IN_FRAMES);
        assert_eq!(UnitType::Zealot.build_time(), 600);
    }

    #[test]
    fn test_tech_graph_is_acyclic() {
        fn depth(t: UnitType, remaining: usize) -> bool {
            if remaining == 0 {
                return false;
            }
            t.required_buildings().iter().all(|r| depth(*r, remaining - 1))
        }
        for t in UnitType::ALL {
            assert!(depth(t, 10), "{t:?} has a cyclic or very deep chain");
        }
    }

    #[test]
    fn test_producers() {
        assert!(UnitType::Gateway.is_producer());
        assert!(UnitType::Stargate.is_producer());
        assert!(!UnitType::Forge.is_producer());
        assert_eq!(UnitType::DarkTemplar.what_builds(), UnitType::Gateway);
    }

    #[test]
    fn test_upgrade_level_scaling() {
        let level1 = UpgradeOrTech::upgrade(ResearchKind::GroundWeapons, 1);
        let level2 = UpgradeOrTech::upgrade(ResearchKind::GroundWeapons, 2);

        assert_eq!(level1.cost(), Cost::new(100, 100, 0));
        assert_eq!(level2.cost(), Cost::new(150, 150, 0));
        assert_eq!(level2.research_time(), 4480);
        assert_eq!(level1.whats_required(), None);
        assert_eq!(level2.whats_required(), Some(UnitType::TemplarArchives));
    }

    #[test]
    fn test_cost_refund_percent() {
        let cost = UnitType::Stargate.cost();
        assert_eq!(cost.resources_percent(75), Cost::new(112, 112, 0));
        assert_eq!(cost + cost.negated(), Cost::ZERO);
    }

    #[test]
    fn test_race_support() {
        assert!(Race::Protoss.is_supported());
        assert!(Race::Unknown.is_supported());
        assert!(!Race::Zerg.is_supported());
    }
}
