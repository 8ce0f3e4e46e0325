//! Production scheduling.
//!
//! Binds every non-building unit to a producer of the right type, one
//! producer type at a time. A producer makes one unit at a time, so if
//! the known producers cannot account for every unit, more must exist.
//!
//! Each pass runs greedily over the consumers in creation order:
//! 1. Units whose creation frame is only an estimate are pulled as early as
//!    resources allow, moving supply buildings earlier (or adding new
//!    ones) when supply is the only thing in the way.
//! 2. The unit is bound to the first producer free by its nominal frame,
//!    pulling an unused producer earlier if that is what it takes.
//! 3. If nothing can produce it, all resource changes of the pass are
//!    rolled back, one implied producer is added, and the pass restarts.
//!
//! Passes are bounded by [`ModelConfig::max_producers_per_type`].

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::ledger::{UnitHandle, UnitLedger};
use crate::resources::{ResourceLedger, ResourceTimeline, SUPPLY_BUILDING};
use crate::unit_type::{Cost, UnitType};
use crate::Frame;

/// Result of scanning how early a unit's spend could move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Probe {
    /// Earliest frame reachable without going negative.
    frame: Frame,
    /// Contiguous frames `(first, last)` blocked only by supply, directly
    /// below `frame`.
    supply_block: Option<(Frame, Frame)>,
}

impl Probe {
    fn scan(timeline: &ResourceTimeline, cost: Cost, nominal: Frame, lower: Frame) -> Self {
        let minerals = timeline.minerals();
        let gas = timeline.gas();
        let supply = timeline.supply();
        let resources_ok = |x: Frame| {
            minerals[x as usize] >= cost.minerals && gas[x as usize] >= cost.gas
        };

        let mut frame = nominal;
        let mut x = nominal.min(timeline.horizon()) - 1;
        while x >= lower {
            if !resources_ok(x) {
                break;
            }
            if supply[x as usize] < cost.supply {
                let last = x;
                let mut first = x;
                while first > lower
                    && resources_ok(first - 1)
                    && supply[(first - 1) as usize] < cost.supply
                {
                    first -= 1;
                }
                return Self {
                    frame,
                    supply_block: Some((first, last)),
                };
            }
            frame = x;
            x -= 1;
        }

        Self {
            frame,
            supply_block: None,
        }
    }
}

/// Greedy producer assignment over a unit ledger and its resources.
pub struct ProductionScheduler<'a> {
    config: &'a ModelConfig,
    ledger: &'a mut UnitLedger,
    resources: &'a mut ResourceLedger,
}

impl<'a> ProductionScheduler<'a> {
    /// Create a scheduler.
    ///
    /// Every record in `ledger` must already be applied to `resources` at its
    /// nominal creation frame.
    pub fn new(
        config: &'a ModelConfig,
        ledger: &'a mut UnitLedger,
        resources: &'a mut ResourceLedger,
    ) -> Self {
        Self {
            config,
            ledger,
            resources,
        }
    }

    /// Schedule every producer type. Returns how many producers were implied.
    pub fn run(&mut self) -> Result<usize> {
        let mut implied = 0;
        for producer in UnitType::ALL {
            if !producer.is_producer()
                || producer.is_resource_depot()
                || self.ledger.consumers_of(producer).is_empty()
            {
                continue;
            }
            implied += self.schedule_producer(producer)?;
        }
        Ok(implied)
    }

    fn schedule_producer(&mut self, producer: UnitType) -> Result<usize> {
        let bound = self.config.max_producers_per_type;
        let mut added = 0;

        loop {
            let snapshot = self.resources.snapshot();
            let pool = self.prepare_pass(producer);
            if pool.len() > bound {
                return Err(ModelError::ProducerBoundExceeded { producer, bound });
            }

            let Some(stalled) = self.assign(producer, &pool) else {
                tracing::trace!(?producer, pool = pool.len(), added, "Producer pass complete");
                return Ok(added);
            };

            self.resources.restore(&snapshot);
            self.imply_producer(producer, stalled)?;
            added += 1;
        }
    }

    /// Reset scheduling state for the producers and consumers of one type.
    fn prepare_pass(&mut self, producer: UnitType) -> Vec<UnitHandle> {
        let pool = self.ledger.of_type(producer).to_vec();
        let consumers = self.ledger.consumers_of(producer).to_vec();
        for &handle in pool.iter().chain(&consumers) {
            let ready = self
                .ledger
                .requirements_ready_frame(self.ledger.get(handle).unit_type);
            let unit = self.ledger.get_mut(handle);
            unit.reset_transient();
            unit.prerequisites_ready_frame = ready;
        }
        pool
    }

    /// Bind every consumer. Returns the first one no producer could take.
    fn assign(&mut self, producer: UnitType, pool: &[UnitHandle]) -> Option<UnitHandle> {
        let consumers = self.ledger.consumers_of(producer).to_vec();
        for consumer in consumers {
            if !self.ledger.get(consumer).creation_frame_known {
                self.pull_earlier(consumer);
            }
            if !self.bind(consumer, pool) {
                return Some(consumer);
            }
        }
        None
    }

    fn pull_earlier(&mut self, handle: UnitHandle) {
        let unit = self.ledger.get(handle);
        let cost = unit.cost();
        let nominal = unit.creation_frame;
        let lower = unit.prerequisites_ready_frame.max(0);

        let mut probe = Probe::scan(self.resources.timeline(), cost, nominal, lower);
        while let Some((first, last)) = probe.supply_block {
            let saved = self.resources.snapshot();
            if !self.resolve_supply_block(first, last) {
                break;
            }
            let retry = Probe::scan(self.resources.timeline(), cost, nominal, lower);
            if retry.frame >= probe.frame {
                self.resources.restore(&saved);
                break;
            }
            probe = retry;
        }

        if probe.frame < nominal {
            self.resources
                .timeline_mut()
                .move_debit(cost, nominal, probe.frame);
            self.ledger.get_mut(handle).shifted_creation_frame = probe.frame;
        }
    }

    /// Make supply available over `[first, last]`.
    ///
    /// Prefers moving the next supply building completing after the block
    /// so it completes by `first`; otherwise adds one wherever it is first
    /// affordable, as long as it completes inside the block.
    fn resolve_supply_block(&mut self, first: Frame, last: Frame) -> bool {
        let build_time = SUPPLY_BUILDING.build_time();
        let cost = SUPPLY_BUILDING.cost();
        let target_start = first - build_time;

        let next = self
            .resources
            .supply_buildings()
            .iter()
            .position(|start| start + build_time > last);
        if let Some(index) = next {
            let old_start = self.resources.supply_buildings()[index];
            let timeline = self.resources.timeline();
            let end = old_start.min(timeline.horizon());
            if target_start >= 0
                && (target_start..end).all(|x| timeline.minerals()[x as usize] >= cost.minerals)
            {
                tracing::trace!(old_start, target_start, "Moving supply building earlier");
                self.resources.move_supply_building(index, target_start);
                return true;
            }
        }

        match self.resources.timeline().earliest_affordable(cost, 0) {
            Some(start) if start + build_time <= last => {
                tracing::trace!(start, "Adding supply building");
                self.resources.add_supply_building(start);
                true
            }
            _ => false,
        }
    }

    fn bind(&mut self, consumer: UnitHandle, pool: &[UnitHandle]) -> bool {
        let unit = self.ledger.get(consumer);
        let nominal = unit.creation_frame;
        let shifted = unit.shifted_creation_frame;
        let cost = unit.cost();
        let build_time = unit.unit_type.build_time();

        let free = pool.iter().copied().find(|h| {
            let producer = self.ledger.get(*h);
            producer.next_available_frame <= nominal
                && producer.death_frame > shifted.max(producer.next_available_frame)
        });
        let Some(chosen) = free.or_else(|| self.pull_producer_earlier(pool, nominal)) else {
            return false;
        };

        let frame = shifted.max(self.ledger.get(chosen).next_available_frame);
        self.resources.timeline_mut().move_debit(cost, shifted, frame);
        self.ledger.get_mut(consumer).shifted_creation_frame = frame;

        let producer = self.ledger.get_mut(chosen);
        producer.next_available_frame = frame + build_time;
        producer.produced_this_pass = true;
        true
    }

    /// Move an unused producer earlier so it is complete by `needed_by`.
    fn pull_producer_earlier(&mut self, pool: &[UnitHandle], needed_by: Frame) -> Option<UnitHandle> {
        let candidate = pool
            .iter()
            .copied()
            .filter(|h| {
                let producer = self.ledger.get(*h);
                !producer.produced_this_pass
                    && !producer.creation_frame_known
                    && producer.death_frame > needed_by
            })
            .min_by_key(|h| (self.ledger.get(*h).next_available_frame, *h))?;

        let producer = self.ledger.get(candidate);
        let build_time = producer.unit_type.build_time();
        let cost = producer.cost();
        let old_start = producer.shifted_creation_frame;
        let new_start = needed_by - build_time;
        if new_start < 0 || new_start < producer.prerequisites_ready_frame || new_start >= old_start {
            return None;
        }

        let timeline = self.resources.timeline();
        let end = old_start.min(timeline.horizon());
        if !(new_start..end).all(|x| timeline.affords_at(x as usize, cost)) {
            return None;
        }

        tracing::trace!(
            producer = ?producer.unit_type,
            old_start,
            new_start,
            "Pulling producer earlier"
        );
        self.resources
            .timeline_mut()
            .move_debit(cost, old_start, new_start);
        let producer = self.ledger.get_mut(candidate);
        producer.shifted_creation_frame = new_start;
        producer.next_available_frame = new_start + build_time;
        Some(candidate)
    }

    fn imply_producer(&mut self, producer: UnitType, stalled: UnitHandle) -> Result<()> {
        let consumer = self.ledger.get(stalled);
        let consumer_type = consumer.unit_type;
        let latest_useful = consumer.creation_frame - producer.build_time();
        let ready = self.ledger.requirements_ready_frame(producer);

        let frame = self
            .resources
            .timeline()
            .earliest_affordable(producer.cost(), ready)
            .unwrap_or(latest_useful)
            .min(latest_useful);
        if frame < 0 {
            return Err(ModelError::NegativeImpliedFrame {
                unit_type: producer,
                frame,
            });
        }

        tracing::debug!(?producer, frame, consumer = ?consumer_type, "Implying producer");
        let handle = self.ledger.add_implied(producer, frame);
        self.resources
            .timeline_mut()
            .apply_unit(self.ledger.get(handle), self.config.cancel_refund_percent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::UnitId;

    const HORIZON: usize = 5000;

    fn timeline_from(f: impl Fn(usize) -> (i32, i32, i32)) -> ResourceTimeline {
        let mut timeline = ResourceTimeline::new(HORIZON);
        for frame in 0..HORIZON {
            let (minerals, gas, supply) = f(frame);
            timeline.set(frame, minerals, gas, supply);
        }
        timeline
    }

    fn setup(
        timeline: ResourceTimeline,
        units: &[(UnitType, Frame, bool)],
    ) -> (UnitLedger, ResourceLedger) {
        let mut ledger = UnitLedger::new();
        for (i, &(unit_type, frame, known)) in units.iter().enumerate() {
            ledger.record_created(unit_type, UnitId(i as u32 + 1), frame, known);
        }
        let mut resources = ResourceLedger::new(timeline);
        for unit in ledger.iter() {
            resources.timeline_mut().apply_unit(unit, 75);
        }
        (ledger, resources)
    }

    fn run(ledger: &mut UnitLedger, resources: &mut ResourceLedger) -> Result<usize> {
        let config = ModelConfig::default();
        ProductionScheduler::new(&config, ledger, resources).run()
    }

    fn shifted(ledger: &UnitLedger, unit_type: UnitType) -> Vec<Frame> {
        ledger
            .of_type(unit_type)
            .iter()
            .map(|h| ledger.get(*h).shifted_creation_frame)
            .collect()
    }

    #[test]
    fn test_second_producer_is_implied() {
        let (mut ledger, mut resources) = setup(
            timeline_from(|_| (1000, 0, 100)),
            &[
                (UnitType::Gateway, 1684, true),
                (UnitType::Zealot, 2700, true),
                (UnitType::Zealot, 2800, true),
            ],
        );

        let implied = run(&mut ledger, &mut resources).unwrap();

        assert_eq!(implied, 1);
        assert_eq!(ledger.alive_count(UnitType::Gateway), 2);
        let gateway = ledger.get(ledger.implied()[0]);
        assert_eq!(gateway.unit_type, UnitType::Gateway);
        assert_eq!(gateway.creation_frame, 0);
        assert_eq!(shifted(&ledger, UnitType::Zealot), vec![2700, 2800]);
    }

    #[test]
    fn test_estimated_unit_pulled_to_producer_availability() {
        let (mut ledger, mut resources) = setup(
            timeline_from(|_| (1000, 0, 100)),
            &[
                (UnitType::Gateway, 100, true),
                (UnitType::Zealot, 3000, false),
            ],
        );

        assert_eq!(run(&mut ledger, &mut resources).unwrap(), 0);

        let available = 100 + UnitType::Gateway.build_time();
        assert_eq!(shifted(&ledger, UnitType::Zealot), vec![available]);
        let timeline = resources.timeline();
        assert_eq!(timeline.at(available - 1).unwrap().0, 850);
        assert_eq!(timeline.at(available).unwrap().0, 750);
    }

    #[test]
    fn test_known_unit_is_not_shifted() {
        let (mut ledger, mut resources) = setup(
            timeline_from(|_| (1000, 0, 100)),
            &[
                (UnitType::Gateway, 100, true),
                (UnitType::Zealot, 3000, true),
            ],
        );

        run(&mut ledger, &mut resources).unwrap();

        assert_eq!(shifted(&ledger, UnitType::Zealot), vec![3000]);
    }

    #[test]
    fn test_supply_block_moves_existing_supply_building() {
        // Gas only from 1500; supply is short until the supply building at 2450 completes
        let (mut ledger, mut resources) = setup(
            timeline_from(|f| (1000, if f < 1500 { 0 } else { 1000 }, 2)),
            &[
                (UnitType::Gateway, 0, true),
                (UnitType::CyberneticsCore, 0, true),
                (UnitType::Dragoon, 3000, false),
            ],
        );
        resources.add_supply_building(2450);

        run(&mut ledger, &mut resources).unwrap();

        let build_time = SUPPLY_BUILDING.build_time();
        assert_eq!(resources.supply_buildings(), &[1500 - build_time]);
        assert_eq!(shifted(&ledger, UnitType::Dragoon), vec![1500]);
        assert!(resources.timeline().supply().iter().all(|s| *s >= 0));
    }

    #[test]
    fn test_supply_block_adds_supply_building() {
        // Minerals only from 1500, so the existing supply building cannot move
        let (mut ledger, mut resources) = setup(
            timeline_from(|f| (if f < 1500 { 0 } else { 1000 }, 0, 2)),
            &[
                (UnitType::Gateway, 1500, true),
                (UnitType::Zealot, 3000, false),
            ],
        );
        resources.add_supply_building(2450);

        run(&mut ledger, &mut resources).unwrap();

        let build_time = SUPPLY_BUILDING.build_time();
        assert_eq!(resources.supply_buildings(), &[1500, 2450]);
        let gateway_ready = 1500 + UnitType::Gateway.build_time();
        assert_eq!(
            shifted(&ledger, UnitType::Zealot),
            vec![gateway_ready.max(1500 + build_time)]
        );
        assert!(resources.timeline().supply().iter().all(|s| *s >= 0));
    }

    #[test]
    fn test_unused_producer_pulled_earlier() {
        let (mut ledger, mut resources) = setup(
            timeline_from(|_| (1000, 0, 100)),
            &[(UnitType::Zealot, 2000, true)],
        );
        let handle = ledger.add_implied(UnitType::Gateway, 1500);
        resources
            .timeline_mut()
            .apply_unit(ledger.get(handle), 75);

        assert_eq!(run(&mut ledger, &mut resources).unwrap(), 0);

        let gateway = ledger.get(ledger.of_type(UnitType::Gateway)[0]);
        assert_eq!(
            gateway.shifted_creation_frame,
            2000 - UnitType::Gateway.build_time()
        );
    }

    #[test]
    fn test_producer_bound() {
        let (mut ledger, mut resources) = setup(
            timeline_from(|_| (5000, 0, 100)),
            &[
                (UnitType::Zealot, 2000, true),
                (UnitType::Zealot, 2000, true),
                (UnitType::Zealot, 2000, true),
            ],
        );
        let config = ModelConfig {
            max_producers_per_type: 1,
            ..ModelConfig::default()
        };

        let result = ProductionScheduler::new(&config, &mut ledger, &mut resources).run();

        assert!(matches!(
            result,
            Err(ModelError::ProducerBoundExceeded {
                producer: UnitType::Gateway,
                bound: 1
            })
        ));
    }

    #[test]
    fn test_producer_needed_before_match_start() {
        let (mut ledger, mut resources) = setup(
            timeline_from(|_| (1000, 0, 100)),
            &[(UnitType::Zealot, 500, true)],
        );

        let result = run(&mut ledger, &mut resources);

        assert!(matches!(
            result,
            Err(ModelError::NegativeImpliedFrame {
                unit_type: UnitType::Gateway,
                ..
            })
        ));
    }
}
