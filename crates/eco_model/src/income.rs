//! Baseline income simulation.
//!
//! Projects what the opponent would have banked at every frame if it
//! followed the standard opening and spent nothing else:
//! - workers are built constantly until the worker limit stops them
//! - the first supply building's builder leaves the mineral line for a while
//! - a scout leaves at a fixed frame and dies at a fixed frame
//! - workers move to gas a fixed delay after each refinery completes
//!
//! Later supply buildings are not simulated here, so supply headroom can go
//! negative; [`ResourceLedger::fill_supply_gaps`](crate::resources::ResourceLedger::fill_supply_gaps)
//! covers that afterwards.

use crate::config::ModelConfig;
use crate::math::Fixed;
use crate::resources::ResourceTimeline;
use crate::unit_type::UnitType;
use crate::Frame;

/// Deterministic baseline income projection.
#[derive(Debug, Clone, Copy)]
pub struct IncomeSimulator<'a> {
    config: &'a ModelConfig,
    worker_limit: i32,
    latency_frames: Frame,
}

impl<'a> IncomeSimulator<'a> {
    /// Create a simulator for an opponent that stops building workers at `worker_limit`.
    #[must_use]
    pub const fn new(config: &'a ModelConfig, worker_limit: i32, latency_frames: Frame) -> Self {
        Self {
            config,
            worker_limit,
            latency_frames,
        }
    }

    /// Fill `out` with the baseline arrays.
    ///
    /// `refinery_completions` are the frames refineries finish. When
    /// `gas_override` is set it replaces them with a single refinery
    /// finishing at that frame, for probing hypothetical gas timings.
    pub fn simulate(
        &self,
        refinery_completions: &[Frame],
        gas_override: Option<Frame>,
        out: &mut ResourceTimeline,
    ) {
        let opening = &self.config.opening;
        let worker = UnitType::Probe;
        let worker_cost = worker.cost();

        let override_frames;
        let refineries = match gas_override {
            Some(frame) => {
                override_frames = [frame];
                &override_frames[..]
            }
            None => refinery_completions,
        };
        let mut gas_moves = refineries
            .iter()
            .map(|f| f + opening.gas_worker_delay)
            .peekable();

        let mut mineral_workers = opening.initial_mineral_workers;
        let mut gas_workers = 0;
        let mut remaining_build = worker.build_time() + self.latency_frames;

        let mut minerals = Fixed::ZERO;
        let mut gas = Fixed::ZERO;
        let mut supply = opening.initial_supply;

        let horizon = out.horizon();
        let income_start = opening.income_start_frame.clamp(0, horizon);
        for f in 0..income_start {
            out.set(f as usize, 0, 0, supply);
        }

        for f in income_start..horizon {
            while gas_moves.next_if(|frame| *frame <= f).is_some() {
                let moved = opening.workers_per_refinery.min(mineral_workers);
                mineral_workers -= moved;
                gas_workers += moved;
            }

            if remaining_build == 0 {
                mineral_workers += 1;
            }

            if remaining_build <= 0
                && minerals >= Fixed::from_num(worker_cost.minerals)
                && mineral_workers + gas_workers < self.worker_limit
            {
                minerals -= Fixed::from_num(worker_cost.minerals);
                remaining_build = worker.build_time();
                supply -= worker_cost.supply;
            }
            remaining_build -= 1;

            if f == opening.builder_departs {
                mineral_workers -= 1;
            }
            if f == opening.first_supply_placed {
                minerals -= Fixed::from_num(UnitType::Pylon.cost().minerals);
            }
            if f == opening.builder_returns {
                mineral_workers += 1;
            }
            if f == opening.first_supply_completes {
                supply += UnitType::Pylon.supply_provided();
            }
            if f == opening.scout_departs {
                mineral_workers -= 1;
            }
            if f == opening.scout_dies {
                supply += worker_cost.supply;
            }

            minerals += Fixed::from_num(mineral_workers) * self.config.minerals_per_worker_frame;
            gas += Fixed::from_num(gas_workers) * self.config.gas_per_worker_frame;
            out.set(
                f as usize,
                minerals.to_num::<i32>(),
                gas.to_num::<i32>(),
                supply,
            );
        }
    }
}
