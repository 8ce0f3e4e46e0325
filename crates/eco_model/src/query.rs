//! Memoized queries over a scheduled ledger.
//!
//! Queries read the canonical state through a [`QueryContext`] and never
//! mutate it; worst-case simulation works on a private copy of the
//! resource arrays. Results are cached until [`QueryEngine::clear`], which
//! the model calls after every recomputation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::ledger::UnitLedger;
use crate::prerequisites::{Prerequisite, PrerequisiteWalker};
use crate::resources::{ResourceTimeline, SUPPLY_BUILDING};
use crate::unit_type::{Cost, UnitType};
use crate::Frame;

/// Bounds on how many units of a type the opponent has at some frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitCountBound {
    /// Units seen and not known dead.
    pub observed: usize,
    /// Observed plus the most that could additionally have been made.
    pub max_possible: usize,
}

/// Resource arrays under the hypothesis that gas was taken at the standard time.
#[derive(Debug, Clone, Copy)]
pub struct GasHypothesis<'a> {
    /// Arrays including the hypothetical refinery.
    pub timeline: &'a ResourceTimeline,
    /// When the hypothetical refinery completes.
    pub refinery_completion: Frame,
}

/// Read-only view of the canonical model state.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    /// Model constants.
    pub config: &'a ModelConfig,
    /// Scheduled ledger.
    pub ledger: &'a UnitLedger,
    /// Canonical resource arrays.
    pub primary: &'a ResourceTimeline,
    /// Alternate gas timing, present while no refinery is known at all.
    pub alternate: Option<GasHypothesis<'a>>,
}

/// Missing prerequisites for a type, against the timeline they are paid from.
struct Chain<'a> {
    timeline: &'a ResourceTimeline,
    ready: Frame,
    prerequisites: Vec<Prerequisite>,
}

impl<'a> QueryContext<'a> {
    fn chain(&self, unit_type: UnitType) -> Result<Chain<'a>> {
        let ledger = self.ledger;
        let depth = self.config.max_prerequisite_depth;
        let gas_lead = self.config.opening.gas_worker_delay;

        let mut walker =
            PrerequisiteWalker::new(|b: UnitType| ledger.earliest_alive_completion(b), depth, gas_lead);
        let ready = walker.require(unit_type, 0)?;
        let prerequisites = walker.finish();

        let needs_gas = prerequisites.iter().any(|p| p.unit_type.is_refinery());
        if let (true, Some(alternate)) = (needs_gas, self.alternate) {
            let completion = alternate.refinery_completion;
            let known = |b: UnitType| {
                if b.is_refinery() {
                    Some(completion)
                } else {
                    ledger.earliest_alive_completion(b)
                }
            };
            let mut walker = PrerequisiteWalker::new(known, depth, gas_lead);
            let ready = walker.require(unit_type, 0)?;
            return Ok(Chain {
                timeline: alternate.timeline,
                ready,
                prerequisites: walker.finish(),
            });
        }

        Ok(Chain {
            timeline: self.primary,
            ready,
            prerequisites,
        })
    }
}

const fn resources_only(cost: Cost) -> Cost {
    Cost::new(cost.minerals, cost.gas, 0)
}

/// A unit placement, with the supply building it needs if any.
#[derive(Debug, Clone, Copy)]
struct Plan {
    start: Frame,
    supply_building: Option<Frame>,
}

impl Plan {
    /// Earliest placement of `cost` at or after `lower`, adding a supply
    /// building when that is earlier than waiting for headroom.
    fn find(resources: &mut ResourceTimeline, cost: Cost, lower: Frame) -> Option<Self> {
        let resources_from = resources.earliest_affordable(resources_only(cost), lower)?;
        let waiting = resources
            .earliest_affordable(Cost::new(0, 0, cost.supply), lower)
            .map(|supply_from| Self {
                start: resources_from.max(supply_from),
                supply_building: None,
            });
        if cost.supply == 0 {
            return waiting;
        }

        let build_time = SUPPLY_BUILDING.build_time();
        let building = resources
            .earliest_affordable(SUPPLY_BUILDING.cost(), (lower - build_time).max(0))
            .and_then(|pylon| {
                resources.apply_supply_building(pylon);
                let start = resources.earliest_affordable(cost, lower.max(pylon + build_time));
                resources.remove_supply_building(pylon);
                start.map(|start| Self {
                    start,
                    supply_building: Some(pylon),
                })
            });

        match (waiting, building) {
            (Some(w), Some(b)) if b.start < w.start => Some(b),
            (w, b) => w.or(b),
        }
    }

    fn commit(self, resources: &mut ResourceTimeline, cost: Cost) {
        if let Some(pylon) = self.supply_building {
            resources.apply_supply_building(pylon);
        }
        resources.debit(cost, self.start);
    }
}

/// Where the next unit of a worst-case run comes from.
#[derive(Debug, Clone, Copy)]
enum Source {
    Existing(usize),
    NewProducer(Frame),
    Unconstrained,
}

/// Query caches.
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    worst_case: HashMap<(UnitType, Frame), UnitCountBound>,
    earliest: BTreeMap<UnitType, Frame>,
    completions: BTreeMap<UnitType, Vec<Frame>>,
}

impl QueryEngine {
    /// Empty caches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached result.
    pub fn clear(&mut self) {
        self.worst_case.clear();
        self.earliest.clear();
        self.completions.clear();
    }

    /// Number of cached results.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.worst_case.len() + self.earliest.len() + self.completions.len()
    }

    /// Earliest frame the opponent could have started a unit of this type,
    /// paying for every missing prerequisite on the way.
    ///
    /// Returns the horizon if it is never affordable.
    pub fn earliest_production_frame(&mut self, ctx: &QueryContext<'_>, unit_type: UnitType) -> Frame {
        if let Some(frame) = self.earliest.get(&unit_type) {
            return *frame;
        }

        let frame = match ctx.chain(unit_type) {
            Ok(chain) => earliest_frame(&chain, unit_type),
            Err(err) => {
                tracing::warn!(?unit_type, %err, "Prerequisite walk failed");
                ctx.primary.horizon()
            }
        };
        self.earliest.insert(unit_type, frame);
        frame
    }

    /// Observed count and upper bound for a type at a frame.
    pub fn worst_case_unit_count(
        &mut self,
        ctx: &QueryContext<'_>,
        unit_type: UnitType,
        frame: Frame,
    ) -> UnitCountBound {
        if let Some(bound) = self.worst_case.get(&(unit_type, frame)) {
            return *bound;
        }

        let observed = ctx.ledger.observed_alive_count(unit_type, frame);
        let additional = self
            .completions(ctx, unit_type)
            .partition_point(|completion| *completion <= frame);
        let bound = UnitCountBound {
            observed,
            max_possible: observed + additional,
        };
        self.worst_case.insert((unit_type, frame), bound);
        bound
    }

    fn completions(&mut self, ctx: &QueryContext<'_>, unit_type: UnitType) -> &[Frame] {
        if !self.completions.contains_key(&unit_type) {
            let start = self.earliest_production_frame(ctx, unit_type);
            let completions = match ctx.chain(unit_type) {
                Ok(chain) => simulate_completions(ctx, &chain, unit_type, start),
                Err(_) => Vec::new(),
            };
            tracing::debug!(
                ?unit_type,
                start,
                count = completions.len(),
                "Simulated worst-case production"
            );
            self.completions.insert(unit_type, completions);
        }
        self.completions
            .get(&unit_type)
            .map_or(&[], Vec::as_slice)
    }

    /// Producers of a type the model believes exist.
    #[must_use]
    pub fn minimum_producer_count(ctx: &QueryContext<'_>, producer: UnitType) -> usize {
        ctx.ledger.alive_count(producer)
    }

    /// Whether any unit of the type is known or implied to have been made.
    #[must_use]
    pub fn has_built(ctx: &QueryContext<'_>, unit_type: UnitType) -> bool {
        !ctx.ledger.of_type(unit_type).is_empty()
    }
}

/// Backward scan for the earliest start with every prerequisite paid for.
///
/// Each prerequisite is a checkpoint at its offset from the unit's start;
/// a checkpoint must afford everything started at or before it.
fn earliest_frame(chain: &Chain<'_>, unit_type: UnitType) -> Frame {
    let timeline = chain.timeline;
    let horizon = timeline.horizon();

    let mut checkpoints: Vec<(Frame, Cost)> = chain
        .prerequisites
        .iter()
        .map(|p| (p.start_frame, resources_only(p.unit_type.cost())))
        .chain(std::iter::once((0, resources_only(unit_type.cost()))))
        .collect();
    checkpoints.sort_by_key(|(offset, _)| *offset);
    let mut total = Cost::ZERO;
    for (_, cost) in &mut checkpoints {
        total += *cost;
        *cost = total;
    }

    let lower = chain.ready.max(0);
    let mut earliest = horizon;
    let mut f = horizon - 1;
    while f >= lower {
        let affordable = checkpoints.iter().all(|&(offset, cost)| {
            let x = f + offset;
            x >= 0 && timeline.affords_at(x as usize, cost)
        });
        if !affordable {
            break;
        }
        earliest = f;
        f -= 1;
    }
    earliest
}

/// Greedy maximum production from `start`, as sorted completion frames.
fn simulate_completions(
    ctx: &QueryContext<'_>,
    chain: &Chain<'_>,
    unit_type: UnitType,
    start: Frame,
) -> Vec<Frame> {
    let horizon = chain.timeline.horizon();
    if start >= horizon {
        return Vec::new();
    }

    let mut resources = chain.timeline.clone();
    let producer_type = unit_type.what_builds();
    let producer_cost = producer_type.cost();
    let producer_time = producer_type.build_time();
    let constrained = !unit_type.is_building()
        && !producer_type.is_worker()
        && !producer_type.is_resource_depot();

    let mut producers: Vec<Frame> = Vec::new();
    for p in &chain.prerequisites {
        let from = start + p.start_frame;
        resources.debit(resources_only(p.unit_type.cost()), from);
        if p.unit_type == producer_type {
            producers.push(from + producer_time);
        }
    }
    if constrained {
        producers.extend(
            ctx.ledger
                .of_type(producer_type)
                .iter()
                .map(|h| ctx.ledger.get(*h))
                .filter(|u| u.is_alive())
                .map(|u| u.next_available_frame),
        );
    }
    let producer_lower = ctx
        .ledger
        .requirements_ready_frame(producer_type)
        .max(start - producer_time)
        .max(0);

    let cost = unit_type.cost();
    let build_time = unit_type.build_time();
    let bound = ctx.config.max_producers_per_type;
    let mut completions = Vec::new();

    for _ in 0..ctx.config.max_worst_case_steps {
        let next = if constrained {
            let existing = producers
                .iter()
                .enumerate()
                .min_by_key(|(i, available)| (**available, *i))
                .and_then(|(i, available)| {
                    Plan::find(&mut resources, cost, (*available).max(start))
                        .map(|plan| (Source::Existing(i), plan))
                });
            let new_producer = if producers.len() < bound {
                resources
                    .earliest_affordable(producer_cost, producer_lower)
                    .and_then(|q| {
                        resources.debit(producer_cost, q);
                        let plan = Plan::find(&mut resources, cost, (q + producer_time).max(start));
                        resources.credit(producer_cost, q);
                        plan.map(|plan| (Source::NewProducer(q), plan))
                    })
            } else {
                None
            };
            match (existing, new_producer) {
                (Some(a), Some(b)) if b.1.start < a.1.start => Some(b),
                (a, b) => a.or(b),
            }
        } else {
            Plan::find(&mut resources, cost, start).map(|plan| (Source::Unconstrained, plan))
        };

        let Some((source, plan)) = next else {
            break;
        };
        let completion = plan.start + build_time;
        if completion >= horizon {
            break;
        }

        if let Source::NewProducer(q) = source {
            resources.debit(producer_cost, q);
        }
        plan.commit(&mut resources, cost);
        match source {
            Source::Existing(i) => producers[i] = completion,
            Source::NewProducer(_) => producers.push(completion),
            Source::Unconstrained => {}
        }
        completions.push(completion);
    }

    completions.sort_unstable();
    completions
}
