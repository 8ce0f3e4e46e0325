//! Model-wide properties: idempotence, monotonicity, determinism,
//! conservation and death semantics.

use eco_model::income::IncomeSimulator;
use eco_model::prelude::*;
use eco_model::resources::ResourceTimeline;
use eco_test_utils::determinism::{strategies, verify_script_determinism};
use eco_test_utils::fixtures::{
    dark_templar_opening, double_gateway_zealots, play, started_model, ScriptedObservation,
};
use proptest::prelude::*;

const QUERIED: [UnitType; 4] = [
    UnitType::Zealot,
    UnitType::Dragoon,
    UnitType::DarkTemplar,
    UnitType::Gateway,
];

fn answers(model: &mut OpponentEconomicModel) -> Vec<(Frame, UnitCountBound)> {
    QUERIED
        .iter()
        .map(|&t| {
            (
                model.earliest_unit_production_frame(t),
                model.worst_case_unit_count(t, Some(8000)),
            )
        })
        .collect()
}

fn baseline() -> ResourceTimeline {
    let config = ModelConfig::default();
    let mut timeline = ResourceTimeline::new(config.horizon_len());
    IncomeSimulator::new(&config, 24, 0).simulate(&[], None, &mut timeline);
    timeline
}

// =============================================================================
// Idempotence
// =============================================================================

#[test]
fn test_repeated_update_keeps_answers() {
    let (mut model, mut view) = started_model();
    play(&mut model, &mut view, &dark_templar_opening(), 4500);

    let before = answers(&mut model);
    let hash = model.state_hash();
    model.update(&view);
    model.update(&view);

    assert_eq!(answers(&mut model), before);
    assert_eq!(model.state_hash(), hash);
}

#[test]
fn test_repeated_sighting_changes_nothing() {
    let (mut model, mut view) = started_model();
    play(&mut model, &mut view, &double_gateway_zealots(), 3000);
    let hash = model.state_hash();

    for sighting in double_gateway_zealots() {
        model.observe(sighting.observation);
    }
    model.update(&view);

    assert_eq!(model.state_hash(), hash);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_identical_streams_give_identical_answers() {
    let mut runs: Vec<_> = (0..2)
        .map(|_| {
            let (mut model, mut view) = started_model();
            play(&mut model, &mut view, &dark_templar_opening(), 4500);
            model
        })
        .collect();

    let first_implied = runs[0].implied_units();
    assert_eq!(first_implied, runs[1].implied_units());
    let first = answers(&mut runs[0]);
    assert_eq!(first, answers(&mut runs[1]));
}

#[test]
fn test_recorded_session_replays_exactly() {
    let mut model = OpponentEconomicModel::new(ModelConfig::default()).with_recording();
    let mut view = eco_test_utils::fixtures::ScriptedView::new();
    model.initialize(&view);
    play(&mut model, &mut view, &dark_templar_opening(), 4500);

    let log = model.take_observation_log().unwrap();
    assert_eq!(log.observation_count(), dark_templar_opening().len());
    assert_eq!(log.last_frame(), Some(4500));

    let decoded = ObservationLog::from_bytes(&log.to_bytes().unwrap()).unwrap();
    let mut replayed = decoded.replay();
    assert_eq!(replayed.state_hash(), model.state_hash());
    assert_eq!(answers(&mut replayed), answers(&mut model));
}

// =============================================================================
// Death semantics
// =============================================================================

#[test]
fn test_dead_unit_counts_until_death() {
    let script = [
        ScriptedObservation::created(2700, UnitType::Zealot, 1, 2600, true),
        ScriptedObservation::destroyed(3400, UnitType::Zealot, 1),
    ];
    let (mut model, mut view) = started_model();
    play(&mut model, &mut view, &script, 3500);

    assert_eq!(model.worst_case_unit_count(UnitType::Zealot, Some(2599)).observed, 0);
    assert_eq!(model.worst_case_unit_count(UnitType::Zealot, Some(2600)).observed, 1);
    assert_eq!(model.worst_case_unit_count(UnitType::Zealot, Some(3399)).observed, 1);
    assert_eq!(model.worst_case_unit_count(UnitType::Zealot, Some(3400)).observed, 0);
}

#[test]
fn test_unfinished_building_death_refunds() {
    let created = ScriptedObservation::created(2100, UnitType::Gateway, 1, 2000, true);
    let died = ScriptedObservation::destroyed(2500, UnitType::Gateway, 1);

    let (mut alive, mut alive_view) = started_model();
    play(&mut alive, &mut alive_view, &[created.clone()], 2600);
    let (mut killed, mut killed_view) = started_model();
    play(&mut killed, &mut killed_view, &[created, died], 2600);

    let refund = UnitType::Gateway.cost().minerals * ModelConfig::default().cancel_refund_percent / 100;
    let minerals = |model: &OpponentEconomicModel, frame: Frame| {
        model.modelled_resources_at(frame).map(|(m, _, _)| m).unwrap()
    };

    assert_eq!(minerals(&killed, 2499), minerals(&alive, 2499));
    assert_eq!(minerals(&killed, 2500), minerals(&alive, 2500) + refund);
    assert_eq!(minerals(&killed, 6000), minerals(&alive, 6000) + refund);

    assert_eq!(alive.worst_case_unit_count(UnitType::Gateway, Some(2500)).observed, 1);
    assert_eq!(killed.worst_case_unit_count(UnitType::Gateway, Some(2499)).observed, 1);
    assert_eq!(killed.worst_case_unit_count(UnitType::Gateway, Some(2500)).observed, 0);
}

#[test]
fn test_unknown_death_is_recorded_as_dead() {
    let script = [ScriptedObservation::destroyed(4000, UnitType::Zealot, 7)];
    let (mut model, mut view) = started_model();
    play(&mut model, &mut view, &script, 4100);

    assert_eq!(model.ledger().observed().len(), 1);
    let born = 4000 - UnitType::Zealot.build_time();
    assert_eq!(model.worst_case_unit_count(UnitType::Zealot, Some(born)).observed, 1);
    assert_eq!(model.worst_case_unit_count(UnitType::Zealot, Some(4000)).observed, 0);
}

// =============================================================================
// Conservation
// =============================================================================

#[test]
fn test_moved_debit_then_refund_restores_arrays() {
    let original = baseline();
    let mut timeline = original.clone();
    let pair = UnitType::Gateway.cost() + UnitType::Zealot.cost();

    timeline.debit(pair, 2500);
    timeline.move_debit(pair, 2500, 1900);
    assert_ne!(timeline, original);

    timeline.credit(pair, 1900);
    assert_eq!(timeline, original);
}

#[test]
fn test_supply_building_removal_restores_arrays() {
    let original = baseline();
    let mut timeline = original.clone();

    timeline.apply_supply_building(1500);
    timeline.apply_supply_building(3000);
    timeline.remove_supply_building(1500);
    timeline.remove_supply_building(3000);

    assert_eq!(timeline, original);
}

#[test]
fn test_debit_only_touches_later_frames() {
    let original = baseline();
    let mut timeline = original.clone();
    let cost = UnitType::Dragoon.cost();
    timeline.debit(cost, 4000);

    for frame in [0, 1000, 3999] {
        assert_eq!(timeline.at(frame), original.at(frame));
    }
    for frame in [4000, 9000, 19_999] {
        let (m, g, s) = original.at(frame).unwrap();
        assert_eq!(
            timeline.at(frame),
            Some((m - cost.minerals, g - cost.gas, s - cost.supply))
        );
    }
}

/// Rebuild the canonical arrays from scratch: baseline income, every record's
/// spending at its scheduled frame, and every supply building placed.
fn rebuilt_from_ledger(model: &OpponentEconomicModel) -> ResourceTimeline {
    let config = model.config();
    let ledger = model.ledger();
    let refinery = ledger
        .implied()
        .iter()
        .map(|h| ledger.get(*h))
        .filter(|u| u.unit_type.is_refinery())
        .map(|u| u.completion_frame)
        .min();

    let mut timeline = ResourceTimeline::new(config.horizon_len());
    let worker_limit = MatchSnapshot::default().worker_limit();
    IncomeSimulator::new(config, worker_limit, 0).simulate(&[], refinery, &mut timeline);
    for unit in ledger.iter() {
        timeline.apply_unit(unit, config.cancel_refund_percent);
    }
    for &start in model.supply_buildings() {
        timeline.apply_supply_building(start);
    }
    timeline
}

#[test]
fn test_scheduled_spending_matches_canonical_arrays() {
    // Six zealots too close together for one gateway, then a dragoon with no tech seen
    let mut script: Vec<ScriptedObservation> = (0..6)
        .map(|i: Frame| {
            let id = i as u32 + 1;
            ScriptedObservation::created(3100 + 40 * i, UnitType::Zealot, id, 3000 + 40 * i, false)
        })
        .collect();
    script.push(ScriptedObservation::created(5600, UnitType::Dragoon, 7, 5200, false));

    let (mut model, mut view) = started_model();
    play(&mut model, &mut view, &script, 5600);
    assert!(model.enabled(None));

    let gateways = model
        .implied_units()
        .iter()
        .filter(|(t, _)| *t == UnitType::Gateway)
        .count();
    assert!(gateways >= 2, "producers should have been synthesized");

    let rebuilt = rebuilt_from_ledger(&model);
    let mismatched: Vec<Frame> = (0..model.config().horizon_len() as Frame)
        .filter(|&f| rebuilt.at(f) != model.modelled_resources_at(f))
        .collect();
    assert!(mismatched.is_empty(), "arrays differ at {} frames", mismatched.len());
}

// =============================================================================
// Property-based tests using proptest
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Without deaths, the upper bound never shrinks as the frame grows.
    #[test]
    fn prop_worst_case_is_monotonic(
        script in strategies::arb_observation_sequence(5),
        unit_type in strategies::arb_gateway_unit(),
        mut frames in proptest::collection::vec(0i32..15_000, 2..6),
    ) {
        let until = script.last().map_or(1000, |s| s.report_frame + 1);
        let (mut model, mut view) = started_model();
        play(&mut model, &mut view, &script, until);

        frames.sort_unstable();
        let bounds: Vec<usize> = frames
            .iter()
            .map(|&f| model.worst_case_unit_count(unit_type, Some(f)).max_possible)
            .collect();
        prop_assert!(bounds.windows(2).all(|w| w[0] <= w[1]), "{bounds:?} at {frames:?}");
    }

    /// The upper bound always covers what was actually seen.
    #[test]
    fn prop_bound_covers_observed(
        script in strategies::arb_observation_sequence(5),
        frame in 0i32..15_000,
    ) {
        let until = script.last().map_or(1000, |s| s.report_frame + 1);
        let (mut model, mut view) = started_model();
        play(&mut model, &mut view, &script, until);

        for unit_type in QUERIED {
            let bound = model.worst_case_unit_count(unit_type, Some(frame));
            prop_assert!(bound.max_possible >= bound.observed);
        }
    }

    /// Identical streams always reach identical state.
    #[test]
    fn prop_streams_are_deterministic(
        script in strategies::arb_observation_sequence(5),
    ) {
        let until = script.last().map_or(1000, |s| s.report_frame + 1);
        prop_assert!(verify_script_determinism(2, &script, until).is_deterministic);
    }
}
