//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the model produces identical
//! state given identical observations.
//!
//! # Testing Strategy
//!
//! The model must be a pure function of its observation stream. Sources of
//! non-determinism include:
//!
//! - **Floating-point math**: income uses fixed-point via
//!   [`eco_model::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: the ledger indexes use ordered maps and
//!   stable arenas; only the memo caches use hash maps, and they are never
//!   iterated.
//!
//! - **Wall-clock time**: the model only knows the frames the host gives it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use eco_model::prelude::*;

use crate::fixtures::{play, started_model, ScriptedObservation};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of frames played.
    pub frames: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic model).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Model is non-deterministic!\n\
                 Runs: {}\n\
                 Frames: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.frames,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a stepped process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `frames` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one frame
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use eco_test_utils::determinism::verify_determinism;
/// use eco_test_utils::fixtures::{started_model, ScriptedView};
///
/// let result = verify_determinism(
///     3,
///     500,
///     started_model,
///     |(model, view)| {
///         view.set_frame(view.current_frame() + 1);
///         model.update(view);
///     },
///     |(model, _)| model.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    frames: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..frames {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        frames,
    }
}

/// Play a script to `until` on `runs` fresh models and compare the final
/// state hashes.
#[must_use]
pub fn verify_script_determinism(
    runs: usize,
    script: &[ScriptedObservation],
    until: Frame,
) -> DeterminismResult {
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let (mut model, mut view) = started_model();
            play(&mut model, &mut view, script, until);
            model.state_hash()
        })
        .collect();

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        frames: u64::try_from(until.max(0)).unwrap_or_default(),
    }
}

/// Play the same script on several threads at once and collect final hashes.
///
/// Catches state that leaks between models through globals or thread
/// locals.
#[must_use]
pub fn verify_script_determinism_parallel(
    runs: usize,
    script: &[ScriptedObservation],
    until: Frame,
) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..runs)
            .map(|_| {
                s.spawn(|| {
                    let (mut model, mut view) = started_model();
                    play(&mut model, &mut view, script, until);
                    model.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.len() == runs && hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        frames: u64::try_from(until.max(0)).unwrap_or_default(),
    }
}

/// Compare two plays of a script frame by frame, finding the first frame
/// whose state hashes differ.
///
/// Observations must be sorted by report frame.
#[must_use]
pub fn find_first_divergence(script: &[ScriptedObservation], until: Frame) -> Option<Frame> {
    let (mut first, mut first_view) = started_model();
    let (mut second, mut second_view) = started_model();

    if first.state_hash() != second.state_hash() {
        return Some(first_view.current_frame());
    }

    let mut pending = script.iter().peekable();
    for frame in first_view.current_frame()..=until {
        first_view.set_frame(frame);
        second_view.set_frame(frame);
        while let Some(next) = pending.next_if(|s| s.report_frame <= frame) {
            first.observe(next.observation.clone());
            second.observe(next.observation.clone());
        }
        first.update(&first_view);
        second.update(&second_view);
        if first.state_hash() != second.state_hash() {
            return Some(frame);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for model testing.
///
/// These strategies generate random but reproducible observation streams
/// for property-based testing.
pub mod strategies {
    use eco_model::prelude::*;
    use proptest::prelude::*;

    use crate::fixtures::ScriptedObservation;

    /// Units a one-base Protoss opponent fields early.
    pub const GATEWAY_UNITS: [UnitType; 2] = [UnitType::Zealot, UnitType::Dragoon];

    /// Buildings a one-base Protoss opponent puts down early.
    pub const EARLY_BUILDINGS: [UnitType; 4] = [
        UnitType::Gateway,
        UnitType::Assimilator,
        UnitType::CyberneticsCore,
        UnitType::Forge,
    ];

    /// Generate a creation frame within the model's playable window.
    pub fn arb_creation_frame() -> impl Strategy<Value = Frame> {
        1500i32..9000i32
    }

    /// Generate a gateway unit type.
    pub fn arb_gateway_unit() -> impl Strategy<Value = UnitType> {
        prop::sample::select(GATEWAY_UNITS.to_vec())
    }

    /// Generate an early building type.
    pub fn arb_early_building() -> impl Strategy<Value = UnitType> {
        prop::sample::select(EARLY_BUILDINGS.to_vec())
    }

    /// Generate an early unit or building type.
    pub fn arb_early_type() -> impl Strategy<Value = UnitType> {
        prop_oneof![arb_gateway_unit(), arb_early_building()]
    }

    /// Generate a sighting, reported some frames after the unit's creation.
    pub fn arb_sighting(id: u32) -> impl Strategy<Value = ScriptedObservation> {
        (arb_early_type(), arb_creation_frame(), 0i32..400, any::<bool>()).prop_map(
            move |(unit_type, creation, delay, known)| {
                ScriptedObservation::created(creation + delay, unit_type, id, creation, known)
            },
        )
    }

    /// Generate a sighting stream sorted by report frame, with unique ids.
    pub fn arb_observation_sequence(
        max_len: usize,
    ) -> impl Strategy<Value = Vec<ScriptedObservation>> {
        proptest::collection::vec(
            (arb_early_type(), arb_creation_frame(), 0i32..400, any::<bool>()),
            0..max_len,
        )
        .prop_map(|raw| {
            let mut script: Vec<ScriptedObservation> = raw
                .into_iter()
                .zip(1u32..)
                .map(|((unit_type, creation, delay, known), id)| {
                    ScriptedObservation::created(creation + delay, unit_type, id, creation, known)
                })
                .collect();
            script.sort_by_key(|s| s.report_frame);
            script
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{dark_templar_opening, double_gateway_zealots, ScriptedView};
    use proptest::prelude::*;

    // =========================================================================
    // Unit tests: harness
    // =========================================================================

    #[test]
    fn test_compute_hash_consistency() {
        let hash1 = compute_hash(&(UnitType::Gateway, 1800));
        let hash2 = compute_hash(&(UnitType::Gateway, 1800));
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_compute_hash_different_values() {
        let hash1 = compute_hash(&(UnitType::Gateway, 1800));
        let hash2 = compute_hash(&(UnitType::Gateway, 1801));
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_unique_hashes_detects_divergence() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![3, 1, 3],
            frames: 10,
        };
        assert_eq!(result.unique_hashes(), vec![1, 3]);
    }

    #[test]
    #[should_panic(expected = "non-deterministic")]
    fn test_assert_deterministic_panics_on_divergence() {
        DeterminismResult {
            is_deterministic: false,
            hashes: vec![1, 2],
            frames: 10,
        }
        .assert_deterministic();
    }

    // =========================================================================
    // Integration tests: model determinism
    // =========================================================================

    #[test]
    fn test_idle_model_determinism() {
        let result = verify_determinism(
            3,
            300,
            started_model,
            |(model, view): &mut (OpponentEconomicModel, ScriptedView)| {
                view.set_frame(view.current_frame() + 1);
                model.update(&*view);
            },
            |(model, _)| model.state_hash(),
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_dark_templar_opening_determinism() {
        verify_script_determinism(3, &dark_templar_opening(), 4500).assert_deterministic();
    }

    #[test]
    fn test_parallel_double_gateway_determinism() {
        let result = verify_script_determinism_parallel(4, &double_gateway_zealots(), 3000);
        assert_eq!(result.hashes.len(), 4);
        result.assert_deterministic();
    }

    #[test]
    fn test_no_divergence_between_identical_plays() {
        assert_eq!(find_first_divergence(&double_gateway_zealots(), 2000), None);
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Any sighting stream replays to the same state.
        #[test]
        fn prop_sighting_streams_are_deterministic(
            script in strategies::arb_observation_sequence(6),
        ) {
            let until = script.last().map_or(2000, |s| s.report_frame + 1);
            let result = verify_script_determinism(2, &script, until);
            prop_assert!(result.is_deterministic);
        }

        /// Generated streams are sorted by report frame.
        #[test]
        fn prop_generated_streams_are_sorted(
            script in strategies::arb_observation_sequence(10),
        ) {
            prop_assert!(script.windows(2).all(|w| w[0].report_frame <= w[1].report_frame));
        }
    }
}
