//! Fixed-point math utilities for deterministic income simulation.
//!
//! Mining rates are fractional per frame. Accumulating them in floating
//! point would make the baseline arrays platform-dependent, so all income
//! accumulation uses fixed-point arithmetic.

use fixed::types::I32F32;

/// Fixed-point number type for all income math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Build an exact fixed-point ratio `numerator / denominator`.
///
/// # Panics
///
/// Panics if `denominator` is zero.
#[must_use]
pub fn ratio(numerator: i32, denominator: i32) -> Fixed {
    Fixed::from_num(numerator) / Fixed::from_num(denominator)
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_is_exact_for_rates() {
        let rate = ratio(445, 10_000);
        let per_thousand_frames = rate * Fixed::from_num(1000);
        assert_eq!(per_thousand_frames.to_num::<i32>(), 44);

        let sum = (0..1000).fold(Fixed::ZERO, |acc, _| acc + rate);
        assert_eq!(sum.to_num::<i32>(), 44);
    }

    #[test]
    fn test_fixed_serde_preserves_bits() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "fixed_serde")]
            value: Fixed,
        }

        let original = Wrapper {
            value: ratio(71, 1000),
        };
        let encoded = ron::to_string(&original).unwrap();
        let decoded: Wrapper = ron::from_str(&encoded).unwrap();
        assert_eq!(decoded.value.to_bits(), original.value.to_bits());
    }
}
