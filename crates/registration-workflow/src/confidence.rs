//! OCR confidence normalization
//!
//! The verification engine reports confidence either as a fraction in [0, 1]
//! or as a percentage in [0, 100]. Everything downstream (ledger anchoring,
//! match scoring) works in integer basis points so the two scales can never
//! be confused.
//!
//! A bare number is normalized heuristically: values above 1 are read as a
//! percentage. A tagged value `{ "unit": ..., "value": ... }` is converted
//! exactly by its declared unit.

use serde::{Deserialize, Serialize};

/// Upper bound of the basis point scale (100%)
pub const MAX_BPS: u16 = 10_000;

/// Confidence in basis points, always within [0, 10000]
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u16", into = "u16")]
pub struct BasisPoints(u16);

impl BasisPoints {
    pub const ZERO: BasisPoints = BasisPoints(0);
    pub const MAX: BasisPoints = BasisPoints(MAX_BPS);

    pub fn new(value: u16) -> Option<Self> {
        (value <= MAX_BPS).then_some(BasisPoints(value))
    }

    /// Round and clamp an arbitrary basis point value into range. NaN maps to zero.
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            return BasisPoints::ZERO;
        }
        BasisPoints(value.round().clamp(0.0, MAX_BPS as f64) as u16)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / MAX_BPS as f64
    }
}

impl TryFrom<u16> for BasisPoints {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        BasisPoints::new(value).ok_or_else(|| format!("{} exceeds {} basis points", value, MAX_BPS))
    }
}

impl From<BasisPoints> for u16 {
    fn from(bps: BasisPoints) -> Self {
        bps.0
    }
}

impl std::fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Normalize a bare confidence number to basis points.
///
/// Values above 1 are treated as a percentage and divided by 100 first; the
/// fraction is then scaled by 10000, rounded and clamped to [0, 10000].
pub fn normalize_confidence(raw: f64) -> BasisPoints {
    let fraction = if raw > 1.0 { raw / 100.0 } else { raw };
    BasisPoints::saturating(fraction * MAX_BPS as f64)
}

/// Scale a confidence value is expressed in
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceUnit {
    Fraction,
    Percent,
    Bps,
}

/// Confidence as it arrives at the API boundary
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawConfidence {
    Tagged { unit: ConfidenceUnit, value: f64 },
    Bare(f64),
}

impl RawConfidence {
    pub fn fraction(value: f64) -> Self {
        RawConfidence::Tagged { unit: ConfidenceUnit::Fraction, value }
    }

    pub fn percent(value: f64) -> Self {
        RawConfidence::Tagged { unit: ConfidenceUnit::Percent, value }
    }

    pub fn normalize(&self) -> BasisPoints {
        match *self {
            RawConfidence::Bare(value) => normalize_confidence(value),
            RawConfidence::Tagged { unit: ConfidenceUnit::Fraction, value } => {
                BasisPoints::saturating(value * MAX_BPS as f64)
            }
            RawConfidence::Tagged { unit: ConfidenceUnit::Percent, value } => {
                BasisPoints::saturating(value / 100.0 * MAX_BPS as f64)
            }
            RawConfidence::Tagged { unit: ConfidenceUnit::Bps, value } => {
                BasisPoints::saturating(value)
            }
        }
    }
}

impl From<BasisPoints> for RawConfidence {
    fn from(bps: BasisPoints) -> Self {
        RawConfidence::Tagged { unit: ConfidenceUnit::Bps, value: bps.value() as f64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_values() {
        assert_eq!(normalize_confidence(0.87).value(), 8700);
        assert_eq!(normalize_confidence(87.0).value(), 8700);
        assert_eq!(normalize_confidence(150.0).value(), 10_000);
        assert_eq!(normalize_confidence(-5.0).value(), 0);
        assert_eq!(normalize_confidence(0.91).value(), 9100);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(normalize_confidence(0.0), BasisPoints::ZERO);
        assert_eq!(normalize_confidence(1.0), BasisPoints::MAX);
        // Just above 1 is read as a percentage
        assert_eq!(normalize_confidence(1.5).value(), 150);
        assert_eq!(normalize_confidence(100.0), BasisPoints::MAX);
        assert_eq!(normalize_confidence(0.123456).value(), 1235);
    }

    #[test]
    fn test_non_finite_inputs() {
        assert_eq!(normalize_confidence(f64::NAN), BasisPoints::ZERO);
        assert_eq!(normalize_confidence(f64::INFINITY), BasisPoints::MAX);
        assert_eq!(normalize_confidence(f64::NEG_INFINITY), BasisPoints::ZERO);
    }

    #[test]
    fn test_tagged_units_are_exact() {
        // 0.5 percent would be misread as a fraction by the heuristic
        assert_eq!(RawConfidence::percent(0.5).normalize().value(), 50);
        assert_eq!(RawConfidence::Bare(0.5).normalize().value(), 5000);
        assert_eq!(RawConfidence::fraction(0.87).normalize().value(), 8700);
        assert_eq!(RawConfidence::fraction(1.2).normalize(), BasisPoints::MAX);
    }

    #[test]
    fn test_wire_formats() {
        let bare: RawConfidence = serde_json::from_str("0.91").unwrap();
        assert_eq!(bare, RawConfidence::Bare(0.91));

        let tagged: RawConfidence =
            serde_json::from_str(r#"{"unit":"percent","value":91}"#).unwrap();
        assert_eq!(tagged, RawConfidence::percent(91.0));
        assert_eq!(tagged.normalize().value(), 9100);

        let integer: RawConfidence = serde_json::from_str("87").unwrap();
        assert_eq!(integer.normalize().value(), 8700);
    }

    #[test]
    fn test_basis_points_bounds() {
        assert!(BasisPoints::new(10_000).is_some());
        assert!(BasisPoints::new(10_001).is_none());
        assert!(serde_json::from_str::<BasisPoints>("10001").is_err());
        assert_eq!(serde_json::from_str::<BasisPoints>("8700").unwrap().value(), 8700);
        assert_eq!(BasisPoints::new(8705).unwrap().to_string(), "87.05%");
        assert!((BasisPoints::new(2500).unwrap().as_fraction() - 0.25).abs() < f64::EPSILON);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_normalized_always_in_range(raw in proptest::num::f64::ANY) {
            prop_assert!(normalize_confidence(raw).value() <= MAX_BPS);
        }

        #[test]
        fn prop_normalization_idempotent_once_in_bps(raw in -1000.0..1000.0f64) {
            let once = normalize_confidence(raw);
            let twice = RawConfidence::from(once).normalize();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_fraction_and_percent_agree(percent in 0u32..=100) {
            // For inputs above 1, the heuristic reads the percentage scale
            prop_assume!(percent > 1);
            let from_percent = normalize_confidence(percent as f64);
            let from_fraction = normalize_confidence(percent as f64 / 100.0);
            prop_assert_eq!(from_percent, from_fraction);
        }

        #[test]
        fn prop_monotonic_within_fraction_scale(a in 0.0..=1.0f64, b in 0.0..=1.0f64) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(normalize_confidence(lo) <= normalize_confidence(hi));
        }
    }
}
