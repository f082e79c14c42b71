use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Slack used when deciding whether the last sample still lies inside `hi`.
const GRID_EPSILON: f64 = 1e-9;

/// Upper bound on the number of points a universe may sample.
pub const MAX_UNIVERSE_SAMPLES: usize = 1_000_000;

/// Triangular membership function over control points `(a, b, c)`.
///
/// `a == b` produces a left shoulder (degree 1 for every `x <= b`) and
/// `b == c` a right shoulder (degree 1 for every `x >= b`). Serialized as
/// the array `[a, b, c]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct MembershipFunction {
    a: f64,
    b: f64,
    c: f64,
}

impl MembershipFunction {
    /// Builds a triangle, rejecting non-finite or unordered control points.
    pub fn triangular(a: f64, b: f64, c: f64) -> EngineResult<Self> {
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return Err(EngineError::config(format!(
                "membership control points must be finite, got ({a}, {b}, {c})"
            )));
        }
        if a > b || b > c {
            return Err(EngineError::config(format!(
                "membership control points must satisfy a <= b <= c, got ({a}, {b}, {c})"
            )));
        }
        Ok(Self { a, b, c })
    }

    /// Control points as `[a, b, c]`.
    #[must_use]
    pub const fn points(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    /// Membership degree of `x`, always in `[0, 1]`.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn degree(&self, x: f64) -> f64 {
        let Self { a, b, c } = *self;
        if x.is_nan() {
            return 0.0;
        }
        if a == b && x <= b {
            return 1.0;
        }
        if b == c && x >= b {
            return 1.0;
        }
        if x <= a || x >= c {
            return 0.0;
        }
        if x <= b {
            (x - a) / (b - a)
        } else {
            (c - x) / (c - b)
        }
    }

    /// Whether every control point lies inside the universe bounds.
    #[must_use]
    pub fn fits(&self, universe: &Universe) -> bool {
        self.a >= universe.lo() && self.c <= universe.hi()
    }
}

impl TryFrom<[f64; 3]> for MembershipFunction {
    type Error = EngineError;

    fn try_from([a, b, c]: [f64; 3]) -> EngineResult<Self> {
        Self::triangular(a, b, c)
    }
}

impl From<MembershipFunction> for [f64; 3] {
    fn from(mf: MembershipFunction) -> Self {
        mf.points()
    }
}

/// Term evaluator: membership degree of `x` against one triangular term.
#[must_use]
pub fn membership(mf: &MembershipFunction, x: f64) -> f64 {
    mf.degree(x)
}

/// Discretization of the closed interval `[lo, hi]` with a fixed step.
///
/// Samples are `lo + i * step` for `i = 0..len()`; the last sample never
/// exceeds `hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawUniverse")]
pub struct Universe {
    lo: f64,
    hi: f64,
    step: f64,
}

#[derive(Deserialize)]
struct RawUniverse {
    lo: f64,
    hi: f64,
    #[serde(default = "default_step")]
    step: f64,
}

const fn default_step() -> f64 {
    1.0
}

impl TryFrom<RawUniverse> for Universe {
    type Error = EngineError;

    fn try_from(raw: RawUniverse) -> EngineResult<Self> {
        Self::new(raw.lo, raw.hi, raw.step)
    }
}

impl Universe {
    /// Builds a universe; bounds must be finite with `lo < hi` and `step > 0`,
    /// and the grid may hold at most [`MAX_UNIVERSE_SAMPLES`] points.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(lo: f64, hi: f64, step: f64) -> EngineResult<Self> {
        if !(lo.is_finite() && hi.is_finite() && step.is_finite()) {
            return Err(EngineError::config(format!(
                "universe bounds must be finite, got [{lo}, {hi}] step {step}"
            )));
        }
        if lo >= hi {
            return Err(EngineError::config(format!(
                "universe requires lo < hi, got [{lo}, {hi}]"
            )));
        }
        if step <= 0.0 {
            return Err(EngineError::config(format!(
                "universe step must be positive, got {step}"
            )));
        }
        let intervals = (hi - lo) / step;
        if !intervals.is_finite() || intervals >= MAX_UNIVERSE_SAMPLES as f64 {
            return Err(EngineError::config(format!(
                "universe [{lo}, {hi}] step {step} exceeds {MAX_UNIVERSE_SAMPLES} samples"
            )));
        }
        Ok(Self { lo, hi, step })
    }

    /// Integer-stepped universe `lo..=hi`.
    pub fn integers(lo: i32, hi: i32) -> EngineResult<Self> {
        Self::new(f64::from(lo), f64::from(hi), 1.0)
    }

    /// Lower bound.
    #[must_use]
    pub const fn lo(&self) -> f64 {
        self.lo
    }

    /// Upper bound.
    #[must_use]
    pub const fn hi(&self) -> f64 {
        self.hi
    }

    /// Sampling step.
    #[must_use]
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Number of sampled points.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::len_without_is_empty
    )]
    pub fn len(&self) -> usize {
        let intervals = ((self.hi - self.lo) / self.step + GRID_EPSILON).floor() as usize;
        intervals.saturating_add(1).min(MAX_UNIVERSE_SAMPLES)
    }

    /// Sampled points in ascending order.
    #[allow(clippy::cast_precision_loss)]
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.lo + i as f64 * self.step)
    }

    /// Arithmetic midpoint of the bounds.
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        (self.lo + self.hi) / 2.0
    }

    /// Whether `x` lies inside `[lo, hi]`.
    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        (self.lo..=self.hi).contains(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: f64, b: f64, c: f64) -> MembershipFunction {
        MembershipFunction::triangular(a, b, c).unwrap()
    }

    #[test]
    fn triangle_hits_zero_one_zero() {
        let mf = tri(30.0, 50.0, 70.0);
        assert_eq!(membership(&mf, 30.0), 0.0);
        assert_eq!(membership(&mf, 50.0), 1.0);
        assert_eq!(membership(&mf, 70.0), 0.0);
        assert!((membership(&mf, 40.0) - 0.5).abs() < 1e-12);
        assert!((membership(&mf, 65.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn outside_support_is_zero_without_clamping() {
        let mf = tri(6.0, 18.0, 36.0);
        assert_eq!(mf.degree(-100.0), 0.0);
        assert_eq!(mf.degree(1e9), 0.0);
        assert_eq!(mf.degree(f64::NAN), 0.0);
    }

    #[test]
    fn shoulders_are_flat_on_their_open_side() {
        let left = tri(0.0, 0.0, 12.0);
        assert_eq!(left.degree(0.0), 1.0);
        assert_eq!(left.degree(-5.0), 1.0);
        assert!((left.degree(6.0) - 0.5).abs() < 1e-12);
        assert_eq!(left.degree(12.0), 0.0);

        let right = tri(24.0, 60.0, 60.0);
        assert_eq!(right.degree(60.0), 1.0);
        assert_eq!(right.degree(75.0), 1.0);
        assert_eq!(right.degree(24.0), 0.0);
        assert!((right.degree(42.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rising_segment_is_monotone() {
        let mf = tri(2.0, 5.0, 8.0);
        let mut previous = 0.0;
        let mut x = 2.0;
        while x <= 5.0 {
            let degree = mf.degree(x);
            assert!(degree >= previous);
            assert!((0.0..=1.0).contains(&degree));
            previous = degree;
            x += 0.125;
        }
        let mut x = 5.0;
        while x <= 8.0 {
            let degree = mf.degree(x);
            assert!(degree <= previous);
            previous = degree;
            x += 0.125;
        }
    }

    #[test]
    fn unordered_points_are_rejected() {
        assert!(MembershipFunction::triangular(5.0, 2.0, 8.0)
            .unwrap_err()
            .is_configuration());
        assert!(MembershipFunction::triangular(2.0, 9.0, 8.0).is_err());
        assert!(MembershipFunction::triangular(f64::NAN, 1.0, 2.0).is_err());
    }

    #[test]
    fn serde_uses_point_arrays() {
        let mf: MembershipFunction = serde_json::from_str("[0, 25, 50]").unwrap();
        assert_eq!(mf.points(), [0.0, 25.0, 50.0]);
        assert_eq!(serde_json::to_string(&mf).unwrap(), "[0.0,25.0,50.0]");
        assert!(serde_json::from_str::<MembershipFunction>("[3, 2, 1]").is_err());
    }

    #[test]
    fn universe_samples_inclusive_grid() {
        let universe = Universe::integers(0, 60).unwrap();
        assert_eq!(universe.len(), 61);
        let points: Vec<f64> = universe.points().collect();
        assert_eq!(points.first(), Some(&0.0));
        assert_eq!(points.last(), Some(&60.0));

        let fine = Universe::new(0.0, 1.0, 0.1).unwrap();
        assert_eq!(fine.len(), 11);
        assert!((fine.points().last().unwrap() - 1.0).abs() < 1e-12);

        let ragged = Universe::new(0.0, 1.0, 0.3).unwrap();
        assert_eq!(ragged.len(), 4);
        assert!(ragged.points().all(|p| p <= 1.0));
    }

    #[test]
    fn invalid_universes_are_rejected() {
        assert!(Universe::new(5.0, 5.0, 1.0).is_err());
        assert!(Universe::new(0.0, 10.0, 0.0).is_err());
        assert!(Universe::new(0.0, f64::INFINITY, 1.0).is_err());
        assert!(Universe::new(-1e308, 1e308, 1e-300).unwrap_err().is_configuration());
        assert!(Universe::new(0.0, 1.0, 1e-12).is_err());
        let widest = Universe::new(0.0, 999_999.0, 1.0).unwrap();
        assert_eq!(widest.len(), MAX_UNIVERSE_SAMPLES);
        assert!(serde_json::from_str::<Universe>(r#"{"lo": 10, "hi": 0}"#).is_err());
        let parsed: Universe = serde_json::from_str(r#"{"lo": 0, "hi": 10}"#).unwrap();
        assert_eq!(parsed.step(), 1.0);
    }

    #[test]
    fn fits_checks_universe_bounds() {
        let universe = Universe::integers(0, 10).unwrap();
        assert!(tri(0.0, 0.0, 4.0).fits(&universe));
        assert!(!tri(6.0, 10.0, 12.0).fits(&universe));
        assert!(!tri(-1.0, 0.0, 4.0).fits(&universe));
    }
}
