//! Numeric capability required of an LLR sample type

use crate::Bit;

/// Operations the decoding recursions need from an LLR sample type.
///
/// Implementations exist for `f64` and `f32` (floating-point decoding) and for `i16` and `i8`
/// (fixed-point decoding). The sign convention is identical for all types: a negative LLR maps to
/// bit `One`, a non-negative LLR to bit `Zero`. The max-star correction terms are exact for the
/// floating-point types; the fixed-point types return a zero correction, so they always decode
/// with the Max-Log-MAP approximation regardless of the configured algorithm.
pub trait Llr:
    Copy + PartialOrd + std::ops::Neg<Output = Self> + std::fmt::Debug + Send + Sync + 'static
{
    /// Additive identity.
    const ZERO: Self;

    /// Large negative value standing in for an unreachable path metric.
    ///
    /// Deliberately finite so that recentering (subtracting one metric from another) can never
    /// form a NaN, and far enough from the type's minimum that sums of two such values do not
    /// overflow.
    const NEG_SATURATION: Self;

    /// Returns `self + rhs`, saturating at the numeric bounds for fixed-point types.
    fn add_sat(self, rhs: Self) -> Self;

    /// Returns `self - rhs`, saturating at the numeric bounds for fixed-point types.
    fn sub_sat(self, rhs: Self) -> Self;

    /// Returns `self / 2` (arithmetic shift for fixed-point types).
    fn div2(self) -> Self;

    /// Returns the larger of `self` and `rhs`.
    fn max_val(self, rhs: Self) -> Self;

    /// Returns the smaller of `self` and `rhs`.
    fn min_val(self, rhs: Self) -> Self;

    /// Returns the magnitude of `self`, saturating for fixed-point types.
    fn abs_val(self) -> Self;

    /// Returns `true` iff `self` is strictly negative.
    fn is_negative(self) -> bool;

    /// Returns the hard decision for `self`: `One` iff strictly negative.
    fn to_hard_bit(self) -> Bit {
        if self.is_negative() {
            Bit::One
        } else {
            Bit::Zero
        }
    }

    /// Returns the Linear-Log-MAP max-star correction term (Valenti & Sun, 2001) for a given
    /// absolute metric difference.
    fn max_star_linear_correction(abs_diff: Self) -> Self;

    /// Returns the exact Log-MAP max-star correction term `ln(1 + exp(-abs_diff))` for a given
    /// absolute metric difference.
    fn max_star_exact_correction(abs_diff: Self) -> Self;
}

/// Threshold of the piecewise-linear Log-MAP correction.
const LINEAR_CORRECTION_THRESH: f64 = 2.506_816_400_220_01;

/// Slope of the piecewise-linear Log-MAP correction.
const LINEAR_CORRECTION_SLOPE: f64 = -0.249_041_818_917_1;

impl Llr for f64 {
    const ZERO: Self = 0.0;
    const NEG_SATURATION: Self = -1e100;

    fn add_sat(self, rhs: Self) -> Self {
        self + rhs
    }

    fn sub_sat(self, rhs: Self) -> Self {
        self - rhs
    }

    fn div2(self) -> Self {
        0.5 * self
    }

    fn max_val(self, rhs: Self) -> Self {
        self.max(rhs)
    }

    fn min_val(self, rhs: Self) -> Self {
        self.min(rhs)
    }

    fn abs_val(self) -> Self {
        self.abs()
    }

    fn is_negative(self) -> bool {
        self < 0.0
    }

    fn max_star_linear_correction(abs_diff: Self) -> Self {
        if abs_diff > LINEAR_CORRECTION_THRESH {
            0.0
        } else {
            LINEAR_CORRECTION_SLOPE * (abs_diff - LINEAR_CORRECTION_THRESH)
        }
    }

    fn max_star_exact_correction(abs_diff: Self) -> Self {
        (-abs_diff).exp().ln_1p()
    }
}

impl Llr for f32 {
    const ZERO: Self = 0.0;
    const NEG_SATURATION: Self = -1e30;

    fn add_sat(self, rhs: Self) -> Self {
        self + rhs
    }

    fn sub_sat(self, rhs: Self) -> Self {
        self - rhs
    }

    fn div2(self) -> Self {
        0.5 * self
    }

    fn max_val(self, rhs: Self) -> Self {
        self.max(rhs)
    }

    fn min_val(self, rhs: Self) -> Self {
        self.min(rhs)
    }

    fn abs_val(self) -> Self {
        self.abs()
    }

    fn is_negative(self) -> bool {
        self < 0.0
    }

    #[allow(clippy::cast_possible_truncation)]
    fn max_star_linear_correction(abs_diff: Self) -> Self {
        if f64::from(abs_diff) > LINEAR_CORRECTION_THRESH {
            0.0
        } else {
            (LINEAR_CORRECTION_SLOPE * (f64::from(abs_diff) - LINEAR_CORRECTION_THRESH)) as f32
        }
    }

    fn max_star_exact_correction(abs_diff: Self) -> Self {
        (-abs_diff).exp().ln_1p()
    }
}

impl Llr for i16 {
    const ZERO: Self = 0;
    const NEG_SATURATION: Self = i16::MIN / 2;

    fn add_sat(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn sub_sat(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    fn div2(self) -> Self {
        self >> 1
    }

    fn max_val(self, rhs: Self) -> Self {
        self.max(rhs)
    }

    fn min_val(self, rhs: Self) -> Self {
        self.min(rhs)
    }

    fn abs_val(self) -> Self {
        self.saturating_abs()
    }

    fn is_negative(self) -> bool {
        self < 0
    }

    fn max_star_linear_correction(_abs_diff: Self) -> Self {
        0
    }

    fn max_star_exact_correction(_abs_diff: Self) -> Self {
        0
    }
}

impl Llr for i8 {
    const ZERO: Self = 0;
    const NEG_SATURATION: Self = i8::MIN / 2;

    fn add_sat(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn sub_sat(self, rhs: Self) -> Self {
        self.saturating_sub(rhs)
    }

    fn div2(self) -> Self {
        self >> 1
    }

    fn max_val(self, rhs: Self) -> Self {
        self.max(rhs)
    }

    fn min_val(self, rhs: Self) -> Self {
        self.min(rhs)
    }

    fn abs_val(self) -> Self {
        self.saturating_abs()
    }

    fn is_negative(self) -> bool {
        self < 0
    }

    fn max_star_linear_correction(_abs_diff: Self) -> Self {
        0
    }

    fn max_star_exact_correction(_abs_diff: Self) -> Self {
        0
    }
}
