//! Range-checked scalar.

use crate::error::{PfError, PfResult};
use crate::numeric::Real;

/// A scalar that always lies in the inclusive range `[min, max]`.
///
/// Writes outside the range are rejected and leave the stored value
/// untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "BoundsRepr", into = "BoundsRepr"))]
pub struct BoundedValue {
    min: Real,
    value: Real,
    max: Real,
}

impl BoundedValue {
    /// Create a bounded value; fails on NaN, inverted bounds, or an
    /// out-of-range initial value.
    pub fn new(min: Real, value: Real, max: Real) -> PfResult<Self> {
        if min.is_nan() || max.is_nan() {
            return Err(PfError::InvalidArg {
                what: "bounds must not be NaN",
            });
        }
        if min > max {
            return Err(PfError::InvertedBounds { min, max });
        }
        Self::check(value, min, max)?;
        Ok(Self { min, value, max })
    }

    /// Degenerate range `[value, value]`.
    pub fn fixed(value: Real) -> PfResult<Self> {
        Self::new(value, value, value)
    }

    pub fn get(&self) -> Real {
        self.value
    }

    pub fn min(&self) -> Real {
        self.min
    }

    pub fn max(&self) -> Real {
        self.max
    }

    /// Store `value`, or reject it and keep the previous value.
    pub fn set(&mut self, value: Real) -> PfResult<()> {
        Self::check(value, self.min, self.max)?;
        self.value = value;
        Ok(())
    }

    fn check(value: Real, min: Real, max: Real) -> PfResult<()> {
        if value.is_nan() {
            return Err(PfError::NonFinite {
                what: "bounded value",
                value,
            });
        }
        if value < min || value > max {
            return Err(PfError::InvalidBound { value, min, max });
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct BoundsRepr {
    min: Real,
    value: Real,
    max: Real,
}

#[cfg(feature = "serde")]
impl TryFrom<BoundsRepr> for BoundedValue {
    type Error = PfError;

    fn try_from(repr: BoundsRepr) -> Result<Self, Self::Error> {
        Self::new(repr.min, repr.value, repr.max)
    }
}

#[cfg(feature = "serde")]
impl From<BoundedValue> for BoundsRepr {
    fn from(b: BoundedValue) -> Self {
        Self {
            min: b.min,
            value: b.value,
            max: b.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_and_get() {
        let b = BoundedValue::new(0.0, 0.5, 1.0).unwrap();
        assert_eq!(b.get(), 0.5);
        assert_eq!(b.min(), 0.0);
        assert_eq!(b.max(), 1.0);
    }

    #[test]
    fn construct_rejects_out_of_range() {
        assert!(matches!(
            BoundedValue::new(0.0, 1.5, 1.0),
            Err(PfError::InvalidBound { .. })
        ));
        assert!(matches!(
            BoundedValue::new(1.0, 1.0, 0.0),
            Err(PfError::InvertedBounds { .. })
        ));
        assert!(BoundedValue::new(0.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn set_rejects_and_keeps_value() {
        let mut b = BoundedValue::new(1.0, 2.0, 3.0).unwrap();
        assert!(b.set(0.5).is_err());
        assert!(b.set(3.5).is_err());
        assert_eq!(b.get(), 2.0);
        b.set(3.0).unwrap();
        assert_eq!(b.get(), 3.0);
    }

    #[test]
    fn fixed_range_accepts_only_its_value() {
        let mut b = BoundedValue::fixed(1e-3).unwrap();
        assert!(b.set(5e-4).is_err());
        b.set(1e-3).unwrap();
        assert_eq!(b.get(), 1e-3);
    }
}
