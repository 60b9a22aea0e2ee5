//! Strictly positive, bounded time step size.

use pf_core::{BoundedValue, FLOAT_EQUALITY_TOLERANCE, Real, TIME_EPSILON};

use crate::error::{SimError, SimResult};
use crate::observe::{Observer, SimEvent};

/// Size of the next time increment to attempt.
///
/// Wraps a [`BoundedValue`] and adds two rules on every write:
/// - the value must stay above [`TIME_EPSILON`];
/// - a change larger than [`FLOAT_EQUALITY_TOLERANCE`] is reported to the
///   observer as [`SimEvent::StepSizeChanged`].
///
/// The bounds' `min` is the step size floor. The only way below it is
/// [`TimeStepSize::land`], which the output synchronizer uses so that a
/// step can end exactly on an output instant or on the end time. Such a
/// landing lasts for one step; [`TimeStepSize::end_landing`] restores the
/// size it replaced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeStepSize {
    bounds: BoundedValue,
    /// Sub-floor size set by `land`; cleared by `end_landing` or `set`.
    /// `bounds` still holds the size in effect before the landing.
    landing: Option<Real>,
}

impl TimeStepSize {
    pub fn new(bounds: BoundedValue) -> SimResult<Self> {
        check_positive(bounds.get())?;
        Ok(Self {
            bounds,
            landing: None,
        })
    }

    /// Constant step size: `min = initial = max`.
    pub fn fixed(dt: Real) -> SimResult<Self> {
        Self::new(BoundedValue::fixed(dt)?)
    }

    pub fn value(&self) -> Real {
        self.landing.unwrap_or(self.bounds.get())
    }

    pub fn min(&self) -> Real {
        self.bounds.min()
    }

    pub fn max(&self) -> Real {
        self.bounds.max()
    }

    pub fn bounds(&self) -> BoundedValue {
        self.bounds
    }

    /// True while a sub-floor landing size is in effect.
    pub fn is_landing(&self) -> bool {
        self.landing.is_some()
    }

    /// Set a new size within `[min, max]` and above [`TIME_EPSILON`].
    ///
    /// On error the previous size is kept.
    pub fn set(&mut self, dt: Real, observer: &dyn Observer) -> SimResult<()> {
        check_positive(dt)?;
        let old = self.value();
        self.bounds.set(dt)?;
        self.landing = None;
        notify_change(old, dt, observer);
        Ok(())
    }

    /// Shrink the step so it ends exactly `dt` after the current time.
    ///
    /// Unlike [`TimeStepSize::set`], `dt` may fall below `min`; positivity
    /// and `max` still hold. A landed sub-floor size counts as being on
    /// the floor and stays in effect until [`TimeStepSize::end_landing`].
    /// A landing at or above `min` is an ordinary, permanent `set`.
    pub fn land(&mut self, dt: Real, observer: &dyn Observer) -> SimResult<()> {
        check_positive(dt)?;
        // `target - current` can round an ulp past `max`
        let dt = dt.min(self.bounds.max());
        if dt >= self.bounds.min() {
            return self.set(dt, observer);
        }
        let old = self.value();
        self.landing = Some(dt);
        notify_change(old, dt, observer);
        Ok(())
    }

    /// Drop a sub-floor landing and go back to the size it replaced.
    ///
    /// No effect unless a landing is in effect.
    pub fn end_landing(&mut self, observer: &dyn Observer) {
        if let Some(landed) = self.landing.take() {
            notify_change(landed, self.bounds.get(), observer);
        }
    }

    /// True when the step cannot be cut any further.
    pub fn at_floor(&self) -> bool {
        self.value() <= self.bounds.min() + FLOAT_EQUALITY_TOLERANCE
            || self.halved() <= TIME_EPSILON
    }

    /// Halve the step size, saturating at the floor.
    pub fn halve(&mut self, observer: &dyn Observer) -> SimResult<()> {
        self.set(self.halved(), observer)
    }

    fn halved(&self) -> Real {
        (0.5 * self.value()).max(self.bounds.min())
    }
}

fn check_positive(dt: Real) -> SimResult<()> {
    // NaN fails this comparison too
    if dt > TIME_EPSILON {
        Ok(())
    } else {
        Err(SimError::StepSizeTooSmall {
            requested: dt,
            epsilon: TIME_EPSILON,
        })
    }
}

fn notify_change(old: Real, new: Real, observer: &dyn Observer) {
    if (new - old).abs() > FLOAT_EQUALITY_TOLERANCE {
        observer.emit(&SimEvent::StepSizeChanged { dt: new });
    }
}
