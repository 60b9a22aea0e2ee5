/// Floating point type used throughout system
pub type Real = f64;

/// Absolute tolerance on simulation time.
///
/// Two instants closer than this are the same instant, and no time step may
/// be this small or smaller.
pub const TIME_EPSILON: Real = 1e-8;

/// Absolute tolerance for "did this value actually change" checks.
///
/// Machine epsilon for `f64`; used for step-size change notices and for
/// deciding that a step size sits on its floor.
pub const FLOAT_EQUALITY_TOLERANCE: Real = f64::EPSILON;

/// Default relative tolerance on the time residual for steady state.
pub const STEADY_RELATIVE_TOLERANCE: Real = 1e-4;

/// True when `a` and `b` name the same instant (absolute, [`TIME_EPSILON`]).
#[inline]
pub fn same_time(a: Real, b: Real) -> bool {
    (a - b).abs() < TIME_EPSILON
}
