//! pf-core: stable foundation for phaseflow.
//!
//! Contains:
//! - numeric (Real + named tolerances + same-instant check)
//! - bounded (range-checked scalar)
//! - error (shared error types)

pub mod bounded;
pub mod error;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use bounded::BoundedValue;
pub use error::{PfError, PfResult};
pub use numeric::*;
