use thiserror::Error;

pub type PfResult<T> = Result<T, PfError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PfError {
    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Value {value} outside bounds [{min}, {max}]")]
    InvalidBound { value: f64, min: f64, max: f64 },

    #[error("Inverted bounds: min {min} > max {max}")]
    InvertedBounds { min: f64, max: f64 },
}
