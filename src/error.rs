//! Error types for the VFE engine.
//!
//! All errors are strongly typed using thiserror so callers can pattern match
//! on the specific condition. Errors are pure data: an operation that returns
//! one has not touched engine state.

use rust_decimal::Decimal;
use thiserror::Error;

/// Inputs rejected before any computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("'{field}' must be greater than zero, got {value}")]
    NotPositive {
        field: &'static str,
        value: Decimal,
    },

    #[error("'{field}' must not be negative, got {value}")]
    Negative {
        field: &'static str,
        value: Decimal,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: &'static str,
    },

    #[error("Fee rate {value} is out of range [0, 1)")]
    FeeRateOutOfRange {
        value: Decimal,
    },

    #[error("Decimal precision {value} is out of range [1, 28]")]
    PrecisionOutOfRange {
        value: u32,
    },

    #[error("'{field}' is not a valid decimal: {input:?}")]
    InvalidDecimal {
        field: &'static str,
        input: String,
    },

    #[error("Redemption of {requested} exceeds outstanding supply {outstanding}")]
    RedemptionExceedsSupply {
        requested: Decimal,
        outstanding: Decimal,
    },

    #[error("Pool reserves must both be positive (in: {reserve_in}, out: {reserve_out})")]
    EmptyReserves {
        reserve_in: Decimal,
        reserve_out: Decimal,
    },

    #[error("Swap output {requested} drains the {available} available reserve")]
    SwapExceedsReserve {
        requested: Decimal,
        available: Decimal,
    },
}

/// Recoverable failures raised while executing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("Insufficient fiat to burn: available {available} < required {required}")]
    InsufficientBacking {
        available: Decimal,
        required: Decimal,
    },

    #[error("No real redemption amount retires {target} fiat (discriminant {discriminant})")]
    UnsolvableTarget {
        target: Decimal,
        discriminant: Decimal,
    },
}

/// Broken arithmetic invariants. Unreachable under correct sequencing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("Division by zero while computing {quantity}")]
    DivisionByZero {
        quantity: &'static str,
    },

    #[error("Decimal overflow in {operation}")]
    Overflow {
        operation: &'static str,
    },

    #[error("Square root of negative value {value}")]
    NegativeRadicand {
        value: Decimal,
    },

    #[error("Transition would leave '{field}' negative ({value})")]
    NegativeBalance {
        field: &'static str,
        value: Decimal,
    },
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    Parse {
        message: String,
    },
}

/// Top-level error type for the VFE engine.
#[derive(Debug, Error)]
pub enum VfeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl VfeError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an invariant violation.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Returns true if the caller can retry with different amounts.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this error signals a programming error in the caller's
    /// sequencing rather than a bad request.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// Result type alias for VFE operations.
pub type VfeResult<T> = Result<T, VfeError>;
