//! Exact decimal arithmetic with an explicit precision context.
//!
//! Every engine and solver computation goes through a [`NumericContext`]
//! handed in by the caller. There is no process-wide precision setting: two
//! engines with different contexts can run side by side.

use std::fmt;

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{InvariantViolation, ValidationError};

/// Largest precision representable by a 96-bit decimal mantissa.
pub const MAX_PRECISION: u32 = 28;

/// How results are rounded to the context precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Round half to even (banker's rounding).
    #[default]
    HalfEven,
    /// Round half away from zero.
    HalfUp,
    /// Truncate toward zero.
    Down,
}

impl Rounding {
    const fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfEven => RoundingStrategy::MidpointNearestEven,
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::Down => RoundingStrategy::ToZero,
        }
    }
}

impl fmt::Display for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HalfEven => write!(f, "half_even"),
            Self::HalfUp => write!(f, "half_up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// Decimal precision and rounding applied to every arithmetic result.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use vfe::NumericContext;
///
/// let ctx = NumericContext::default();
/// let third = ctx.div(Decimal::ONE, Decimal::from(3), "one third").unwrap();
/// assert_eq!(third.to_string(), "0.3333333333333333333333333333");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumericContext {
    /// Significant digits kept after each operation.
    pub precision: u32,
    /// Rounding applied when a result exceeds `precision`.
    #[serde(default)]
    pub rounding: Rounding,
}

impl Default for NumericContext {
    fn default() -> Self {
        Self {
            precision: MAX_PRECISION,
            rounding: Rounding::HalfEven,
        }
    }
}

impl NumericContext {
    /// Create a context with the given precision and banker's rounding.
    pub fn with_precision(precision: u32) -> Result<Self, ValidationError> {
        let ctx = Self {
            precision,
            rounding: Rounding::HalfEven,
        };
        ctx.validate()?;
        Ok(ctx)
    }

    /// Validate the context.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.precision == 0 || self.precision > MAX_PRECISION {
            return Err(ValidationError::PrecisionOutOfRange {
                value: self.precision,
            });
        }
        Ok(())
    }

    /// Round `value` to the context precision.
    #[must_use]
    pub fn round(&self, value: Decimal) -> Decimal {
        // `round_sf` only fails for zero digits, which `validate` rejects.
        value
            .round_sf_with_strategy(self.precision, self.rounding.strategy())
            .unwrap_or(value)
    }

    /// `a + b`, rounded.
    pub fn add(&self, a: Decimal, b: Decimal) -> Result<Decimal, InvariantViolation> {
        a.checked_add(b)
            .map(|v| self.round(v))
            .ok_or(InvariantViolation::Overflow { operation: "add" })
    }

    /// `a - b`, rounded.
    pub fn sub(&self, a: Decimal, b: Decimal) -> Result<Decimal, InvariantViolation> {
        a.checked_sub(b)
            .map(|v| self.round(v))
            .ok_or(InvariantViolation::Overflow { operation: "sub" })
    }

    /// `a * b`, rounded.
    pub fn mul(&self, a: Decimal, b: Decimal) -> Result<Decimal, InvariantViolation> {
        a.checked_mul(b)
            .map(|v| self.round(v))
            .ok_or(InvariantViolation::Overflow { operation: "mul" })
    }

    /// `a / b`, rounded. `quantity` names the ratio for error reporting.
    pub fn div(
        &self,
        a: Decimal,
        b: Decimal,
        quantity: &'static str,
    ) -> Result<Decimal, InvariantViolation> {
        if b.is_zero() {
            return Err(InvariantViolation::DivisionByZero { quantity });
        }
        a.checked_div(b)
            .map(|v| self.round(v))
            .ok_or(InvariantViolation::Overflow { operation: "div" })
    }

    /// Square root, rounded.
    pub fn sqrt(&self, value: Decimal) -> Result<Decimal, InvariantViolation> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(InvariantViolation::NegativeRadicand { value });
        }
        value
            .sqrt()
            .map(|v| self.round(v))
            .ok_or(InvariantViolation::Overflow { operation: "sqrt" })
    }
}

/// Parse `input` into an exact decimal.
///
/// This is the only string-to-number boundary in the crate. Plain and
/// scientific notation are accepted; anything that would lose digits is
/// rejected rather than rounded.
pub fn parse_decimal(field: &'static str, input: &str) -> Result<Decimal, ValidationError> {
    let trimmed = input.trim();
    let invalid = || ValidationError::InvalidDecimal {
        field,
        input: input.to_string(),
    };
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if trimmed.contains(['e', 'E']) {
        return Decimal::from_scientific(trimmed).map_err(|_| invalid());
    }
    Decimal::from_str_exact(trimmed).map_err(|_| invalid())
}
