//! Constant-product (x·y = k) swap primitives.
//!
//! The pool is fee-free: fees are charged on the issuance leg, never inside
//! the pool, so both directions preserve the reserve product up to rounding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, VfeResult};
use crate::numeric::NumericContext;

/// A reserve pair seen from the side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    /// Reserve of the token entering the pool.
    pub reserve_in: Decimal,
    /// Reserve of the token leaving the pool.
    pub reserve_out: Decimal,
}

impl Reserves {
    /// Create a reserve pair.
    #[must_use]
    pub const fn new(reserve_in: Decimal, reserve_out: Decimal) -> Self {
        Self {
            reserve_in,
            reserve_out,
        }
    }

    /// Both reserves must be strictly positive before quoting.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.reserve_in <= Decimal::ZERO || self.reserve_out <= Decimal::ZERO {
            return Err(ValidationError::EmptyReserves {
                reserve_in: self.reserve_in,
                reserve_out: self.reserve_out,
            });
        }
        Ok(())
    }

    /// The constant-product invariant `k`.
    pub fn product(&self, ctx: &NumericContext) -> VfeResult<Decimal> {
        Ok(ctx.mul(self.reserve_in, self.reserve_out)?)
    }
}

/// Result of a given-in quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardQuote {
    /// Tokens paid out of the pool.
    pub amount_out: Decimal,
    /// Reserves after the trade.
    pub reserves: Reserves,
}

/// Result of a given-out quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReverseQuote {
    /// Tokens the pool releases from its `reserve_in` side.
    pub amount_in: Decimal,
    /// Reserves after the trade.
    pub reserves: Reserves,
}

fn require_non_negative(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

/// Given `delta_in` tokens entering, compute the tokens leaving.
///
/// `out = current_out - current_in * current_out / (current_in + delta_in)`
pub fn swap_given_in(
    delta_in: Decimal,
    pool: Reserves,
    ctx: &NumericContext,
) -> VfeResult<ForwardQuote> {
    pool.validate()?;
    require_non_negative("delta_in", delta_in)?;

    let k = pool.product(ctx)?;
    let new_in = ctx.add(pool.reserve_in, delta_in)?;
    let remaining = ctx.div(k, new_in, "swap output reserve")?;
    let amount_out = ctx.sub(pool.reserve_out, remaining)?;
    let new_out = ctx.sub(pool.reserve_out, amount_out)?;

    Ok(ForwardQuote {
        amount_out,
        reserves: Reserves::new(new_in, new_out),
    })
}

/// Given `delta_out` added to the `reserve_out` side, solve the same
/// identity for the amount released from the `reserve_in` side.
///
/// `in_needed = current_in - current_in * current_out / (current_out + delta_out)`
/// and the pool moves to `(current_in - in_needed, current_out + delta_out)`.
/// Applied to the reserves produced by [`swap_given_in`] with that quote's
/// output, this recovers the original input and reserves.
pub fn swap_given_out(
    delta_out: Decimal,
    pool: Reserves,
    ctx: &NumericContext,
) -> VfeResult<ReverseQuote> {
    pool.validate()?;
    require_non_negative("delta_out", delta_out)?;

    let k = pool.product(ctx)?;
    let new_out = ctx.add(pool.reserve_out, delta_out)?;
    let remaining = ctx.div(k, new_out, "swap input reserve")?;
    let amount_in = ctx.sub(pool.reserve_in, remaining)?;
    let new_in = ctx.sub(pool.reserve_in, amount_in)?;

    if new_in <= Decimal::ZERO {
        return Err(ValidationError::SwapExceedsReserve {
            requested: amount_in,
            available: pool.reserve_in,
        }
        .into());
    }

    Ok(ReverseQuote {
        amount_in,
        reserves: Reserves::new(new_in, new_out),
    })
}
