//! Optimal redemption solver.
//!
//! Finds the redemption amount `r` whose pool leg plus supply burn consumes
//! exactly a target amount of fiat `f_e`. With pool reserves `(x_r, y_f)` and
//! price ratio `p_r`, requiring `y_f·r/(x_r − r) + p_r·r = f_e` gives
//!
//! ```text
//! p_r·r² − (f_e + y_f + p_r·x_r)·r + f_e·x_r = 0
//! ```
//!
//! The smaller root is the economically valid one; the larger overshoots the
//! pool. The solver only reads state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::policy;
use crate::engine::EngineState;
use crate::error::{ExecutionError, ValidationError, VfeResult};
use crate::numeric::NumericContext;

/// Coefficients of `a·r² + b·r + c = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadraticCoefficients {
    /// `p_r`
    pub a: Decimal,
    /// `−(f_e + y_f + p_r·x_r)`
    pub b: Decimal,
    /// `f_e·x_r`
    pub c: Decimal,
}

impl QuadraticCoefficients {
    /// Build the redemption quadratic for `fiat_target` over `state`.
    pub fn for_target(
        fiat_target: Decimal,
        state: &EngineState,
        ctx: &NumericContext,
    ) -> VfeResult<Self> {
        let x_r = state.redemption_pool;
        let y_f = state.fiat_pool;
        let p_r = policy::price_ratio(state, ctx)?;

        let pool_value = ctx.mul(p_r, x_r)?;
        let sum = ctx.add(ctx.add(fiat_target, y_f)?, pool_value)?;
        Ok(Self {
            a: p_r,
            b: -sum,
            c: ctx.mul(fiat_target, x_r)?,
        })
    }

    /// `b² − 4ac`
    ///
    /// Squares the raw coefficients, so `|b|` above roughly `2.8e14`
    /// overflows. Use [`Self::normalized`] first for large pools.
    pub fn discriminant(&self, ctx: &NumericContext) -> VfeResult<Decimal> {
        let b_squared = ctx.mul(self.b, self.b)?;
        let four_ac = ctx.mul(ctx.mul(Decimal::from(4), self.a)?, self.c)?;
        Ok(ctx.sub(b_squared, four_ac)?)
    }

    /// The same equation divided through by `|b|`, so `b` is `±1`.
    pub fn normalized(&self, ctx: &NumericContext) -> VfeResult<Self> {
        let scale = self.b.abs();
        Ok(Self {
            a: ctx.div(self.a, scale, "normalized quadratic a")?,
            b: ctx.div(self.b, scale, "normalized quadratic b")?,
            c: ctx.div(self.c, scale, "normalized quadratic c")?,
        })
    }

    /// The smaller real root, `(−b − √disc) / 2a`.
    ///
    /// Solved on the normalized equation. For `b < 0` the root is taken as
    /// `2c / (−b + √disc)`, which avoids cancellation when `4ac` is tiny
    /// next to `b²`. A negative discriminant is reported as an unsolvable
    /// target rather than truncated.
    pub fn smaller_root(&self, fiat_target: Decimal, ctx: &NumericContext) -> VfeResult<Decimal> {
        let q = self.normalized(ctx)?;
        let discriminant = q.discriminant(ctx)?;
        if discriminant.is_sign_negative() && !discriminant.is_zero() {
            warn!(target_fiat = %fiat_target, discriminant = %discriminant, "no real redemption root");
            return Err(ExecutionError::UnsolvableTarget {
                target: fiat_target,
                discriminant,
            }
            .into());
        }
        let root = ctx.sqrt(discriminant)?;
        let two = Decimal::from(2);
        if q.b.is_sign_negative() {
            let denominator = ctx.add(-q.b, root)?;
            return Ok(ctx.div(ctx.mul(two, q.c)?, denominator, "redemption root")?);
        }
        let numerator = ctx.sub(-q.b, root)?;
        Ok(ctx.div(numerator, ctx.mul(two, q.a)?, "redemption root")?)
    }
}

/// Redemption amount that retires `fiat_target` fiat from `state`.
pub fn solve_optimal_redemption(
    fiat_target: Decimal,
    state: &EngineState,
    ctx: &NumericContext,
) -> VfeResult<Decimal> {
    if fiat_target.is_sign_negative() && !fiat_target.is_zero() {
        return Err(ValidationError::Negative {
            field: "fiat_target",
            value: fiat_target,
        }
        .into());
    }
    let coefficients = QuadraticCoefficients::for_target(fiat_target, state, ctx)?;
    let redemption = coefficients.smaller_root(fiat_target, ctx)?;
    debug!(target_fiat = %fiat_target, redemption = %redemption, "optimal redemption solved");
    Ok(redemption)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state(
        redemption_pool: Decimal,
        fiat_pool: Decimal,
        redemption_supply: Decimal,
        fiat_supply: Decimal,
    ) -> EngineState {
        EngineState {
            usdc_supply: redemption_supply,
            redemption_supply,
            fiat_supply,
            redemption_pool,
            fiat_pool,
            ..EngineState::empty(dec!(4), Decimal::ZERO)
        }
    }

    #[test]
    fn coefficients_match_definition() {
        let ctx = NumericContext::default();
        let s = state(dec!(1000), dec!(1000), dec!(1000), dec!(4000));
        let q = QuadraticCoefficients::for_target(dec!(100), &s, &ctx).unwrap();
        assert_eq!(q.a, dec!(4));
        assert_eq!(q.b, dec!(-5100));
        assert_eq!(q.c, dec!(100000));
    }

    #[test]
    fn root_satisfies_pool_plus_burn_identity() {
        let ctx = NumericContext::default();
        let s = state(dec!(1000), dec!(1000), dec!(1000), dec!(4000));
        let r = solve_optimal_redemption(dec!(100), &s, &ctx).unwrap();
        // y·r/(x − r) + p·r == f_e
        let pool_leg = dec!(1000) * r / (dec!(1000) - r);
        let total = pool_leg + dec!(4) * r;
        assert!((total - dec!(100)).abs() < dec!(0.000000000000000001));
        assert!(r > Decimal::ZERO && r < dec!(1000));
    }

    #[test]
    fn zero_target_needs_no_redemption() {
        let ctx = NumericContext::default();
        let s = state(dec!(500), dec!(800), dec!(600), dec!(1200));
        let r = solve_optimal_redemption(Decimal::ZERO, &s, &ctx).unwrap();
        assert!(r.abs() < dec!(0.0000000000000000001));
    }

    #[test]
    fn negative_discriminant_is_unsolvable() {
        let ctx = NumericContext::default();
        let q = QuadraticCoefficients {
            a: dec!(1),
            b: dec!(1),
            c: dec!(1),
        };
        let err = q.smaller_root(dec!(1), &ctx).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            crate::VfeError::Execution(ExecutionError::UnsolvableTarget { .. })
        ));
    }

    #[test]
    fn empty_supply_is_fatal() {
        let ctx = NumericContext::default();
        let s = state(dec!(10), dec!(10), Decimal::ZERO, Decimal::ZERO);
        let err = solve_optimal_redemption(dec!(5), &s, &ctx).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn normalized_coefficients_have_unit_b() {
        let ctx = NumericContext::default();
        let q = QuadraticCoefficients {
            a: dec!(4),
            b: dec!(-5100),
            c: dec!(100000),
        };
        let n = q.normalized(&ctx).unwrap();
        assert_eq!(n.b, dec!(-1));
        assert_eq!(n.a, ctx.div(dec!(4), dec!(5100), "a").unwrap());
        assert_eq!(n.c, ctx.div(dec!(100000), dec!(5100), "c").unwrap());
    }

    #[test]
    fn large_pool_solves_without_overflow() {
        let ctx = NumericContext::default();
        let s = state(
            dec!(10000000000000),
            dec!(200000000000000),
            dec!(10000000000000),
            dec!(1200000000000000),
        );
        let q = QuadraticCoefficients::for_target(dec!(100), &s, &ctx).unwrap();
        // b is about -1.4e15; squaring it directly leaves the decimal range.
        assert!(q.discriminant(&ctx).unwrap_err().is_fatal());

        let r = solve_optimal_redemption(dec!(100), &s, &ctx).unwrap();
        let pool_leg = ctx
            .div(ctx.mul(s.fiat_pool, r).unwrap(), s.redemption_pool - r, "leg")
            .unwrap();
        let total = pool_leg + dec!(120) * r;
        assert!((total - dec!(100)).abs() < dec!(0.000000000001));
        assert!(r > dec!(0.71) && r < dec!(0.72));
    }

    #[test]
    fn negative_target_is_rejected() {
        let ctx = NumericContext::default();
        let s = state(dec!(10), dec!(10), dec!(10), dec!(10));
        assert!(solve_optimal_redemption(dec!(-1), &s, &ctx)
            .unwrap_err()
            .is_validation());
    }
}
