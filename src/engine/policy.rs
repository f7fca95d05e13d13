//! Derived ratios, the adaptive issuance multiplier, and the fee split.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::VfeResult;
use crate::numeric::NumericContext;

use super::state::EngineState;

/// Price of one redemption token in fiat units (`fiat_supply / redemption_supply`).
pub fn price_ratio(state: &EngineState, ctx: &NumericContext) -> VfeResult<Decimal> {
    Ok(ctx.div(state.fiat_supply, state.redemption_supply, "price ratio P_R")?)
}

/// Price ratio relative to the oracle peg.
pub fn flux_ratio(state: &EngineState, ctx: &NumericContext) -> VfeResult<Decimal> {
    let p_r = price_ratio(state, ctx)?;
    Ok(ctx.div(p_r, state.oracle_rate, "flux ratio")?)
}

/// Fiat supply per unit of deployed collateral.
pub fn reserve_ratio(state: &EngineState, ctx: &NumericContext) -> VfeResult<Decimal> {
    Ok(ctx.div(state.fiat_supply, state.usdc_supply, "reserve ratio")?)
}

/// Redemption tokens minted per unit of collateral deployed.
///
/// - No collateral deployed yet: `1`.
/// - Price above peg while fiat supply equals collateral: `1`.
/// - Otherwise the flux ratio.
///
/// Outside the bootstrap branch an empty redemption supply is an invariant
/// violation and surfaces as a fatal error.
pub fn lambda(state: &EngineState, ctx: &NumericContext) -> VfeResult<Decimal> {
    if state.usdc_supply.is_zero() {
        return Ok(Decimal::ONE);
    }
    let flux = flux_ratio(state, ctx)?;
    let reserve = reserve_ratio(state, ctx)?;
    if flux > Decimal::ONE && reserve == Decimal::ONE {
        return Ok(Decimal::ONE);
    }
    Ok(flux)
}

/// A collateral amount split into fee and net parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Amount before fees.
    pub gross: Decimal,
    /// `gross * fee_rate`.
    pub fee: Decimal,
    /// `gross - fee`.
    pub net: Decimal,
}

/// Split `gross` at `fee_rate`.
pub fn split_fee(gross: Decimal, fee_rate: Decimal, ctx: &NumericContext) -> VfeResult<FeeSplit> {
    let fee = ctx.mul(gross, fee_rate)?;
    let net = ctx.sub(gross, fee)?;
    Ok(FeeSplit { gross, fee, net })
}
