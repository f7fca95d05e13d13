//! Protocol state record and read-only snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amm::Reserves;
use crate::error::{InvariantViolation, ValidationError};
use crate::numeric::NumericContext;

use super::RunId;

/// All mutable protocol state of one simulation run.
///
/// The record is `Copy`: operations stage a complete post-image, validate it,
/// and commit it with a single assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// Fraction taken on every collateral deployment and withdrawal.
    #[serde(with = "rust_decimal::serde::str")]
    pub fee_rate: Decimal,
    /// Cumulative fee revenue in collateral units.
    #[serde(with = "rust_decimal::serde::str")]
    pub usdc_fees: Decimal,
    /// Collateral deployed and still backing issued tokens.
    #[serde(with = "rust_decimal::serde::str")]
    pub usdc_supply: Decimal,
    /// Outstanding redemption-token supply.
    #[serde(with = "rust_decimal::serde::str")]
    pub redemption_supply: Decimal,
    /// Outstanding fiat-token supply.
    #[serde(with = "rust_decimal::serde::str")]
    pub fiat_supply: Decimal,
    /// Redemption tokens held by the AMM pool.
    #[serde(with = "rust_decimal::serde::str")]
    pub redemption_pool: Decimal,
    /// Fiat tokens held by the AMM pool.
    #[serde(with = "rust_decimal::serde::str")]
    pub fiat_pool: Decimal,
    /// Fiat attributable to the liquidity position outside the pool. May be negative.
    #[serde(with = "rust_decimal::serde::str")]
    pub fiat_extra: Decimal,
    /// Fiat circulating freely outside the pool and the protocol.
    #[serde(with = "rust_decimal::serde::str")]
    pub fiat_external: Decimal,
    /// Reference exchange rate, fiat per collateral unit.
    #[serde(with = "rust_decimal::serde::str")]
    pub oracle_rate: Decimal,
}

impl EngineState {
    /// A state with no issuance, empty pool and zero fees collected.
    #[must_use]
    pub const fn empty(oracle_rate: Decimal, fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            usdc_fees: Decimal::ZERO,
            usdc_supply: Decimal::ZERO,
            redemption_supply: Decimal::ZERO,
            fiat_supply: Decimal::ZERO,
            redemption_pool: Decimal::ZERO,
            fiat_pool: Decimal::ZERO,
            fiat_extra: Decimal::ZERO,
            fiat_external: Decimal::ZERO,
            oracle_rate,
        }
    }

    /// Pool reserves with redemption tokens on the input side.
    #[must_use]
    pub const fn pool(&self) -> Reserves {
        Reserves::new(self.redemption_pool, self.fiat_pool)
    }

    /// Validate externally supplied state.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fee_rate(self.fee_rate)?;
        if self.oracle_rate <= Decimal::ZERO {
            return Err(ValidationError::NotPositive {
                field: "oracle_rate",
                value: self.oracle_rate,
            });
        }
        for (field, value) in self.balances() {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(ValidationError::Negative { field, value });
            }
        }
        Ok(())
    }

    /// Reject a staged post-image that drives any balance below zero.
    pub(crate) fn check_balances(&self) -> Result<(), InvariantViolation> {
        for (field, value) in self.balances() {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(InvariantViolation::NegativeBalance { field, value });
            }
        }
        Ok(())
    }

    // `fiat_extra` is an accounting residue and is allowed to go negative.
    fn balances(&self) -> [(&'static str, Decimal); 7] {
        [
            ("usdc_fees", self.usdc_fees),
            ("usdc_supply", self.usdc_supply),
            ("redemption_supply", self.redemption_supply),
            ("fiat_supply", self.fiat_supply),
            ("redemption_pool", self.redemption_pool),
            ("fiat_pool", self.fiat_pool),
            ("fiat_external", self.fiat_external),
        ]
    }
}

pub(crate) fn validate_fee_rate(fee_rate: Decimal) -> Result<(), ValidationError> {
    if (fee_rate.is_sign_negative() && !fee_rate.is_zero()) || fee_rate >= Decimal::ONE {
        return Err(ValidationError::FeeRateOutOfRange { value: fee_rate });
    }
    Ok(())
}

/// Read-only export of an engine for status reporting and valuation.
///
/// Derived ratios are `None` when undefined for the current state (for
/// example `price_ratio` before any redemption supply exists).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Run the snapshot was taken from.
    pub run_id: RunId,
    /// Precision the run computes with.
    pub numeric: NumericContext,
    /// Raw state fields.
    pub state: EngineState,
    /// Fiat per redemption token.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub price_ratio: Option<Decimal>,
    /// Price ratio relative to the oracle peg.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub flux_ratio: Option<Decimal>,
    /// Fiat supply per unit of deployed collateral.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub reserve_ratio: Option<Decimal>,
    /// Issuance multiplier the next expansion would use.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub lambda: Option<Decimal>,
    /// Constant-product invariant of the pool.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub pool_product: Option<Decimal>,
}

impl EngineSnapshot {
    /// Serialize to pretty JSON with decimals as strings.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_state_is_valid() {
        EngineState::empty(dec!(4), dec!(0.003)).validate().unwrap();
    }

    #[test]
    fn fee_rate_bounds() {
        assert!(validate_fee_rate(Decimal::ZERO).is_ok());
        assert!(validate_fee_rate(dec!(0.999)).is_ok());
        assert!(validate_fee_rate(Decimal::ONE).is_err());
        assert!(validate_fee_rate(dec!(-0.01)).is_err());
    }

    #[test]
    fn validate_rejects_negative_balances_but_not_fiat_extra() {
        let mut state = EngineState::empty(dec!(4), Decimal::ZERO);
        state.fiat_extra = dec!(-10);
        state.validate().unwrap();

        state.fiat_external = dec!(-1);
        let err = state.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Negative { field: "fiat_external", .. }
        ));
    }

    #[test]
    fn validate_rejects_non_positive_oracle() {
        let state = EngineState::empty(Decimal::ZERO, Decimal::ZERO);
        assert!(state.validate().is_err());
    }

    #[test]
    fn state_serializes_decimals_as_strings() {
        let mut state = EngineState::empty(dec!(120), dec!(0.003));
        state.fiat_pool = dec!(990.0990099009900990099009901);
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["fiat_pool"], "990.0990099009900990099009901");
        assert_eq!(json["oracle_rate"], "120");

        let back: EngineState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
