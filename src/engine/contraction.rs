//! Contraction: buy redemption tokens back through the pool, then burn supply.
//!
//! This is not the inverse of expansion. Expansion mints and then swaps at
//! the lambda of the moment; contraction swaps first and burns at the current
//! price ratio, so a round trip leaves residue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ExecutionError, ValidationError, VfeResult};
use crate::numeric::NumericContext;

use super::policy::{self, FeeSplit};
use super::state::EngineState;
use super::{require_non_negative, require_positive, stage_fee, stage_swap_reverse, Engine};

/// How many redemption tokens a contraction retires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum RedemptionAmount {
    /// A caller-supplied amount, normally from the solver.
    Exact(Decimal),
    /// Retire as many redemption tokens as the (clamped) fiat target.
    MatchTarget,
}

impl RedemptionAmount {
    /// Concrete redemption amount for a fiat target.
    #[must_use]
    pub const fn resolve(self, fiat_target: Decimal) -> Decimal {
        match self {
            Self::Exact(amount) => amount,
            Self::MatchTarget => fiat_target,
        }
    }
}

impl From<Decimal> for RedemptionAmount {
    fn from(amount: Decimal) -> Self {
        Self::Exact(amount)
    }
}

/// Outcome of [`Engine::burn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnReceipt {
    /// Redemption tokens burned; the same amount of collateral is released pre-fee.
    pub redemption: Decimal,
    /// Price ratio the burn was valued at.
    pub price_ratio: Decimal,
    /// Fiat offered for the burn.
    pub fiat_available: Decimal,
    /// Fiat burned (`redemption * price_ratio`).
    pub fiat_burned: Decimal,
    /// Offered fiat left over after the burn. Not credited to any balance.
    pub fiat_unutilized: Decimal,
}

/// Outcome of [`Engine::contract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractionReceipt {
    /// Fiat the caller asked to retire.
    pub fiat_requested: Decimal,
    /// Fiat actually retired after clamping to `fiat_external`.
    pub fiat_to_burn: Decimal,
    /// Whether the request was clamped.
    pub clamped: bool,
    /// Fiat paid into the pool by the reverse swap.
    pub fiat_swapped: Decimal,
    /// Supply burn that followed the swap.
    pub burn: BurnReceipt,
    /// Fee split of the released collateral.
    pub fee: FeeSplit,
    /// Collateral released to the caller after fees.
    pub collateral_released: Decimal,
}

impl ContractionReceipt {
    /// Fiat consumed by the pool leg and the burn together.
    #[must_use]
    pub fn fiat_consumed(&self) -> Decimal {
        self.fiat_to_burn - self.burn.fiat_unutilized
    }
}

fn stage_burn(
    state: &EngineState,
    redemption: Decimal,
    fiat_available: Decimal,
    ctx: &NumericContext,
) -> VfeResult<(BurnReceipt, EngineState)> {
    if redemption > state.redemption_supply {
        return Err(ValidationError::RedemptionExceedsSupply {
            requested: redemption,
            outstanding: state.redemption_supply,
        }
        .into());
    }

    let price_ratio = policy::price_ratio(state, ctx)?;
    let fiat_burned = ctx.mul(redemption, price_ratio)?;
    if fiat_available < fiat_burned {
        return Err(ExecutionError::InsufficientBacking {
            available: fiat_available,
            required: fiat_burned,
        }
        .into());
    }

    let next = EngineState {
        usdc_supply: ctx.sub(state.usdc_supply, redemption)?,
        redemption_supply: ctx.sub(state.redemption_supply, redemption)?,
        fiat_supply: ctx.sub(state.fiat_supply, fiat_burned)?,
        fiat_external: ctx.sub(state.fiat_external, fiat_burned)?,
        ..*state
    };
    let receipt = BurnReceipt {
        redemption,
        price_ratio,
        fiat_available,
        fiat_burned,
        fiat_unutilized: ctx.sub(fiat_available, fiat_burned)?,
    };
    Ok((receipt, next))
}

impl Engine {
    /// Burn `redemption` tokens against `fiat_remainder` fiat at the current
    /// price ratio, without touching the pool or charging a fee.
    ///
    /// Fails with insufficient backing when `fiat_remainder` is worth less
    /// than the redemption tokens at the current price.
    pub fn burn(&mut self, redemption: Decimal, fiat_remainder: Decimal) -> VfeResult<BurnReceipt> {
        require_non_negative("redemption", redemption)?;
        require_non_negative("fiat_remainder", fiat_remainder)?;

        let (receipt, next) = stage_burn(&self.state, redemption, fiat_remainder, &self.ctx)?;
        self.commit(next)?;
        debug!(
            run = %self.id,
            redemption = %receipt.redemption,
            fiat_burned = %receipt.fiat_burned,
            fiat_unutilized = %receipt.fiat_unutilized,
            "supply burned"
        );
        Ok(receipt)
    }

    /// Retire up to `fiat_to_retire` circulating fiat.
    ///
    /// The redemption amount is bought back through the pool first; the fiat
    /// left after paying the pool is burned against supply at the current
    /// price ratio. The released collateral is charged the fee.
    pub fn contract(
        &mut self,
        fiat_to_retire: Decimal,
        redemption: RedemptionAmount,
    ) -> VfeResult<ContractionReceipt> {
        require_positive("fiat_to_retire", fiat_to_retire)?;
        if let RedemptionAmount::Exact(amount) = redemption {
            require_non_negative("redemption", amount)?;
        }

        let clamped = fiat_to_retire > self.state.fiat_external;
        let fiat_to_burn = if clamped {
            warn!(
                run = %self.id,
                requested = %fiat_to_retire,
                available = %self.state.fiat_external,
                "contraction clamped to circulating fiat"
            );
            self.state.fiat_external
        } else {
            fiat_to_retire
        };
        let redemption = redemption.resolve(fiat_to_burn);

        let (fiat_swapped, swapped) = stage_swap_reverse(&self.state, redemption, &self.ctx)?;
        let fiat_remainder = self.ctx.sub(fiat_to_burn, fiat_swapped)?;
        let (burn, burned) = stage_burn(&swapped, redemption, fiat_remainder, &self.ctx)?;
        let (fee, charged) = stage_fee(&burned, redemption, &self.ctx)?;
        self.commit(charged)?;

        debug!(
            run = %self.id,
            fiat_to_burn = %fiat_to_burn,
            redemption = %redemption,
            fiat_swapped = %fiat_swapped,
            fiat_burned = %burn.fiat_burned,
            fiat_unutilized = %burn.fiat_unutilized,
            collateral_released = %fee.net,
            "contraction applied"
        );
        Ok(ContractionReceipt {
            fiat_requested: fiat_to_retire,
            fiat_to_burn,
            clamped,
            fiat_swapped,
            burn,
            fee,
            collateral_released: fee.net,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flat_state() -> EngineState {
        EngineState {
            usdc_supply: dec!(100),
            redemption_supply: dec!(100),
            fiat_supply: dec!(100),
            redemption_pool: dec!(100),
            fiat_pool: dec!(100),
            fiat_external: dec!(100),
            ..EngineState::empty(dec!(1), Decimal::ZERO)
        }
    }

    fn flat_engine() -> Engine {
        Engine::from_state(flat_state(), NumericContext::default()).unwrap()
    }

    #[test]
    fn resolve_redemption_amount() {
        assert_eq!(RedemptionAmount::Exact(dec!(3)).resolve(dec!(9)), dec!(3));
        assert_eq!(RedemptionAmount::MatchTarget.resolve(dec!(9)), dec!(9));
        assert_eq!(RedemptionAmount::from(dec!(2)), RedemptionAmount::Exact(dec!(2)));
    }

    #[test]
    fn burn_with_too_little_fiat_fails_without_mutation() {
        let mut engine = flat_engine();
        let err = engine.burn(dec!(50), dec!(40)).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            crate::VfeError::Execution(ExecutionError::InsufficientBacking { .. })
        ));
        assert_eq!(*engine.state(), flat_state());
    }

    #[test]
    fn burn_reports_unutilized_fiat() {
        let mut engine = flat_engine();
        let receipt = engine.burn(dec!(50), dec!(60)).unwrap();
        assert_eq!(receipt.fiat_burned, dec!(50));
        assert_eq!(receipt.fiat_unutilized, dec!(10));
        let s = engine.state();
        assert_eq!(s.usdc_supply, dec!(50));
        assert_eq!(s.redemption_supply, dec!(50));
        assert_eq!(s.fiat_supply, dec!(50));
        assert_eq!(s.fiat_external, dec!(50));
    }

    #[test]
    fn burn_beyond_supply_is_rejected() {
        let mut engine = flat_engine();
        let err = engine.burn(dec!(150), dec!(1000)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn contract_insufficient_backing_leaves_state_untouched() {
        let mut engine = flat_engine();
        // Pool leg costs 100 - 100*100/150 = 33.3.., leaving ~6.7 < 50.
        let err = engine
            .contract(dec!(40), RedemptionAmount::Exact(dec!(50)))
            .unwrap_err();
        assert!(err.is_execution());
        assert_eq!(*engine.state(), flat_state());
    }

    #[test]
    fn contract_clamps_to_external_fiat() {
        let mut state = flat_state();
        state.fiat_external = dec!(20);
        let mut engine = Engine::from_state(state, NumericContext::default()).unwrap();

        let receipt = engine
            .contract(dec!(500), RedemptionAmount::Exact(dec!(1)))
            .unwrap();
        assert!(receipt.clamped);
        assert_eq!(receipt.fiat_requested, dec!(500));
        assert_eq!(receipt.fiat_to_burn, dec!(20));
    }

    #[test]
    fn contract_match_target_uses_clamped_amount() {
        let mut engine = flat_engine();
        // Pool leg: 100 - 10000/110 = 9.09.., remainder 0.9.. < 10 at P_R 1.
        let err = engine.contract(dec!(10), RedemptionAmount::MatchTarget).unwrap_err();
        assert!(err.is_recoverable());

        let mut state = flat_state();
        state.fiat_external = dec!(5);
        let mut engine = Engine::from_state(state, NumericContext::default()).unwrap();
        let err = engine.contract(dec!(10), RedemptionAmount::MatchTarget).unwrap_err();
        match err {
            crate::VfeError::Execution(ExecutionError::InsufficientBacking { required, .. }) => {
                assert_eq!(required, dec!(5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn contract_moves_supplies_in_lockstep_and_charges_fee() {
        let mut state = flat_state();
        state.fee_rate = dec!(0.1);
        let mut engine = Engine::from_state(state, NumericContext::default()).unwrap();

        let receipt = engine
            .contract(dec!(30), RedemptionAmount::Exact(dec!(10)))
            .unwrap();
        let s = engine.state();
        assert_eq!(s.usdc_supply, dec!(90));
        assert_eq!(s.redemption_supply, dec!(90));
        assert_eq!(s.fiat_supply, dec!(90));
        assert_eq!(s.fiat_external, dec!(90));
        assert_eq!(s.fiat_pool, dec!(110));
        assert_eq!(receipt.burn.fiat_burned, dec!(10));
        assert_eq!(receipt.fee.fee, dec!(1));
        assert_eq!(receipt.collateral_released, dec!(9));
        assert_eq!(s.usdc_fees, dec!(1));
        let legs = receipt.fiat_swapped + receipt.burn.fiat_burned;
        assert!((receipt.fiat_consumed() - legs).abs() < dec!(0.00000000000000000001));
    }

    #[test]
    fn contract_rejects_bad_inputs() {
        let mut engine = flat_engine();
        assert!(engine.contract(Decimal::ZERO, RedemptionAmount::MatchTarget).is_err());
        assert!(engine
            .contract(dec!(10), RedemptionAmount::Exact(dec!(-1)))
            .is_err());
        assert_eq!(*engine.state(), flat_state());
    }
}
