//! The VFE engine: issuance, redemption and the AMM pool over one state record.
//!
//! Every public mutating operation is all-or-nothing. It reads the committed
//! state, stages a full post-image through the pure `stage_*` helpers,
//! validates the result, and only then assigns it back.

mod contraction;
pub mod policy;
pub mod state;

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::amm;
use crate::config::VfeConfig;
use crate::error::{ValidationError, VfeResult};
use crate::numeric::NumericContext;
use crate::solver;

pub use contraction::{BurnReceipt, ContractionReceipt, RedemptionAmount};
pub use policy::FeeSplit;
pub use state::{EngineSnapshot, EngineState};

/// Identifier of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tokens minted by one issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    /// Net collateral deployed.
    pub collateral: Decimal,
    /// Issuance multiplier evaluated on the pre-issuance state.
    pub lambda: Decimal,
    /// Redemption tokens minted (`collateral * lambda`).
    pub redemption: Decimal,
    /// Fiat tokens minted (`collateral * oracle_rate`).
    pub fiat: Decimal,
}

/// Outcome of [`Engine::expand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionReceipt {
    /// Fee split of the deployed collateral.
    pub fee: FeeSplit,
    /// Tokens minted from the post-fee collateral.
    pub issuance: Issuance,
    /// Fiat bought from the pool with the minted redemption tokens.
    pub fiat_swapped: Decimal,
    /// Total fiat released to circulation (`issuance.fiat + fiat_swapped`).
    pub fiat_released: Decimal,
}

/// Deterministic simulator of one VFE protocol instance.
///
/// # Examples
///
/// ```
/// use rust_decimal::Decimal;
/// use vfe::Engine;
///
/// let mut engine = Engine::builder()
///     .collateral(Decimal::from(1000))
///     .collateral_for_external_fiat(Decimal::from(100))
///     .oracle_rate(Decimal::from(4))
///     .pool_ratio(Decimal::ONE)
///     .build()
///     .unwrap();
///
/// let receipt = engine.expand(Decimal::from(10)).unwrap();
/// assert_eq!(engine.state().usdc_supply, Decimal::from(1010));
/// assert!(receipt.fiat_released > Decimal::from(40));
/// ```
#[derive(Debug)]
pub struct Engine {
    id: RunId,
    ctx: NumericContext,
    state: EngineState,
}

fn require_positive(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::NotPositive { field, value });
    }
    Ok(())
}

fn require_non_negative(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

fn stage_fee(
    state: &EngineState,
    gross: Decimal,
    ctx: &NumericContext,
) -> VfeResult<(FeeSplit, EngineState)> {
    let split = policy::split_fee(gross, state.fee_rate, ctx)?;
    let next = EngineState {
        usdc_fees: ctx.add(state.usdc_fees, split.fee)?,
        ..*state
    };
    Ok((split, next))
}

fn stage_issue(
    state: &EngineState,
    collateral: Decimal,
    ctx: &NumericContext,
) -> VfeResult<(Issuance, EngineState)> {
    let lambda = policy::lambda(state, ctx)?;
    let redemption = ctx.mul(collateral, lambda)?;
    let fiat = ctx.mul(collateral, state.oracle_rate)?;
    let next = EngineState {
        usdc_supply: ctx.add(state.usdc_supply, collateral)?,
        redemption_supply: ctx.add(state.redemption_supply, redemption)?,
        fiat_supply: ctx.add(state.fiat_supply, fiat)?,
        ..*state
    };
    let issuance = Issuance {
        collateral,
        lambda,
        redemption,
        fiat,
    };
    Ok((issuance, next))
}

fn stage_swap_forward(
    state: &EngineState,
    redemption_in: Decimal,
    ctx: &NumericContext,
) -> VfeResult<(Decimal, EngineState)> {
    let quote = amm::swap_given_in(redemption_in, state.pool(), ctx)?;
    let next = EngineState {
        redemption_pool: quote.reserves.reserve_in,
        fiat_pool: quote.reserves.reserve_out,
        ..*state
    };
    Ok((quote.amount_out, next))
}

fn stage_swap_reverse(
    state: &EngineState,
    redemption_amount: Decimal,
    ctx: &NumericContext,
) -> VfeResult<(Decimal, EngineState)> {
    let quote = amm::swap_given_out(redemption_amount, state.pool(), ctx)?;
    let next = EngineState {
        redemption_pool: quote.reserves.reserve_in,
        fiat_pool: quote.reserves.reserve_out,
        ..*state
    };
    Ok((quote.amount_in, next))
}

impl Engine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Build an engine from a loaded configuration.
    pub fn from_config(config: &VfeConfig) -> VfeResult<Self> {
        EngineBuilder::from(config).build()
    }

    /// Seed a run from an initial collateral deposit.
    ///
    /// The deposit is issued at lambda 1 without a fee. Its redemption tokens
    /// seed the pool against `redemption * pool_ratio` fiat, and
    /// `collateral_for_external_fiat * (oracle_rate + pool_ratio)` fiat is
    /// credited as externally circulating. The rest is `fiat_extra`.
    pub fn bootstrap(
        collateral: Decimal,
        collateral_for_external_fiat: Decimal,
        oracle_rate: Decimal,
        pool_ratio: Decimal,
        fee_rate: Decimal,
        ctx: NumericContext,
    ) -> VfeResult<Self> {
        ctx.validate()?;
        require_positive("collateral", collateral)?;
        require_non_negative("collateral_for_external_fiat", collateral_for_external_fiat)?;
        require_positive("oracle_rate", oracle_rate)?;
        require_positive("pool_ratio", pool_ratio)?;
        state::validate_fee_rate(fee_rate)?;

        let empty = EngineState::empty(oracle_rate, fee_rate);
        let (issuance, issued) = stage_issue(&empty, collateral, &ctx)?;

        let fiat_pool = ctx.mul(issuance.redemption, pool_ratio)?;
        let external_rate = ctx.add(oracle_rate, pool_ratio)?;
        let fiat_external = ctx.mul(collateral_for_external_fiat, external_rate)?;
        let fiat_extra = ctx.sub(ctx.sub(issuance.fiat, fiat_pool)?, fiat_external)?;

        let state = EngineState {
            redemption_pool: issuance.redemption,
            fiat_pool,
            fiat_extra,
            fiat_external,
            ..issued
        };
        state.check_balances()?;

        let engine = Self {
            id: RunId::new(),
            ctx,
            state,
        };
        debug!(
            run = %engine.id,
            collateral = %collateral,
            redemption_pool = %state.redemption_pool,
            fiat_pool = %state.fiat_pool,
            fiat_external = %state.fiat_external,
            fiat_extra = %state.fiat_extra,
            "engine bootstrapped"
        );
        Ok(engine)
    }

    /// Rebuild an engine around an existing state record.
    pub fn from_state(state: EngineState, ctx: NumericContext) -> VfeResult<Self> {
        ctx.validate()?;
        state.validate()?;
        Ok(Self {
            id: RunId::new(),
            ctx,
            state,
        })
    }

    /// Run identifier.
    #[must_use]
    pub const fn id(&self) -> RunId {
        self.id
    }

    /// Numeric context used by every operation.
    #[must_use]
    pub const fn numeric(&self) -> &NumericContext {
        &self.ctx
    }

    /// Committed state.
    #[must_use]
    pub const fn state(&self) -> &EngineState {
        &self.state
    }

    /// Fiat per redemption token.
    pub fn price_ratio(&self) -> VfeResult<Decimal> {
        policy::price_ratio(&self.state, &self.ctx)
    }

    /// Price ratio relative to the oracle peg.
    pub fn flux_ratio(&self) -> VfeResult<Decimal> {
        policy::flux_ratio(&self.state, &self.ctx)
    }

    /// Fiat supply per unit of deployed collateral.
    pub fn reserve_ratio(&self) -> VfeResult<Decimal> {
        policy::reserve_ratio(&self.state, &self.ctx)
    }

    /// Issuance multiplier the next expansion would use.
    pub fn lambda(&self) -> VfeResult<Decimal> {
        policy::lambda(&self.state, &self.ctx)
    }

    /// Constant-product invariant of the pool.
    pub fn pool_product(&self) -> VfeResult<Decimal> {
        self.state.pool().product(&self.ctx)
    }

    /// Export the state and its derived ratios.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            run_id: self.id,
            numeric: self.ctx,
            state: self.state,
            price_ratio: self.price_ratio().ok(),
            flux_ratio: self.flux_ratio().ok(),
            reserve_ratio: self.reserve_ratio().ok(),
            lambda: self.lambda().ok(),
            pool_product: self.pool_product().ok(),
        }
    }

    /// Replace the fee rate for subsequent operations.
    pub fn set_fee_rate(&mut self, fee_rate: Decimal) -> VfeResult<()> {
        state::validate_fee_rate(fee_rate)?;
        debug!(run = %self.id, old = %self.state.fee_rate, new = %fee_rate, "fee rate updated");
        self.state.fee_rate = fee_rate;
        Ok(())
    }

    /// Fee split of `gross` at the current rate, without charging it.
    pub fn apply_fee(&self, gross: Decimal) -> VfeResult<FeeSplit> {
        require_non_negative("gross", gross)?;
        policy::split_fee(gross, self.state.fee_rate, &self.ctx)
    }

    /// Charge the fee on `gross` into `usdc_fees` and return the split.
    pub fn charge_fee(&mut self, gross: Decimal) -> VfeResult<FeeSplit> {
        require_non_negative("gross", gross)?;
        let (split, next) = stage_fee(&self.state, gross, &self.ctx)?;
        self.commit(next)?;
        debug!(run = %self.id, gross = %gross, fee = %split.fee, "fee charged");
        Ok(split)
    }

    /// Mint tokens against already-netted collateral, without fee or swap.
    pub fn issue(&mut self, collateral: Decimal) -> VfeResult<Issuance> {
        require_non_negative("collateral", collateral)?;
        let (issuance, next) = stage_issue(&self.state, collateral, &self.ctx)?;
        self.commit(next)?;
        debug!(
            run = %self.id,
            collateral = %collateral,
            lambda = %issuance.lambda,
            redemption = %issuance.redemption,
            fiat = %issuance.fiat,
            "tokens issued"
        );
        Ok(issuance)
    }

    /// Sell `redemption_in` redemption tokens into the pool for fiat.
    pub fn swap_forward(&mut self, redemption_in: Decimal) -> VfeResult<Decimal> {
        let (fiat_out, next) = stage_swap_forward(&self.state, redemption_in, &self.ctx)?;
        self.commit(next)?;
        debug!(run = %self.id, redemption_in = %redemption_in, fiat_out = %fiat_out, "forward swap");
        Ok(fiat_out)
    }

    /// Reverse swap of `redemption_amount` against the pool. Returns the
    /// amount released from the redemption side.
    pub fn swap_reverse(&mut self, redemption_amount: Decimal) -> VfeResult<Decimal> {
        let (amount_in, next) = stage_swap_reverse(&self.state, redemption_amount, &self.ctx)?;
        self.commit(next)?;
        debug!(
            run = %self.id,
            redemption_amount = %redemption_amount,
            amount_in = %amount_in,
            "reverse swap"
        );
        Ok(amount_in)
    }

    /// Deploy `collateral`: charge the fee, mint at the current lambda, sell
    /// the minted redemption tokens into the pool, and release the fiat.
    pub fn expand(&mut self, collateral: Decimal) -> VfeResult<ExpansionReceipt> {
        require_positive("collateral", collateral)?;

        let (fee, charged) = stage_fee(&self.state, collateral, &self.ctx)?;
        let (issuance, issued) = stage_issue(&charged, fee.net, &self.ctx)?;
        let (fiat_swapped, swapped) = stage_swap_forward(&issued, issuance.redemption, &self.ctx)?;
        let fiat_released = self.ctx.add(issuance.fiat, fiat_swapped)?;
        let next = EngineState {
            fiat_external: self.ctx.add(swapped.fiat_external, fiat_released)?,
            ..swapped
        };
        self.commit(next)?;

        debug!(
            run = %self.id,
            collateral = %collateral,
            fee = %fee.fee,
            lambda = %issuance.lambda,
            redemption_issued = %issuance.redemption,
            fiat_issued = %issuance.fiat,
            fiat_swapped = %fiat_swapped,
            fiat_released = %fiat_released,
            "expansion applied"
        );
        Ok(ExpansionReceipt {
            fee,
            issuance,
            fiat_swapped,
            fiat_released,
        })
    }

    /// Redemption amount that retires `fiat_target` through the pool and a burn.
    pub fn solve_optimal_redemption(&self, fiat_target: Decimal) -> VfeResult<Decimal> {
        solver::solve_optimal_redemption(fiat_target, &self.state, &self.ctx)
    }

    fn commit(&mut self, next: EngineState) -> VfeResult<()> {
        next.check_balances()?;
        self.state = next;
        Ok(())
    }
}

/// Fluent constructor for [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    collateral: Option<Decimal>,
    collateral_for_external_fiat: Option<Decimal>,
    oracle_rate: Option<Decimal>,
    pool_ratio: Option<Decimal>,
    fee_rate: Option<Decimal>,
    numeric: Option<NumericContext>,
}

impl EngineBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial collateral deposit.
    #[must_use]
    pub fn collateral(mut self, amount: Decimal) -> Self {
        self.collateral = Some(amount);
        self
    }

    /// Collateral earmarked for externally circulating fiat. Defaults to zero.
    #[must_use]
    pub fn collateral_for_external_fiat(mut self, amount: Decimal) -> Self {
        self.collateral_for_external_fiat = Some(amount);
        self
    }

    /// Oracle peg, fiat per collateral unit.
    #[must_use]
    pub fn oracle_rate(mut self, rate: Decimal) -> Self {
        self.oracle_rate = Some(rate);
        self
    }

    /// Fiat seeded into the pool per seeded redemption token.
    #[must_use]
    pub fn pool_ratio(mut self, ratio: Decimal) -> Self {
        self.pool_ratio = Some(ratio);
        self
    }

    /// Fee rate. Defaults to zero.
    #[must_use]
    pub fn fee_rate(mut self, rate: Decimal) -> Self {
        self.fee_rate = Some(rate);
        self
    }

    /// Numeric context. Defaults to 28 digits, half-even.
    #[must_use]
    pub fn numeric(mut self, ctx: NumericContext) -> Self {
        self.numeric = Some(ctx);
        self
    }

    /// Validate inputs and bootstrap the engine.
    pub fn build(self) -> VfeResult<Engine> {
        let collateral = self
            .collateral
            .ok_or(ValidationError::MissingField { field: "collateral" })?;
        let oracle_rate = self
            .oracle_rate
            .ok_or(ValidationError::MissingField { field: "oracle_rate" })?;
        let pool_ratio = self
            .pool_ratio
            .ok_or(ValidationError::MissingField { field: "pool_ratio" })?;

        Engine::bootstrap(
            collateral,
            self.collateral_for_external_fiat.unwrap_or(Decimal::ZERO),
            oracle_rate,
            pool_ratio,
            self.fee_rate.unwrap_or(Decimal::ZERO),
            self.numeric.unwrap_or_default(),
        )
    }
}

impl From<&VfeConfig> for EngineBuilder {
    fn from(config: &VfeConfig) -> Self {
        Self {
            collateral: Some(config.initial_collateral),
            collateral_for_external_fiat: Some(config.collateral_for_external_fiat),
            oracle_rate: Some(config.oracle_rate),
            pool_ratio: Some(config.pool_ratio),
            fee_rate: Some(config.fee_rate),
            numeric: Some(config.numeric),
        }
    }
}
