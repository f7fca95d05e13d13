//! # VFE - Virtual Fiat Environment
//!
//! A deterministic simulator of a two-token monetary protocol. Collateral
//! deposits mint a fiat-pegged token and an internal redemption token; the two
//! trade against each other in a fee-free constant-product pool.
//!
//! ## Core Concepts
//!
//! - **Engine**: owns all protocol state and exposes expansion (deploy
//!   collateral, mint, sell into the pool) and contraction (buy back through
//!   the pool, burn supply)
//! - **Lambda**: adaptive multiplier for redemption tokens minted per unit of
//!   collateral, driven by how far the redemption price drifts from the peg
//! - **Solver**: closed-form redemption amount that retires a fiat target
//! - **NumericContext**: explicit decimal precision threaded through every
//!   computation
//!
//! ## Usage
//!
//! ```rust
//! use rust_decimal::Decimal;
//! use vfe::{Engine, RedemptionAmount};
//!
//! let mut engine = Engine::builder()
//!     .collateral(Decimal::from(1000))
//!     .collateral_for_external_fiat(Decimal::from(100))
//!     .oracle_rate(Decimal::from(4))
//!     .pool_ratio(Decimal::ONE)
//!     .build()?;
//!
//! engine.expand(Decimal::from(10))?;
//!
//! let target = Decimal::from(100);
//! let redemption = engine.solve_optimal_redemption(target)?;
//! let receipt = engine.contract(target, RedemptionAmount::Exact(redemption))?;
//! assert!(receipt.collateral_released > Decimal::ZERO);
//! # Ok::<(), vfe::VfeError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod amm;
pub mod config;
pub mod engine;
pub mod error;
pub mod numeric;
pub mod solver;

// Re-export primary types at crate root for convenience
pub use amm::{swap_given_in, swap_given_out, ForwardQuote, Reserves, ReverseQuote};
pub use config::VfeConfig;
pub use engine::{
    BurnReceipt, ContractionReceipt, Engine, EngineBuilder, EngineSnapshot, EngineState,
    ExpansionReceipt, FeeSplit, Issuance, RedemptionAmount, RunId,
};
pub use error::{
    ConfigError, ExecutionError, InvariantViolation, ValidationError, VfeError, VfeResult,
};
pub use numeric::{parse_decimal, NumericContext, Rounding};
pub use solver::{solve_optimal_redemption, QuadraticCoefficients};
