//! Run configuration.
//!
//! Monetary fields are JSON strings parsed straight into exact decimals. JSON
//! numbers are rejected so binary floating point never reaches the engine.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::state::validate_fee_rate;
use crate::error::{ConfigError, ValidationError, VfeResult};
use crate::numeric::{parse_decimal, NumericContext};

/// Parameters of one simulation run.
///
/// # Examples
///
/// ```
/// use vfe::VfeConfig;
///
/// let config = VfeConfig::from_json_str(r#"{
///     "initial_collateral": "1000",
///     "collateral_for_external_fiat": "100",
///     "oracle_rate": "4",
///     "pool_ratio": "1",
///     "fee_rate": "0.003"
/// }"#).unwrap();
/// assert_eq!(config.numeric.precision, 28);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct VfeConfig {
    /// Seed collateral deposit.
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub initial_collateral: Decimal,
    /// Collateral earmarked for externally circulating fiat.
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub collateral_for_external_fiat: Decimal,
    /// Oracle peg, fiat per collateral unit.
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub oracle_rate: Decimal,
    /// Fiat seeded into the pool per seeded redemption token.
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub pool_ratio: Decimal,
    /// Fee on every collateral deployment and withdrawal.
    #[serde(serialize_with = "rust_decimal::serde::str::serialize")]
    pub fee_rate: Decimal,
    /// Precision and rounding.
    pub numeric: NumericContext,
}

/// Wire form of [`VfeConfig`]. Amounts stay text until [`parse_decimal`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    initial_collateral: String,
    #[serde(default)]
    collateral_for_external_fiat: Option<String>,
    oracle_rate: String,
    pool_ratio: String,
    #[serde(default)]
    fee_rate: Option<String>,
    #[serde(default)]
    numeric: NumericContext,
}

fn parse_or_zero(field: &'static str, input: Option<&str>) -> Result<Decimal, ValidationError> {
    input.map_or(Ok(Decimal::ZERO), |text| parse_decimal(field, text))
}

impl TryFrom<RawConfig> for VfeConfig {
    type Error = ValidationError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            initial_collateral: parse_decimal("initial_collateral", &raw.initial_collateral)?,
            collateral_for_external_fiat: parse_or_zero(
                "collateral_for_external_fiat",
                raw.collateral_for_external_fiat.as_deref(),
            )?,
            oracle_rate: parse_decimal("oracle_rate", &raw.oracle_rate)?,
            pool_ratio: parse_decimal("pool_ratio", &raw.pool_ratio)?,
            fee_rate: parse_or_zero("fee_rate", raw.fee_rate.as_deref())?,
            numeric: raw.numeric,
        })
    }
}

impl VfeConfig {
    /// Parse and validate a JSON document.
    ///
    /// Amounts must be JSON strings that parse exactly; a value with more
    /// digits than a decimal can hold is rejected, not rounded.
    pub fn from_json_str(json: &str) -> VfeResult<Self> {
        let raw: RawConfig = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        let config = Self::try_from(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> VfeResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.initial_collateral <= Decimal::ZERO {
            return Err(ValidationError::NotPositive {
                field: "initial_collateral",
                value: self.initial_collateral,
            });
        }
        if self.collateral_for_external_fiat.is_sign_negative()
            && !self.collateral_for_external_fiat.is_zero()
        {
            return Err(ValidationError::Negative {
                field: "collateral_for_external_fiat",
                value: self.collateral_for_external_fiat,
            });
        }
        if self.oracle_rate <= Decimal::ZERO {
            return Err(ValidationError::NotPositive {
                field: "oracle_rate",
                value: self.oracle_rate,
            });
        }
        if self.pool_ratio <= Decimal::ZERO {
            return Err(ValidationError::NotPositive {
                field: "pool_ratio",
                value: self.pool_ratio,
            });
        }
        validate_fee_rate(self.fee_rate)?;
        self.numeric.validate()
    }
}
