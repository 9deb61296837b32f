//! Platform fee policy.
//!
//! The platform keeps a fee from every payment; the remainder (the business fee) is owed to the merchant. The fee is
//! either a fixed amount per payment or a percentage of the payment amount, and is always clamped to `[0, amount]`.
use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use settlement_common::Cents;
use thiserror::Error;

/// The fixed fee used when no policy is configured: 0.75 per payment.
pub const DEFAULT_PLATFORM_FEE: Cents = Cents::new(75);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid fee policy: {0}")]
pub struct FeePolicyError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicy {
    /// A flat fee per payment.
    Fixed(Cents),
    /// A percentage of the payment amount, in basis points (1% = 100).
    Percent(i64),
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::Fixed(DEFAULT_PLATFORM_FEE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub amount: Cents,
    pub platform_fee: Cents,
    pub business_fee: Cents,
}

impl FeePolicy {
    /// Splits a payment amount into the platform fee and the business fee. `platform_fee + business_fee == amount`
    /// always holds, and neither part is negative for a non-negative amount.
    pub fn split(&self, amount: Cents) -> FeeSplit {
        let raw = match self {
            FeePolicy::Fixed(fee) => *fee,
            FeePolicy::Percent(bp) => amount.scale_basis_points(*bp),
        };
        let platform_fee = raw.clamp_to(Cents::ZERO, amount.max(Cents::ZERO));
        FeeSplit { amount, platform_fee, business_fee: amount - platform_fee }
    }
}

impl Display for FeePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeePolicy::Fixed(fee) => write!(f, "{fee}"),
            FeePolicy::Percent(bp) => write!(f, "{}.{:02}%", bp / 100, bp % 100),
        }
    }
}

impl FromStr for FeePolicy {
    type Err = FeePolicyError;

    /// Accepts either a fixed amount (`"0.75"`) or a percentage (`"7.5%"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            // Percentages share the two-decimal grammar of amounts, so "7.5" parses to 750 basis points.
            let bp = Cents::from_str(pct.trim()).map_err(|e| FeePolicyError(e.to_string()))?.value();
            if !(0..=10_000).contains(&bp) {
                return Err(FeePolicyError(format!("percentage must be between 0% and 100%, not {s}")));
            }
            Ok(FeePolicy::Percent(bp))
        } else {
            let fee = Cents::from_str(s).map_err(|e| FeePolicyError(e.to_string()))?;
            if fee.is_negative() {
                return Err(FeePolicyError(format!("fixed fee cannot be negative: {s}")));
            }
            Ok(FeePolicy::Fixed(fee))
        }
    }
}
