use std::str::FromStr;

use settlement_common::Cents;

use crate::GatewayApiError;

/// PayPal expresses amounts as decimal strings with two places.
pub fn format_decimal_amount(amount: Cents) -> String {
    amount.to_string()
}

pub fn parse_decimal_amount(value: &str) -> Result<Cents, GatewayApiError> {
    Cents::from_str(value).map_err(|e| GatewayApiError::InvalidAmount(e.to_string()))
}

/// Stripe wants lowercase ISO currency codes.
pub fn stripe_currency(currency: &str) -> String {
    currency.trim().to_ascii_lowercase()
}
