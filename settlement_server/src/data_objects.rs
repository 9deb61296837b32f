use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use settlement_common::Cents;
use settlement_engine::{
    db_types::{InvoiceStatus, NewPayout, Payment, Payout, PayoutMethod, Provider, SettlementPeriod},
    fees::FeeSplit,
    payment_objects::PaymentRequest,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountQuery {
    /// In cents.
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeQuote {
    pub currency: String,
    pub amount: Cents,
    pub platform_fee: Cents,
    pub business_fee: Cents,
}

impl FeeQuote {
    pub fn new(split: FeeSplit, currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            amount: split.amount,
            platform_fee: split.platform_fee,
            business_fee: split.business_fee,
        }
    }
}

/// The booking system's request to take payment for a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentParams {
    pub booking_id: String,
    pub payer_id: String,
    pub merchant_id: String,
    pub amount: Cents,
    #[serde(default)]
    pub currency: Option<String>,
    pub provider: Provider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionalReasonParams {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayoutParams {
    pub merchant_id: String,
    /// Defaults to the full pending balance.
    #[serde(default)]
    pub amount: Option<Cents>,
    pub method: PayoutMethod,
    #[serde(default)]
    pub notes: Option<String>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletePayoutParams {
    pub transaction_reference: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceForPayoutParams {
    pub payout_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceStatusParams {
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YearQuery {
    #[serde(default)]
    pub year: Option<i32>,
}

impl From<NewPaymentParams> for PaymentRequest {
    fn from(params: NewPaymentParams) -> Self {
        Self {
            booking_id: params.booking_id,
            payer_id: params.payer_id,
            merchant_id: params.merchant_id,
            amount: params.amount,
            currency: params.currency,
            provider: params.provider,
        }
    }
}

impl NewPayoutParams {
    pub fn into_new_payout(self, approved_by: String) -> NewPayout {
        NewPayout {
            merchant_id: self.merchant_id,
            amount: self.amount,
            method: self.method,
            period: SettlementPeriod::new(self.period_start, self.period_end),
            notes: self.notes,
            approved_by,
        }
    }
}

/// A payout with the payments it covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutDetails {
    pub payout: Payout,
    pub payments: Vec<Payment>,
}
