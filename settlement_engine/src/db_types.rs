use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
pub use settlement_common::Cents;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

/// Generates `as_str`, `Display` and `FromStr` for the enums that are stored as text columns. The strings must match
/// the `sqlx(rename_all)` and `serde(rename_all)` spelling of each variant.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("Invalid {}: {s}", stringify!($name)))),
                }
            }
        }
    };
}

//--------------------------------------        Provider       ---------------------------------------------------------
/// The external payment processors. Stripe handles card payments, PayPal handles wallet payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Paypal,
}

text_enum!(Provider { Stripe => "stripe", Paypal => "paypal" });

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// The intent has been recorded. No provider object exists yet.
    Pending,
    /// The provider has (or may have) a payment object. Waiting for the outcome.
    Processing,
    /// The provider captured the funds. The merchant has been credited.
    Succeeded,
    Failed,
    /// The funds were returned to the payer. The merchant credit has been reversed.
    Refunded,
    Cancelled,
}

text_enum!(PaymentStatus {
    Pending => "pending",
    Processing => "processing",
    Succeeded => "succeeded",
    Failed => "failed",
    Refunded => "refunded",
    Cancelled => "cancelled",
});

impl PaymentStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

//----------------------------------    PaymentPayoutStatus    ---------------------------------------------------------
/// Where a payment is in the payout cycle. Only `succeeded` payments ever leave `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentPayoutStatus {
    Pending,
    Processing,
    Paid,
}

text_enum!(PaymentPayoutStatus { Pending => "pending", Processing => "processing", Paid => "paid" });

//--------------------------------------       Payment         ---------------------------------------------------------
/// A ledger entry. One per booking.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub booking_id: String,
    pub payer_id: String,
    pub merchant_id: String,
    pub amount: Cents,
    pub currency: String,
    pub platform_fee: Cents,
    pub business_fee: Cents,
    pub status: PaymentStatus,
    pub provider: Provider,
    pub provider_ref: Option<String>,
    pub provider_charge_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub payout_id: Option<i64>,
    pub payout_status: PaymentPayoutStatus,
    pub refund_id: Option<String>,
    pub refund_amount: Option<Cents>,
    pub refund_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Set when the payer approved a payment that we capture ourselves.
    pub approved_at: Option<DateTime<Utc>>,
    pub succeeded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn refund(&self) -> Option<RefundRecord> {
        match (&self.refund_id, self.refund_amount, &self.refund_reason) {
            (Some(id), Some(amount), reason) => Some(RefundRecord {
                refund_id: id.clone(),
                amount,
                reason: reason.clone().unwrap_or_default(),
                refunded_at: self.refunded_at,
            }),
            _ => None,
        }
    }
}

impl Display for Payment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Payment #{} [booking {}] {} {} ({}) for {}",
            self.id, self.booking_id, self.amount, self.currency, self.status, self.merchant_id
        )
    }
}

/// The data needed to record a payment intent. The fee split is computed by the ledger, never by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub booking_id: String,
    pub payer_id: String,
    pub merchant_id: String,
    pub amount: Cents,
    pub currency: String,
    pub provider: Provider,
}

impl NewPayment {
    pub fn new<S: Into<String>>(booking_id: S, payer_id: S, merchant_id: S, amount: Cents, provider: Provider) -> Self {
        Self {
            booking_id: booking_id.into(),
            payer_id: payer_id.into(),
            merchant_id: merchant_id.into(),
            amount,
            currency: settlement_common::DEFAULT_CURRENCY_CODE.to_string(),
            provider,
        }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub refund_id: String,
    pub amount: Cents,
    pub reason: String,
    pub refunded_at: Option<DateTime<Utc>>,
}

//--------------------------------------     PayoutStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

text_enum!(PayoutStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl PayoutStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    BankTransfer,
    Paypal,
    Manual,
}

text_enum!(PayoutMethod { BankTransfer => "bank_transfer", Paypal => "paypal", Manual => "manual" });

//--------------------------------------        Payout         ---------------------------------------------------------
/// A batched disbursement of a merchant's earnings.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    pub merchant_id: String,
    pub amount: Cents,
    pub currency: String,
    pub status: PayoutStatus,
    pub method: PayoutMethod,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub covered_payment_count: i64,
    pub transaction_reference: Option<String>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub approved_by: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    pub fn period(&self) -> SettlementPeriod {
        SettlementPeriod { from: self.period_start, to: self.period_end }
    }
}

impl Display for Payout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Payout #{} of {} {} to {} ({}, {} payments)",
            self.id, self.amount, self.currency, self.merchant_id, self.status, self.covered_payment_count
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SettlementPeriod {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn is_valid(&self) -> bool {
        self.from <= self.to
    }
}

impl Display for SettlementPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.from.format("%d.%m.%Y"), self.to.format("%d.%m.%Y"))
    }
}

/// An admin request to pay out a merchant's pending earnings.
///
/// `amount` is optional. When given, it must equal the full pending sum; when omitted, the full pending sum is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayout {
    pub merchant_id: String,
    pub amount: Option<Cents>,
    pub method: PayoutMethod,
    pub period: SettlementPeriod,
    pub notes: Option<String>,
    pub approved_by: String,
}

//--------------------------------------       Merchant        ---------------------------------------------------------
/// The merchant aggregate: billing profile plus the embedded business balance.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Merchant {
    pub merchant_id: String,
    pub legal_name: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub tax_id: Option<String>,
    pub vat_id: Option<String>,
    pub email: Option<String>,
    pub pending_balance: Cents,
    pub total_earnings: Cents,
    pub total_paid_out: Cents,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    /// The merchant's identity as it should appear on an invoice, if the profile is complete enough to bill.
    pub fn billing_party(&self) -> Option<Party> {
        let legal_name = self.legal_name.as_ref().filter(|s| !s.trim().is_empty())?;
        Some(Party {
            legal_name: legal_name.clone(),
            street: self.street.clone().unwrap_or_default(),
            postal_code: self.postal_code.clone().unwrap_or_default(),
            city: self.city.clone().unwrap_or_default(),
            country: self.country.clone().unwrap_or_default(),
            tax_id: self.tax_id.clone(),
            vat_id: self.vat_id.clone(),
            email: self.email.clone(),
        })
    }

    pub fn balance(&self) -> BusinessBalance {
        BusinessBalance {
            pending_balance: self.pending_balance,
            total_earnings: self.total_earnings,
            total_paid_out: self.total_paid_out,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessBalance {
    pub pending_balance: Cents,
    pub total_earnings: Cents,
    pub total_paid_out: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantProfile {
    pub legal_name: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub tax_id: Option<String>,
    pub vat_id: Option<String>,
    pub email: String,
}

/// A legal identity snapshot (issuer or recipient) as printed on an invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub legal_name: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub tax_id: Option<String>,
    pub vat_id: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub account_holder: String,
    pub bank_name: String,
    pub iban: String,
    pub bic: String,
}

//--------------------------------------     InvoiceStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    /// Derived from `Sent`/`Dunning` and the due date. Never stored.
    Overdue,
    Cancelled,
    Dunning,
}

text_enum!(InvoiceStatus {
    Draft => "draft",
    Sent => "sent",
    Paid => "paid",
    Overdue => "overdue",
    Cancelled => "cancelled",
    Dunning => "dunning",
});

impl InvoiceStatus {
    /// The stored states an invoice may move to `self` from.
    pub fn allowed_predecessors(&self) -> &'static [InvoiceStatus] {
        use InvoiceStatus::*;
        match self {
            Sent => &[Draft],
            Paid | Cancelled => &[Sent, Dunning],
            Dunning => &[Sent],
            Draft | Overdue => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmailDeliveryStatus {
    Pending,
    Sent,
    Failed,
}

text_enum!(EmailDeliveryStatus { Pending => "pending", Sent => "sent", Failed => "failed" });

//--------------------------------------        Invoice        ---------------------------------------------------------
/// The statutory invoice for a completed payout. Recipient, issuer and bank details are snapshots taken at issue time.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: String,
    pub payout_id: i64,
    pub merchant_id: String,
    pub issue_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub recipient: Json<Party>,
    pub issuer: Json<Party>,
    pub currency: String,
    pub net_amount: Cents,
    pub vat_rate: i64,
    pub vat_amount: Cents,
    pub gross_amount: Cents,
    pub due_date: NaiveDate,
    pub bank_details: Json<BankDetails>,
    pub status: InvoiceStatus,
    pub document_path: Option<String>,
    pub email_status: EmailDeliveryStatus,
    pub email_attempts: i64,
    pub email_error: Option<String>,
    pub emailed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub dunning_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// The status as seen by people: a sent (or dunned) invoice past its due date is overdue.
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        match self.status {
            InvoiceStatus::Sent | InvoiceStatus::Dunning if today > self.due_date => InvoiceStatus::Overdue,
            s => s,
        }
    }

    pub fn period(&self) -> SettlementPeriod {
        SettlementPeriod { from: self.period_start, to: self.period_end }
    }

    pub fn totals(&self) -> InvoiceTotals {
        InvoiceTotals {
            net: self.net_amount,
            vat_rate: self.vat_rate,
            vat_amount: self.vat_amount,
            gross: self.gross_amount,
        }
    }

    pub fn document_filename(&self) -> String {
        format!("{}.html", self.invoice_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub net: Cents,
    /// VAT rate in whole percent.
    pub vat_rate: i64,
    pub vat_amount: Cents,
    pub gross: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub id: i64,
    pub invoice_id: i64,
    pub payment_id: i64,
    pub service_date: NaiveDate,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub line_total: Cents,
    pub vat_rate: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoiceLine {
    pub payment_id: i64,
    pub service_date: NaiveDate,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub line_total: Cents,
    pub vat_rate: i64,
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform operators: payouts, invoices, refunds.
    Admin,
    /// A merchant owner. Read-only access to their own settlement data.
    Owner,
    /// The booking system, which opens payments.
    Booking,
}

text_enum!(Role { Admin => "admin", Owner => "owner", Booking => "booking" });
