use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, Payment, Payout};

/// A payment moved to `succeeded` and the merchant was credited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceededEvent {
    pub payment: Payment,
}

impl PaymentSucceededEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

/// A payment was refunded and the merchant credit was reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedEvent {
    pub payment: Payment,
}

impl PaymentRefundedEvent {
    pub fn new(payment: Payment) -> Self {
        Self { payment }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutCompletedEvent {
    pub payout: Payout,
}

impl PayoutCompletedEvent {
    pub fn new(payout: Payout) -> Self {
        Self { payout }
    }
}

/// An invoice was created. The document and email may or may not have succeeded; check the invoice fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceIssuedEvent {
    pub invoice: Invoice,
}

impl InvoiceIssuedEvent {
    pub fn new(invoice: Invoice) -> Self {
        Self { invoice }
    }
}
