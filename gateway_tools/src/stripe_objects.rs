use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// `requires_payment_method`, `requires_confirmation`, `requires_action`, `processing`, `requires_capture`,
    /// `canceled` or `succeeded`.
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub client_secret: Option<String>,
    pub latest_charge: Option<String>,
    pub last_payment_error: Option<LastPaymentError>,
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// A short description of why the payment failed, for the ledger's `failure_reason`.
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(e) = &self.last_payment_error {
            return Some(e.reason());
        }
        self.cancellation_reason.clone()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastPaymentError {
    pub code: Option<String>,
    pub decline_code: Option<String>,
    pub message: Option<String>,
}

impl LastPaymentError {
    pub fn reason(&self) -> String {
        self.decline_code
            .clone()
            .or_else(|| self.code.clone())
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "payment_failed".to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    pub amount: i64,
    pub amount_refunded: i64,
    pub refunded: bool,
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub refunds: Option<StripeList<StripeRefund>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
    pub payment_intent: Option<String>,
}

/// A webhook event. Only the envelope is typed; the object is decoded on demand depending on the event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub created: i64,
    #[serde(default)]
    pub livemode: bool,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

impl StripeEvent {
    pub fn object_type(&self) -> Option<&str> {
        self.data.object["object"].as_str()
    }

    /// The payment intent carried by `payment_intent.*` events.
    pub fn payment_intent(&self) -> Option<PaymentIntent> {
        if self.object_type() != Some("payment_intent") {
            return None;
        }
        serde_json::from_value(self.data.object.clone()).ok()
    }

    /// The charge carried by `charge.*` events.
    pub fn charge(&self) -> Option<StripeCharge> {
        if self.object_type() != Some("charge") {
            return None;
        }
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_intent_events() {
        let json = r#"{
            "id": "evt_3Nx", "type": "payment_intent.payment_failed", "created": 1700000000, "livemode": false,
            "data": { "object": {
                "id": "pi_3Nx", "object": "payment_intent", "status": "requires_payment_method", "amount": 1000,
                "currency": "eur", "client_secret": "pi_3Nx_secret_abc", "latest_charge": "ch_3Nx",
                "last_payment_error": { "code": "card_declined", "decline_code": "insufficient_funds",
                    "message": "Your card has insufficient funds." },
                "metadata": { "payment_id": "42", "booking_id": "bk-1" }
            } }
        }"#;
        let event: StripeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "payment_intent.payment_failed");
        assert!(event.charge().is_none());
        let intent = event.payment_intent().unwrap();
        assert_eq!(intent.id, "pi_3Nx");
        assert_eq!(intent.failure_reason().as_deref(), Some("insufficient_funds"));
        assert_eq!(intent.metadata.get("payment_id").map(String::as_str), Some("42"));
    }

    #[test]
    fn charge_refunded_events() {
        let json = r#"{
            "id": "evt_1Ab", "type": "charge.refunded", "created": 1700000000,
            "data": { "object": {
                "id": "ch_1Ab", "object": "charge", "amount": 1000, "amount_refunded": 1000, "refunded": true,
                "payment_intent": "pi_1Ab",
                "refunds": { "object": "list", "data": [ { "id": "re_1Ab", "amount": 1000, "status": "succeeded" } ] }
            } }
        }"#;
        let event: StripeEvent = serde_json::from_str(json).unwrap();
        let charge = event.charge().unwrap();
        assert!(charge.refunded);
        assert_eq!(charge.payment_intent.as_deref(), Some("pi_1Ab"));
        assert_eq!(charge.refunds.unwrap().data[0].id, "re_1Ab");
    }
}
