use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaypalAmount {
    pub currency_code: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaypalLink {
    pub href: String,
    pub rel: String,
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaypalOrder {
    pub id: String,
    /// `CREATED`, `SAVED`, `APPROVED`, `VOIDED`, `COMPLETED` or `PAYER_ACTION_REQUIRED`.
    pub status: String,
    #[serde(default)]
    pub links: Vec<PaypalLink>,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
}

impl PaypalOrder {
    /// Where the payer approves the order.
    pub fn approve_url(&self) -> Option<&str> {
        self.links.iter().find(|l| l.rel == "approve" || l.rel == "payer-action").map(|l| l.href.as_str())
    }

    /// The capture of the first purchase unit, once the order has been captured.
    pub fn capture(&self) -> Option<&PaypalCapture> {
        self.purchase_units.iter().filter_map(|u| u.payments.as_ref()).flat_map(|p| p.captures.iter()).next()
    }

    pub fn is_refunded(&self) -> bool {
        self.capture().map(|c| c.status == "REFUNDED").unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurchaseUnit {
    pub reference_id: Option<String>,
    pub custom_id: Option<String>,
    pub amount: Option<PaypalAmount>,
    pub payments: Option<PaymentCollection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentCollection {
    #[serde(default)]
    pub captures: Vec<PaypalCapture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaypalCapture {
    pub id: String,
    /// `COMPLETED`, `DECLINED`, `PARTIALLY_REFUNDED`, `PENDING`, `REFUNDED` or `FAILED`.
    pub status: String,
    pub amount: Option<PaypalAmount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaypalRefund {
    pub id: String,
    pub status: String,
    pub amount: Option<PaypalAmount>,
}

/// A webhook notification. The resource is decoded on demand, since its shape depends on the event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaypalWebhookEvent {
    pub id: String,
    pub event_type: String,
    pub resource_type: Option<String>,
    pub summary: Option<String>,
    pub resource: Value,
}

impl PaypalWebhookEvent {
    pub fn resource_id(&self) -> Option<&str> {
        self.resource["id"].as_str()
    }

    /// The order the event belongs to. Order events carry it as the resource id; capture and refund events carry it
    /// in the related ids.
    pub fn order_id(&self) -> Option<&str> {
        if self.event_type.starts_with("CHECKOUT.ORDER.") {
            return self.resource_id();
        }
        self.resource["supplementary_data"]["related_ids"]["order_id"].as_str()
    }

    /// A human readable reason for denials, when PayPal supplies one.
    pub fn status_reason(&self) -> Option<String> {
        self.resource["status_details"]["reason"].as_str().map(String::from).or_else(|| self.summary.clone())
    }
}

/// The `PAYPAL-*` transmission headers that accompany each webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookTransmission {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
}

impl WebhookTransmission {
    /// Collects the transmission headers through `header`, which looks up a header value by name. Returns `None` if
    /// any of them is missing.
    pub fn from_headers<F>(header: F) -> Option<Self>
    where F: Fn(&str) -> Option<String> {
        Some(Self {
            auth_algo: header("PAYPAL-AUTH-ALGO")?,
            cert_url: header("PAYPAL-CERT-URL")?,
            transmission_id: header("PAYPAL-TRANSMISSION-ID")?,
            transmission_sig: header("PAYPAL-TRANSMISSION-SIG")?,
            transmission_time: header("PAYPAL-TRANSMISSION-TIME")?,
        })
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn capture_events_point_at_their_order() {
        let json = r#"{
            "id": "WH-58D329510W468432D-8HN650336L201105X",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource_type": "capture",
            "summary": "Payment completed for EUR 10.0 EUR",
            "resource": {
                "id": "42311647XV020574X",
                "status": "COMPLETED",
                "amount": { "currency_code": "EUR", "value": "10.00" },
                "supplementary_data": { "related_ids": { "order_id": "5O190127TN364715T" } }
            }
        }"#;
        let event: PaypalWebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.order_id(), Some("5O190127TN364715T"));
        assert_eq!(event.resource_id(), Some("42311647XV020574X"));
    }

    #[test]
    fn order_events_are_their_own_order() {
        let json = r#"{
            "id": "WH-COC11055RA711503B-4YM959094A144403T",
            "event_type": "CHECKOUT.ORDER.APPROVED",
            "resource": { "id": "5O190127TN364715T", "status": "APPROVED" }
        }"#;
        let event: PaypalWebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.order_id(), Some("5O190127TN364715T"));
    }

    #[test]
    fn orders() {
        let json = r#"{
            "id": "5O190127TN364715T", "status": "COMPLETED",
            "links": [ { "href": "https://www.paypal.com/checkoutnow?token=5O190127TN364715T", "rel": "approve", "method": "GET" } ],
            "purchase_units": [ { "reference_id": "bk-1", "custom_id": "42", "payments": { "captures": [
                { "id": "3C679366HH908993F", "status": "REFUNDED", "amount": { "currency_code": "EUR", "value": "10.00" } }
            ] } } ]
        }"#;
        let order: PaypalOrder = serde_json::from_str(json).unwrap();
        assert_eq!(order.approve_url(), Some("https://www.paypal.com/checkoutnow?token=5O190127TN364715T"));
        assert_eq!(order.capture().map(|c| c.id.as_str()), Some("3C679366HH908993F"));
        assert!(order.is_refunded());
    }

    #[test]
    fn transmission_headers() {
        let headers = HashMap::from([
            ("PAYPAL-AUTH-ALGO", "SHA256withRSA"),
            ("PAYPAL-CERT-URL", "https://api.paypal.com/v1/notifications/certs/CERT-360caa42"),
            ("PAYPAL-TRANSMISSION-ID", "103e3700-8b41-11ea-8a71-47c3e0a8c5d2"),
            ("PAYPAL-TRANSMISSION-SIG", "c8a2d2c6"),
            ("PAYPAL-TRANSMISSION-TIME", "2026-10-01T10:00:00Z"),
        ]);
        let lookup = |name: &str| headers.get(name).map(|v| v.to_string());
        let transmission = WebhookTransmission::from_headers(lookup).unwrap();
        assert_eq!(transmission.auth_algo, "SHA256withRSA");
        assert!(WebhookTransmission::from_headers(|_| None).is_none());
    }
}
