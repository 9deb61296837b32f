use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::*;
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use settlement_common::Cents;
use tokio::sync::Mutex;

use crate::{
    config::PaypalConfig,
    helpers::format_decimal_amount,
    paypal_objects::{PaypalOrder, PaypalRefund, WebhookTransmission},
    GatewayApiError,
};

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// A client for the PayPal Orders, Payments and Notifications APIs.
///
/// Access tokens are fetched with the client credentials grant and shared across clones until shortly before they
/// expire.
#[derive(Clone)]
pub struct PaypalApi {
    config: PaypalConfig,
    client: Arc<Client>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl PaypalApi {
    pub fn new(config: PaypalConfig) -> Result<Self, GatewayApiError> {
        let client = Client::builder().build().map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: Arc::new(Mutex::new(None)) })
    }

    pub fn config(&self) -> &PaypalConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url().trim_end_matches('/'))
    }

    async fn access_token(&self) -> Result<String, GatewayApiError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }
        let mut cached = self.token.lock().await;
        if let Some(t) = cached.as_ref() {
            if t.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(t.token.clone());
            }
        }
        trace!("🏦️ Fetching a new PayPal access token");
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.reveal()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| GatewayApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayApiError::QueryError { status: status.as_u16(), message: "token endpoint".into() });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayApiError::AuthError(format!("{status}: {message}")));
        }
        let body = response.json::<TokenResponse>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
        let token = body.access_token.clone();
        *cached = Some(CachedToken { token: body.access_token, expires_at: Utc::now() + Duration::seconds(body.expires_in) });
        debug!("🏦️ PayPal access token refreshed, valid for {}s", body.expires_in);
        Ok(token)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayApiError> {
        let token = self.access_token().await?;
        let response = req.bearer_auth(token).send().await.map_err(|e| GatewayApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("🏦️ PayPal query successful. {status}");
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let body = response.text().await.map_err(|e| GatewayApiError::Transport(e.to_string()))?;
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    v["details"][0]["issue"].as_str().or(v["name"].as_str()).or(v["message"].as_str()).map(String::from)
                })
                .unwrap_or(body);
            Err(GatewayApiError::QueryError { status: status.as_u16(), message })
        }
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        request_id: Option<&str>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("🏦️ POST {url}");
        let mut req = self.client.request(Method::POST, url).header("Prefer", "return=representation").json(body);
        if let Some(id) = request_id {
            req = req.header("PayPal-Request-Id", id);
        }
        self.send(req).await
    }

    /// Creates an order with intent `CAPTURE`. The payer approves it at the returned approval link.
    pub async fn create_order(
        &self,
        amount: Cents,
        currency: &str,
        booking_id: &str,
        ledger_ref: i64,
        request_id: &str,
    ) -> Result<PaypalOrder, GatewayApiError> {
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": booking_id,
                "custom_id": ledger_ref.to_string(),
                "amount": { "currency_code": currency, "value": format_decimal_amount(amount) }
            }]
        });
        let order: PaypalOrder = self.post_json("/v2/checkout/orders", &body, Some(request_id)).await?;
        debug!("🏦️ PayPal order {} created for payment {ledger_ref}", order.id);
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &str) -> Result<PaypalOrder, GatewayApiError> {
        let url = self.url(&format!("/v2/checkout/orders/{order_id}"));
        self.send(self.client.request(Method::GET, url)).await
    }

    /// Captures an approved order. The request id makes repeated captures of the same order safe.
    pub async fn capture_order(&self, order_id: &str, request_id: &str) -> Result<PaypalOrder, GatewayApiError> {
        let path = format!("/v2/checkout/orders/{order_id}/capture");
        let order: PaypalOrder = self.post_json(&path, &json!({}), Some(request_id)).await?;
        info!("🏦️ PayPal order {order_id} captured ({})", order.status);
        Ok(order)
    }

    /// Refunds a capture. Without an amount, the full captured amount is refunded.
    pub async fn refund_capture(
        &self,
        capture_id: &str,
        amount: Option<Cents>,
        currency: &str,
        note: &str,
        request_id: &str,
    ) -> Result<PaypalRefund, GatewayApiError> {
        let mut body = json!({ "note_to_payer": note });
        if let Some(amount) = amount {
            body["amount"] = json!({ "currency_code": currency, "value": format_decimal_amount(amount) });
        }
        let path = format!("/v2/payments/captures/{capture_id}/refund");
        let refund: PaypalRefund = self.post_json(&path, &body, Some(request_id)).await?;
        info!("🏦️ PayPal refund {} created for capture {capture_id}", refund.id);
        Ok(refund)
    }

    /// Asks PayPal whether a webhook delivery is authentic. `event` must be the parsed body exactly as received.
    pub async fn verify_webhook_signature(
        &self,
        transmission: &WebhookTransmission,
        event: &Value,
    ) -> Result<bool, GatewayApiError> {
        #[derive(Deserialize)]
        struct VerificationResponse {
            verification_status: String,
        }
        let body = json!({
            "auth_algo": transmission.auth_algo,
            "cert_url": transmission.cert_url,
            "transmission_id": transmission.transmission_id,
            "transmission_sig": transmission.transmission_sig,
            "transmission_time": transmission.transmission_time,
            "webhook_id": self.config.webhook_id,
            "webhook_event": event,
        });
        let result: VerificationResponse =
            self.post_json("/v1/notifications/verify-webhook-signature", &body, None).await?;
        let verified = result.verification_status == "SUCCESS";
        trace!("🔐️ PayPal webhook {} verification: {}", transmission.transmission_id, result.verification_status);
        Ok(verified)
    }
}
