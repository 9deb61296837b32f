use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
    RequestBuilder,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use settlement_common::Cents;

use crate::{
    config::StripeConfig,
    helpers::stripe_currency,
    stripe_objects::{PaymentIntent, StripeCharge, StripeRefund},
    GatewayApiError,
};

/// A client for the parts of the Stripe REST API the settlement core needs. Requests are form encoded and every
/// mutating call carries an `Idempotency-Key`.
#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayApiError> {
        let response = req.send().await.map_err(|e| GatewayApiError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("🏦️ Stripe query successful. {status}");
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let body = response.text().await.map_err(|e| GatewayApiError::Transport(e.to_string()))?;
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| {
                    let err = &v["error"];
                    err["decline_code"].as_str().or(err["code"].as_str()).or(err["message"].as_str()).map(String::from)
                })
                .unwrap_or(body);
            Err(GatewayApiError::QueryError { status: status.as_u16(), message })
        }
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
        idempotency_key: &str,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("🏦️ POST {url} (idempotency key {idempotency_key})");
        let req = self.client.request(Method::POST, url).header("Idempotency-Key", idempotency_key).form(form);
        self.send(req).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("🏦️ GET {url}");
        self.send(self.client.request(Method::GET, url)).await
    }

    /// Creates a payment intent that captures automatically once the payer confirms it.
    pub async fn create_payment_intent(
        &self,
        amount: Cents,
        currency: &str,
        booking_id: &str,
        ledger_ref: i64,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayApiError> {
        let form = [
            ("amount", amount.value().to_string()),
            ("currency", stripe_currency(currency)),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[booking_id]", booking_id.to_string()),
            ("metadata[payment_id]", ledger_ref.to_string()),
        ];
        let intent: PaymentIntent = self.post_form("/payment_intents", &form, idempotency_key).await?;
        debug!("🏦️ Stripe payment intent {} created for payment {ledger_ref}", intent.id);
        Ok(intent)
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayApiError> {
        self.get(&format!("/payment_intents/{id}")).await
    }

    /// Cancels a payment intent that has not been paid. Stripe refuses once the intent has succeeded or is processing.
    pub async fn cancel_payment_intent(&self, id: &str) -> Result<PaymentIntent, GatewayApiError> {
        let form = [("cancellation_reason", "abandoned".to_string())];
        let intent: PaymentIntent =
            self.post_form(&format!("/payment_intents/{id}/cancel"), &form, &format!("cancel-{id}")).await?;
        info!("🏦️ Stripe payment intent {id} is now {}", intent.status);
        Ok(intent)
    }

    pub async fn retrieve_charge(&self, id: &str) -> Result<StripeCharge, GatewayApiError> {
        self.get(&format!("/charges/{id}")).await
    }

    /// Refunds a payment intent. Without an amount, the full remaining amount is refunded.
    pub async fn create_refund(
        &self,
        payment_intent: &str,
        amount: Option<Cents>,
        note: &str,
        idempotency_key: &str,
    ) -> Result<StripeRefund, GatewayApiError> {
        let mut form = vec![
            ("payment_intent", payment_intent.to_string()),
            ("reason", "requested_by_customer".to_string()),
            ("metadata[note]", note.to_string()),
        ];
        if let Some(amount) = amount {
            form.push(("amount", amount.value().to_string()));
        }
        let refund: StripeRefund = self.post_form("/refunds", &form, idempotency_key).await?;
        info!("🏦️ Stripe refund {} created for {payment_intent}", refund.id);
        Ok(refund)
    }
}
