//! Provider callbacks.
//!
//! Both providers deliver at least once and retry anything that is not answered with a 2xx. So a delivery is only
//! acknowledged once its effect is durably recorded in the ledger, or once it is known to be irrelevant (an event type
//! the ledger ignores, or a duplicate). Unknown payments and database errors are answered with an error so that the
//! provider tries again later.
use actix_web::{web, HttpRequest, HttpResponse};
use gateway_tools::{PaypalWebhookEvent, StripeEvent, WebhookTransmission};
use log::*;
use serde_json::Value;
use settlement_engine::{
    traits::{EventApplication, NormalizedEvent, PaymentGateway, PaymentLedger},
    PaymentFlowApi,
};

use crate::{
    data_objects::JsonResponse,
    errors::ServerError,
    helpers::header_value,
    integrations::{gateways::ProviderGateways, paypal::normalize_paypal_event, stripe::normalize_stripe_event},
    route,
};

route!(stripe_webhook => Post "" impl <B: PaymentLedger, G: PaymentGateway>);
/// Receives Stripe events. The signature has already been checked by the Stripe signature middleware.
pub async fn stripe_webhook<B, G>(
    body: web::Bytes,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    let event: StripeEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!("🏦️ Could not parse Stripe event. {e}");
        ServerError::InvalidRequestBody(e.to_string())
    })?;
    trace!("🏦️ Received Stripe event {} ({})", event.id, event.event_type);
    let normalized = normalize_stripe_event(&event).map_err(|e| {
        warn!("🏦️ {e}");
        ServerError::InvalidWebhook(e.to_string())
    })?;
    apply_event(normalized, api.as_ref()).await
}

route!(paypal_webhook => Post "/paypal" impl <B: PaymentLedger, G: PaymentGateway>);
/// Receives PayPal events. PayPal does not sign with a shared secret, so each delivery is verified by asking PayPal's
/// verification API about its transmission headers before the payload is trusted.
pub async fn paypal_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    gateways: web::Data<ProviderGateways>,
    api: web::Data<PaymentFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    let paypal = gateways.paypal().ok_or_else(|| {
        warn!("🏦️ Received a PayPal webhook, but PayPal is not configured");
        ServerError::InvalidWebhook("PayPal is not configured".into())
    })?;
    let transmission = WebhookTransmission::from_headers(|name| header_value(req.headers(), name))
        .ok_or_else(|| ServerError::InvalidWebhook("Missing PayPal transmission headers".into()))?;
    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let verified = paypal.verify_webhook_signature(&transmission, &payload).await.map_err(|e| {
        warn!("🔐️ Could not verify PayPal webhook {}. {e}", transmission.transmission_id);
        ServerError::BackendError(format!("PayPal webhook verification is unavailable. {e}"))
    })?;
    if !verified {
        warn!("🔐️ PayPal webhook {} failed verification", transmission.transmission_id);
        return Err(ServerError::InvalidWebhook("Signature verification failed".into()));
    }
    let event: PaypalWebhookEvent =
        serde_json::from_value(payload).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    trace!("🏦️ Received PayPal event {} ({})", event.id, event.event_type);
    let normalized = normalize_paypal_event(&event).map_err(|e| {
        warn!("🏦️ {e}");
        ServerError::InvalidWebhook(e.to_string())
    })?;
    apply_event(normalized, api.as_ref()).await
}

async fn apply_event<B, G>(
    event: Option<NormalizedEvent>,
    api: &PaymentFlowApi<B, G>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    let Some(event) = event else {
        return Ok(HttpResponse::Ok().json(JsonResponse::success("Event type ignored.")));
    };
    let event_id = event.event_id.clone();
    let result = match api.handle_provider_event(event).await {
        Ok(EventApplication::Applied { payment, outcome }) => {
            info!("🏦️ Event {event_id} applied: payment {} is now {} ({outcome:?})", payment.id, payment.status);
            JsonResponse::success("Event applied.")
        },
        Ok(EventApplication::Duplicate) => {
            debug!("🏦️ Event {event_id} was already processed");
            JsonResponse::success("Event already processed.")
        },
        Ok(EventApplication::Ignored(payment)) => {
            debug!("🏦️ Event {event_id} does not change payment {} ({})", payment.id, payment.status);
            JsonResponse::success("Event does not apply.")
        },
        Err(e) => {
            warn!("🏦️ Could not apply event {event_id}. {e}");
            return Err(e.into());
        },
    };
    Ok(HttpResponse::Ok().json(result))
}
