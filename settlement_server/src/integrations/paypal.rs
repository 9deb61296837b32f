use gateway_tools::PaypalWebhookEvent;
use log::*;
use settlement_engine::{
    db_types::Provider,
    traits::{NormalizedEvent, PaymentOutcome},
};

use super::EventConversionError;

/// Reduces a PayPal webhook event to what the ledger needs. PayPal payments are tracked by their order id.
///
/// Returns `Ok(None)` for event types the ledger does not care about.
pub fn normalize_paypal_event(event: &PaypalWebhookEvent) -> Result<Option<NormalizedEvent>, EventConversionError> {
    let outcome = match event.event_type.as_str() {
        "CHECKOUT.ORDER.APPROVED" => PaymentOutcome::RequiresCapture,
        "PAYMENT.CAPTURE.COMPLETED" => PaymentOutcome::Succeeded,
        "PAYMENT.CAPTURE.DENIED" => PaymentOutcome::Failed,
        "PAYMENT.CAPTURE.REFUNDED" => PaymentOutcome::Refunded,
        "CHECKOUT.ORDER.VOIDED" => PaymentOutcome::Cancelled,
        other => {
            debug!("🏦️ Ignoring PayPal event {} of type {other}", event.id);
            return Ok(None);
        },
    };
    let order_id = event
        .order_id()
        .ok_or_else(|| EventConversionError(format!("{} ({}) does not name an order", event.id, event.event_type)))?;
    let mut normalized = NormalizedEvent::new(Provider::Paypal, event.id.clone(), order_id.to_string(), outcome);
    let resource_id = event.resource_id().map(String::from);
    match outcome {
        PaymentOutcome::Succeeded => {
            if let Some(capture) = resource_id {
                normalized = normalized.with_charge_ref(capture);
            }
        },
        PaymentOutcome::Failed | PaymentOutcome::Cancelled => {
            let reason = event.status_reason().unwrap_or_else(|| event.event_type.to_lowercase());
            normalized = normalized.with_failure_reason(reason);
        },
        PaymentOutcome::Refunded => {
            if let Some(refund) = resource_id {
                normalized = normalized.with_refund_id(refund);
            }
        },
        PaymentOutcome::RequiresCapture => {},
    }
    Ok(Some(normalized))
}
