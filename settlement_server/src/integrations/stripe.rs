use gateway_tools::StripeEvent;
use log::*;
use settlement_engine::{
    db_types::Provider,
    traits::{NormalizedEvent, PaymentOutcome},
};

use super::EventConversionError;

/// Reduces a Stripe event to what the ledger needs.
///
/// Returns `Ok(None)` for event types the ledger does not care about; those are acknowledged and dropped. Partial
/// refunds are dropped too, since the ledger only refunds in full.
pub fn normalize_stripe_event(event: &StripeEvent) -> Result<Option<NormalizedEvent>, EventConversionError> {
    let outcome = match event.event_type.as_str() {
        "payment_intent.succeeded" => PaymentOutcome::Succeeded,
        "payment_intent.payment_failed" => PaymentOutcome::Failed,
        "payment_intent.canceled" => PaymentOutcome::Cancelled,
        "payment_intent.amount_capturable_updated" => PaymentOutcome::RequiresCapture,
        "charge.refunded" => return normalize_refund(event),
        other => {
            debug!("🏦️ Ignoring Stripe event {} of type {other}", event.id);
            return Ok(None);
        },
    };
    let intent = event
        .payment_intent()
        .ok_or_else(|| EventConversionError(format!("{} does not carry a payment intent", event.id)))?;
    let mut normalized = NormalizedEvent::new(Provider::Stripe, event.id.clone(), intent.id.clone(), outcome);
    if let Some(charge) = &intent.latest_charge {
        normalized = normalized.with_charge_ref(charge.clone());
    }
    match outcome {
        PaymentOutcome::Failed => {
            let reason = intent.failure_reason().unwrap_or_else(|| "The payment failed".to_string());
            normalized = normalized.with_failure_reason(reason);
        },
        PaymentOutcome::Cancelled => {
            let reason = intent.cancellation_reason.clone().unwrap_or_else(|| "canceled".to_string());
            normalized = normalized.with_failure_reason(reason);
        },
        _ => {},
    }
    Ok(Some(normalized))
}

fn normalize_refund(event: &StripeEvent) -> Result<Option<NormalizedEvent>, EventConversionError> {
    let charge =
        event.charge().ok_or_else(|| EventConversionError(format!("{} does not carry a charge", event.id)))?;
    if !charge.refunded {
        info!(
            "🏦️ Charge {} was partially refunded ({} of {}). Partial refunds are not settled automatically.",
            charge.id, charge.amount_refunded, charge.amount
        );
        return Ok(None);
    }
    let intent = charge
        .payment_intent
        .clone()
        .ok_or_else(|| EventConversionError(format!("Charge {} has no payment intent", charge.id)))?;
    let mut normalized = NormalizedEvent::new(Provider::Stripe, event.id.clone(), intent, PaymentOutcome::Refunded)
        .with_charge_ref(charge.id.clone());
    if let Some(refund) = charge.refunds.as_ref().and_then(|r| r.data.first()) {
        normalized = normalized.with_refund_id(refund.id.clone());
    }
    Ok(Some(normalized))
}
