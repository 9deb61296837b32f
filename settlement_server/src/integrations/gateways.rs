use gateway_tools::{helpers::parse_decimal_amount, GatewayApiError, PaypalApi, PaypalOrder, StripeApi};
use log::*;
use settlement_common::Cents;
use settlement_engine::{
    db_types::Provider,
    traits::{
        CaptureResult,
        CreatePaymentRequest,
        CreatedPayment,
        PaymentGateway,
        ProviderError,
        ProviderPaymentState,
        RefundRequest,
        RefundResult,
    },
};

/// The configured payment processors. A provider without credentials is simply absent, and every call routed to it
/// fails with [`ProviderError::NotConfigured`].
#[derive(Clone, Default)]
pub struct ProviderGateways {
    stripe: Option<StripeApi>,
    paypal: Option<PaypalApi>,
}

impl ProviderGateways {
    pub fn new(stripe: Option<StripeApi>, paypal: Option<PaypalApi>) -> Self {
        Self { stripe, paypal }
    }

    pub fn paypal(&self) -> Option<&PaypalApi> {
        self.paypal.as_ref()
    }

    fn stripe_api(&self) -> Result<&StripeApi, ProviderError> {
        self.stripe.as_ref().ok_or(ProviderError::NotConfigured(Provider::Stripe))
    }

    fn paypal_api(&self) -> Result<&PaypalApi, ProviderError> {
        self.paypal.as_ref().ok_or(ProviderError::NotConfigured(Provider::Paypal))
    }

    async fn stripe_status(&self, api: &StripeApi, intent_id: &str) -> Result<ProviderPaymentState, ProviderError> {
        let intent = api.retrieve_payment_intent(intent_id).await.map_err(provider_error)?;
        let state = match intent.status.as_str() {
            "succeeded" => match &intent.latest_charge {
                Some(charge) => {
                    let charge = api.retrieve_charge(charge).await.map_err(provider_error)?;
                    if charge.refunded {
                        ProviderPaymentState::Refunded
                    } else {
                        ProviderPaymentState::Succeeded
                    }
                },
                None => ProviderPaymentState::Succeeded,
            },
            "canceled" => ProviderPaymentState::Cancelled,
            "requires_payment_method" if intent.last_payment_error.is_some() => ProviderPaymentState::Failed,
            "requires_capture" => ProviderPaymentState::RequiresCapture,
            _ => ProviderPaymentState::Open,
        };
        Ok(state)
    }
}

/// Transport problems, throttling, 5xx answers and responses we could not read leave the outcome unknown. Everything
/// else is a definite refusal.
fn provider_error(e: GatewayApiError) -> ProviderError {
    match e {
        e if e.is_transient() => ProviderError::Unavailable(e.to_string()),
        e @ (GatewayApiError::JsonError(_) | GatewayApiError::AuthError(_)) => ProviderError::Unavailable(e.to_string()),
        e => ProviderError::Rejected(e.to_string()),
    }
}

fn already_captured(e: &GatewayApiError) -> bool {
    matches!(e, GatewayApiError::QueryError { status: 422, message } if message.contains("ORDER_ALREADY_CAPTURED"))
}

fn paypal_state(order: &PaypalOrder) -> ProviderPaymentState {
    match order.status.as_str() {
        "COMPLETED" => match order.capture().map(|c| c.status.as_str()) {
            Some("REFUNDED") => ProviderPaymentState::Refunded,
            Some("DECLINED") | Some("FAILED") => ProviderPaymentState::Failed,
            Some("COMPLETED") | None => ProviderPaymentState::Succeeded,
            Some(_) => ProviderPaymentState::Open,
        },
        "APPROVED" => ProviderPaymentState::RequiresCapture,
        "VOIDED" => ProviderPaymentState::Cancelled,
        _ => ProviderPaymentState::Open,
    }
}

impl PaymentGateway for ProviderGateways {
    fn supports(&self, provider: Provider) -> bool {
        match provider {
            Provider::Stripe => self.stripe.is_some(),
            Provider::Paypal => self.paypal.is_some(),
        }
    }

    async fn create_payment(&self, request: &CreatePaymentRequest) -> Result<CreatedPayment, ProviderError> {
        match request.provider {
            Provider::Stripe => {
                let intent = self
                    .stripe_api()?
                    .create_payment_intent(
                        request.amount,
                        &request.currency,
                        &request.booking_id,
                        request.ledger_ref,
                        &request.idempotency_key,
                    )
                    .await
                    .map_err(provider_error)?;
                Ok(CreatedPayment { provider_ref: intent.id, client_action: intent.client_secret })
            },
            Provider::Paypal => {
                let order = self
                    .paypal_api()?
                    .create_order(
                        request.amount,
                        &request.currency,
                        &request.booking_id,
                        request.ledger_ref,
                        &request.idempotency_key,
                    )
                    .await
                    .map_err(provider_error)?;
                let client_action = order.approve_url().map(String::from);
                Ok(CreatedPayment { provider_ref: order.id, client_action })
            },
        }
    }

    async fn capture(&self, provider: Provider, provider_ref: &str) -> Result<CaptureResult, ProviderError> {
        match provider {
            Provider::Stripe => {
                let intent =
                    self.stripe_api()?.retrieve_payment_intent(provider_ref).await.map_err(provider_error)?;
                Ok(CaptureResult { charge_ref: intent.latest_charge, completed: intent.status == "succeeded" })
            },
            Provider::Paypal => {
                let api = self.paypal_api()?;
                let order = match api.capture_order(provider_ref, &format!("capture-{provider_ref}")).await {
                    Ok(order) => order,
                    Err(e) if already_captured(&e) => {
                        debug!("🏦️ PayPal order {provider_ref} was already captured. Fetching it instead.");
                        api.get_order(provider_ref).await.map_err(provider_error)?
                    },
                    Err(e) => return Err(provider_error(e)),
                };
                let capture = order.capture();
                let completed = capture.map(|c| c.status == "COMPLETED").unwrap_or(false);
                Ok(CaptureResult { charge_ref: capture.map(|c| c.id.clone()), completed })
            },
        }
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, ProviderError> {
        match request.provider {
            Provider::Stripe => {
                let refund = self
                    .stripe_api()?
                    .create_refund(&request.provider_ref, request.amount, &request.reason, &request.idempotency_key)
                    .await
                    .map_err(provider_error)?;
                Ok(RefundResult { refund_id: refund.id, amount: Cents::from(refund.amount) })
            },
            Provider::Paypal => {
                let api = self.paypal_api()?;
                let capture_id = match &request.charge_ref {
                    Some(id) => id.clone(),
                    None => {
                        let order = api.get_order(&request.provider_ref).await.map_err(provider_error)?;
                        order.capture().map(|c| c.id.clone()).ok_or_else(|| {
                            ProviderError::Rejected(format!("Order {} has no capture to refund", request.provider_ref))
                        })?
                    },
                };
                let refund = api
                    .refund_capture(
                        &capture_id,
                        request.amount,
                        &request.currency,
                        &request.reason,
                        &request.idempotency_key,
                    )
                    .await
                    .map_err(provider_error)?;
                let amount = refund
                    .amount
                    .as_ref()
                    .and_then(|a| parse_decimal_amount(&a.value).ok())
                    .or(request.amount)
                    .unwrap_or_default();
                Ok(RefundResult { refund_id: refund.id, amount })
            },
        }
    }

    async fn fetch_status(&self, provider: Provider, provider_ref: &str) -> Result<ProviderPaymentState, ProviderError> {
        match provider {
            Provider::Stripe => self.stripe_status(self.stripe_api()?, provider_ref).await,
            Provider::Paypal => {
                let order = self.paypal_api()?.get_order(provider_ref).await.map_err(provider_error)?;
                Ok(paypal_state(&order))
            },
        }
    }

    async fn cancel(&self, provider: Provider, provider_ref: &str) -> Result<ProviderPaymentState, ProviderError> {
        match provider {
            Provider::Stripe => {
                let api = self.stripe_api()?;
                match api.cancel_payment_intent(provider_ref).await {
                    Ok(intent) if intent.status == "canceled" => Ok(ProviderPaymentState::Cancelled),
                    Ok(_) => self.stripe_status(api, provider_ref).await,
                    Err(e) => match provider_error(e) {
                        ProviderError::Rejected(reason) => {
                            debug!("🏦️ Stripe would not cancel {provider_ref} ({reason}). Checking its status.");
                            self.stripe_status(api, provider_ref).await
                        },
                        e => Err(e),
                    },
                }
            },
            Provider::Paypal => {
                let order = self.paypal_api()?.get_order(provider_ref).await.map_err(provider_error)?;
                Ok(paypal_cancel_state(&order))
            },
        }
    }
}

/// PayPal has no void for orders that were never captured. Such an order moves no money until we capture it, and a
/// cancelled ledger entry is never captured, so it counts as cancelled.
fn paypal_cancel_state(order: &PaypalOrder) -> ProviderPaymentState {
    match paypal_state(order) {
        ProviderPaymentState::Open | ProviderPaymentState::RequiresCapture => ProviderPaymentState::Cancelled,
        state => state,
    }
}
