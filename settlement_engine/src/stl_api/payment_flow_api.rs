use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use settlement_common::{helpers::normalize_currency_code, Cents};

use crate::{
    db_types::{NewPayment, Payment, PaymentPayoutStatus, PaymentStatus},
    events::{EventProducers, PaymentRefundedEvent, PaymentSucceededEvent},
    fees::FeeSplit,
    stl_api::{
        payment_objects::{
            InitiationStatus,
            LedgerSettings,
            PaymentInitiation,
            PaymentRequest,
            ReconciliationReport,
            RefundOutcome,
            PAYMENT_FAILED_MESSAGE,
            PAYMENT_IN_PROGRESS_MESSAGE,
        },
        with_provider_timeout,
    },
    traits::{
        CreatePaymentRequest,
        EventApplication,
        NormalizedEvent,
        PaymentGateway,
        PaymentLedger,
        PaymentOutcome,
        ProviderError,
        ProviderPaymentState,
        RefundEntry,
        RefundRequest,
        SettlementError,
    },
};

/// `PaymentFlowApi` drives a payment from the booking system's request, through the provider, into the ledger.
///
/// Provider failures never escape as errors. A refusal is stored on the payment as a failure reason, and an
/// unreachable provider leaves the payment `processing` for the reconciliation job.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
    settings: LedgerSettings,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi ({:?})", self.settings)
    }
}

impl<B, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateway: G, settings: LedgerSettings, producers: EventProducers) -> Self {
        Self { db, gateway, settings, producers }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// The fee split for a booking total, without recording anything. The booking system uses the same policy the
    /// ledger does.
    pub fn quote(&self, amount: Cents) -> Result<FeeSplit, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::Validation(format!("The amount must be positive, not {amount}")));
        }
        Ok(self.settings.fees.split(amount))
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: PaymentLedger,
    G: PaymentGateway,
{
    pub fn db(&self) -> &B {
        &self.db
    }

    pub async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, SettlementError> {
        self.db.fetch_payment(id).await
    }

    /// Records the payment intent and opens the payment with the provider.
    pub async fn create_payment(&self, request: PaymentRequest) -> Result<PaymentInitiation, SettlementError> {
        let split = self.quote(request.amount)?;
        let currency = match &request.currency {
            Some(c) => normalize_currency_code(c)
                .ok_or_else(|| SettlementError::Validation(format!("Invalid currency code: {c}")))?,
            None => self.settings.currency.clone(),
        };
        if currency != self.settings.currency {
            return Err(SettlementError::Validation(format!(
                "Payments must be made in {}, not {currency}",
                self.settings.currency
            )));
        }
        if !self.gateway.supports(request.provider) {
            return Err(SettlementError::Validation(format!("Payment provider {} is not available", request.provider)));
        }
        let intent = NewPayment {
            booking_id: request.booking_id,
            payer_id: request.payer_id,
            merchant_id: request.merchant_id,
            amount: request.amount,
            currency,
            provider: request.provider,
        };
        let payment = self.db.record_intent(intent, split).await?;
        debug!("🔄️💳️ {payment} recorded. Opening it with {}", payment.provider);
        self.open_with_provider(payment).await
    }

    async fn open_with_provider(&self, payment: Payment) -> Result<PaymentInitiation, SettlementError> {
        let request = CreatePaymentRequest {
            provider: payment.provider,
            ledger_ref: payment.id,
            booking_id: payment.booking_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            idempotency_key: format!("payment-{}", payment.id),
        };
        let result = with_provider_timeout(self.settings.provider_timeout, self.gateway.create_payment(&request)).await;
        match result {
            Ok(created) => {
                let payment = self.db.attach_provider_ref(payment.id, &created.provider_ref).await?;
                info!("🔄️💳️ Payment {} opened with {} as {}", payment.id, payment.provider, created.provider_ref);
                Ok(PaymentInitiation {
                    status: InitiationStatus::Started,
                    payment,
                    client_action: created.client_action,
                    message: "Payment started".into(),
                })
            },
            Err(ProviderError::Unavailable(e)) => {
                warn!(
                    "🔄️💳️ {} is unavailable for payment {}: {e}. Leaving it for reconciliation.",
                    payment.provider, payment.id
                );
                let payment = self.db.mark_processing(payment.id).await?;
                Ok(PaymentInitiation {
                    status: InitiationStatus::InProgress,
                    payment,
                    client_action: None,
                    message: PAYMENT_IN_PROGRESS_MESSAGE.into(),
                })
            },
            Err(e) => {
                warn!("🔄️💳️ {} refused payment {}: {e}", payment.provider, payment.id);
                let failed = self.db.mark_failed(payment.id, &e.to_string()).await?;
                let payment = match failed {
                    Some(p) => p,
                    None => self.require_payment(payment.id).await?,
                };
                Ok(PaymentInitiation {
                    status: InitiationStatus::Failed,
                    payment,
                    client_action: None,
                    message: PAYMENT_FAILED_MESSAGE.into(),
                })
            },
        }
    }

    /// Applies a verified, normalized provider event. Safe to call any number of times with the same event.
    ///
    /// Approved payments that need an explicit capture are captured straight away.
    pub async fn handle_provider_event(&self, event: NormalizedEvent) -> Result<EventApplication, SettlementError> {
        let application = self.db.apply_provider_event(&event).await?;
        match &application {
            EventApplication::Applied { payment, outcome } => {
                debug!("🔄️📨️ {} event {} applied to payment {}", event.provider, event.event_id, payment.id);
                if *outcome == PaymentOutcome::RequiresCapture {
                    if let Some(captured) = self.capture(payment).await? {
                        return Ok(captured);
                    }
                }
                self.publish(&application).await;
            },
            EventApplication::Duplicate => {
                debug!("🔄️📨️ {} event {} was already applied", event.provider, event.event_id);
            },
            EventApplication::Ignored(payment) => {
                debug!(
                    "🔄️📨️ {} event {} ({}) ignored for payment {} in status {}",
                    event.provider,
                    event.event_id,
                    event.outcome.as_str(),
                    payment.id,
                    payment.status
                );
            },
        }
        Ok(application)
    }

    /// Captures an approved payment. Returns the application of the resulting success if the capture completed
    /// synchronously.
    async fn capture(&self, payment: &Payment) -> Result<Option<EventApplication>, SettlementError> {
        let Some(provider_ref) = payment.provider_ref.as_deref() else {
            warn!("🔄️💳️ Payment {} needs capturing but has no provider reference", payment.id);
            return Ok(None);
        };
        let result = with_provider_timeout(
            self.settings.provider_timeout,
            self.gateway.capture(payment.provider, provider_ref),
        )
        .await;
        match result {
            Ok(capture) if capture.completed => {
                let mut event = NormalizedEvent::new(
                    payment.provider,
                    format!("capture:{provider_ref}"),
                    provider_ref.to_string(),
                    PaymentOutcome::Succeeded,
                );
                event.charge_ref = capture.charge_ref;
                let application = self.db.apply_provider_event(&event).await?;
                self.publish(&application).await;
                Ok(Some(application))
            },
            Ok(_) => {
                debug!("🔄️💳️ Capture of payment {} is pending at {}", payment.id, payment.provider);
                Ok(None)
            },
            Err(ProviderError::Unavailable(e)) => {
                warn!("🔄️💳️ Could not capture payment {}: {e}. Reconciliation will retry.", payment.id);
                Ok(None)
            },
            Err(e) => {
                warn!("🔄️💳️ {} refused to capture payment {}: {e}", payment.provider, payment.id);
                let failed = self.db.mark_failed(payment.id, &e.to_string()).await?;
                Ok(failed.map(|payment| EventApplication::Applied { payment, outcome: PaymentOutcome::Failed }))
            },
        }
    }

    async fn publish(&self, application: &EventApplication) {
        if let EventApplication::Applied { payment, outcome } = application {
            match outcome {
                PaymentOutcome::Succeeded => {
                    self.producers.publish_payment_succeeded(PaymentSucceededEvent::new(payment.clone())).await
                },
                PaymentOutcome::Refunded => {
                    self.producers.publish_payment_refunded(PaymentRefundedEvent::new(payment.clone())).await
                },
                _ => {},
            }
        }
    }

    /// Refunds a succeeded payment in full and reverses the merchant credit.
    pub async fn refund(&self, payment_id: i64, reason: &str) -> Result<RefundOutcome, SettlementError> {
        let payment = self.require_payment(payment_id).await?;
        if payment.status != PaymentStatus::Succeeded {
            return Err(SettlementError::Conflict(format!(
                "Payment {payment_id} is {}. Only succeeded payments can be refunded",
                payment.status
            )));
        }
        if payment.payout_status == PaymentPayoutStatus::Processing {
            return Err(SettlementError::Conflict(format!(
                "Payment {payment_id} is part of payout {} which is still in flight. Cancel the payout first",
                payment.payout_id.unwrap_or_default()
            )));
        }
        let provider_ref = payment.provider_ref.clone().ok_or_else(|| {
            SettlementError::Validation(format!("Payment {payment_id} has no provider reference to refund against"))
        })?;
        let request = RefundRequest {
            provider: payment.provider,
            provider_ref,
            charge_ref: payment.provider_charge_ref.clone(),
            amount: Some(payment.amount),
            currency: payment.currency.clone(),
            reason: reason.to_string(),
            idempotency_key: format!("refund-{payment_id}"),
        };
        let result = with_provider_timeout(self.settings.provider_timeout, self.gateway.refund(&request)).await;
        let refund = match result {
            Ok(r) => r,
            Err(ProviderError::Unavailable(e)) => {
                warn!("🔄️↩️ Refund of payment {payment_id} was not confirmed: {e}. Waiting for the provider webhook.");
                return Ok(RefundOutcome::Submitted(payment));
            },
            Err(ProviderError::Rejected(e)) => return Err(SettlementError::ProviderRejected(e)),
            Err(e) => return Err(SettlementError::Validation(e.to_string())),
        };
        let amount = if refund.amount.is_positive() { refund.amount } else { payment.amount };
        let entry = RefundEntry { refund_id: refund.refund_id, amount, reason: reason.to_string() };
        match self.db.record_refund(payment_id, entry).await? {
            Some(refunded) => {
                if refunded.payout_status == PaymentPayoutStatus::Paid {
                    warn!(
                        "🔄️↩️ Payment {payment_id} had already been paid out. Merchant {} now owes {}",
                        refunded.merchant_id, refunded.business_fee
                    );
                }
                info!(
                    "🔄️↩️ Payment {payment_id} refunded. {} reversed from {}",
                    refunded.business_fee, refunded.merchant_id
                );
                self.producers.publish_payment_refunded(PaymentRefundedEvent::new(refunded.clone())).await;
                Ok(RefundOutcome::Refunded(refunded))
            },
            None => {
                let current = self.require_payment(payment_id).await?;
                if current.status == PaymentStatus::Refunded {
                    debug!("🔄️↩️ Payment {payment_id} was refunded concurrently");
                    Ok(RefundOutcome::Refunded(current))
                } else {
                    Err(SettlementError::Conflict(format!(
                        "Payment {payment_id} changed to {} while the refund was in flight",
                        current.status
                    )))
                }
            },
        }
    }

    /// Resolves payments that have been open for longer than `stale_after` by asking the provider.
    ///
    /// After `abandon_after`, a payment the provider never heard of is marked failed, and one the payer never completed
    /// is cancelled at the provider. A payment with a provider reference is never failed here: while the provider
    /// cannot be reached it may already hold the money, so it stays open.
    pub async fn reconcile_payments(
        &self,
        stale_after: Duration,
        abandon_after: Duration,
    ) -> Result<ReconciliationReport, SettlementError> {
        let stale = self.db.fetch_stale_open_payments(stale_after).await?;
        let mut report = ReconciliationReport { checked: stale.len(), ..Default::default() };
        for payment in stale {
            let abandon = Utc::now() - payment.created_at > abandon_after;
            let result = match payment.provider_ref.clone() {
                Some(provider_ref) => self.reconcile_with_status(&payment, &provider_ref, abandon, &mut report).await,
                None => self.reconcile_without_ref(payment.clone(), abandon, &mut report).await,
            };
            if let Err(e) = result {
                error!("🔄️🧮️ Could not reconcile payment {}: {e}", payment.id);
                report.errors += 1;
            }
        }
        if report.checked > 0 {
            info!("🔄️🧮️ Reconciliation finished: {report:?}");
        }
        Ok(report)
    }

    async fn reconcile_with_status(
        &self,
        payment: &Payment,
        provider_ref: &str,
        abandon: bool,
        report: &mut ReconciliationReport,
    ) -> Result<(), SettlementError> {
        let timeout = self.settings.provider_timeout;
        let mut status = with_provider_timeout(timeout, self.gateway.fetch_status(payment.provider, provider_ref)).await;
        let mut cancelled_here = false;
        if abandon && status == Ok(ProviderPaymentState::Open) {
            status = with_provider_timeout(timeout, self.gateway.cancel(payment.provider, provider_ref)).await;
            cancelled_here = status == Ok(ProviderPaymentState::Cancelled);
        }
        let outcomes: &[PaymentOutcome] = match status {
            Ok(ProviderPaymentState::Succeeded) => &[PaymentOutcome::Succeeded],
            Ok(ProviderPaymentState::Failed) => &[PaymentOutcome::Failed],
            Ok(ProviderPaymentState::Cancelled) => &[PaymentOutcome::Cancelled],
            Ok(ProviderPaymentState::Refunded) => &[PaymentOutcome::Succeeded, PaymentOutcome::Refunded],
            Ok(ProviderPaymentState::RequiresCapture) => &[PaymentOutcome::RequiresCapture],
            Ok(ProviderPaymentState::Open) => {
                report.still_open += 1;
                return Ok(());
            },
            Err(ProviderError::Unavailable(e)) => {
                debug!("🔄️🧮️ {} still unavailable for payment {}: {e}", payment.provider, payment.id);
                report.still_open += 1;
                return Ok(());
            },
            Err(e) => {
                warn!("🔄️🧮️ {} could not report on payment {}: {e}", payment.provider, payment.id);
                report.errors += 1;
                return Ok(());
            },
        };
        for outcome in outcomes {
            let mut event = NormalizedEvent::new(
                payment.provider,
                format!("reconcile:{}:{}", payment.id, outcome.as_str()),
                provider_ref,
                *outcome,
            );
            if cancelled_here {
                event.failure_reason = Some("the payment was not completed in time".into());
            }
            self.handle_provider_event(event).await?;
        }
        let resolved = self.require_payment(payment.id).await?;
        if resolved.status.is_open() {
            report.still_open += 1;
        } else if cancelled_here && resolved.status == PaymentStatus::Cancelled {
            warn!("🔄️🧮️ Payment {} was never completed and has been cancelled at {}", payment.id, payment.provider);
            report.abandoned += 1;
        } else {
            report.resolved += 1;
        }
        Ok(())
    }

    async fn reconcile_without_ref(
        &self,
        payment: Payment,
        abandon: bool,
        report: &mut ReconciliationReport,
    ) -> Result<(), SettlementError> {
        let id = payment.id;
        let initiation = self.open_with_provider(payment).await?;
        match initiation.status {
            InitiationStatus::Started => report.retried += 1,
            InitiationStatus::Failed => report.resolved += 1,
            InitiationStatus::InProgress if abandon => {
                let payment = self.require_payment(id).await?;
                self.abandon(&payment, "provider unreachable", report).await?;
            },
            InitiationStatus::InProgress => report.still_open += 1,
        }
        Ok(())
    }

    async fn abandon(
        &self,
        payment: &Payment,
        reason: &str,
        report: &mut ReconciliationReport,
    ) -> Result<(), SettlementError> {
        if self.db.mark_failed(payment.id, reason).await?.is_some() {
            warn!("🔄️🧮️ Gave up on payment {}: {reason}", payment.id);
            report.abandoned += 1;
        }
        Ok(())
    }

    async fn require_payment(&self, id: i64) -> Result<Payment, SettlementError> {
        self.db.fetch_payment(id).await?.ok_or_else(|| SettlementError::NotFound(format!("Payment {id} does not exist")))
    }
}
