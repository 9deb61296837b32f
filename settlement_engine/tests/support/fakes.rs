use std::sync::{Arc, Mutex};

use settlement_engine::{
    db_types::Provider,
    traits::{
        CaptureResult,
        CreatePaymentRequest,
        CreatedPayment,
        EmailMessage,
        MailError,
        Mailer,
        PaymentGateway,
        ProviderError,
        ProviderPaymentState,
        RefundRequest,
        RefundResult,
    },
};
use settlement_common::Cents;

/// How the fake provider answers the next calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeBehaviour {
    Accept,
    Unavailable,
    Reject(String),
}

#[derive(Debug)]
struct GatewayState {
    create: FakeBehaviour,
    refund: FakeBehaviour,
    capture_completes: bool,
    status: Result<ProviderPaymentState, ProviderError>,
    cancel: Result<ProviderPaymentState, ProviderError>,
    created: Vec<CreatePaymentRequest>,
    refunds: Vec<RefundRequest>,
    captures: Vec<String>,
    cancellations: Vec<String>,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            create: FakeBehaviour::Accept,
            refund: FakeBehaviour::Accept,
            capture_completes: true,
            status: Ok(ProviderPaymentState::Open),
            cancel: Ok(ProviderPaymentState::Cancelled),
            created: Vec::new(),
            refunds: Vec::new(),
            captures: Vec::new(),
            cancellations: Vec::new(),
        }
    }
}

/// An in-memory payment provider. Provider references are derived from the idempotency key, like a real provider
/// returning the same object for a retried request.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn set_create(&self, behaviour: FakeBehaviour) {
        self.state.lock().unwrap().create = behaviour;
    }

    pub fn set_refund(&self, behaviour: FakeBehaviour) {
        self.state.lock().unwrap().refund = behaviour;
    }

    pub fn set_capture_completes(&self, completes: bool) {
        self.state.lock().unwrap().capture_completes = completes;
    }

    pub fn set_status(&self, status: Result<ProviderPaymentState, ProviderError>) {
        self.state.lock().unwrap().status = status;
    }

    /// What the provider answers to a cancellation. A confirmed cancellation also becomes the reported status.
    pub fn set_cancel(&self, result: Result<ProviderPaymentState, ProviderError>) {
        self.state.lock().unwrap().cancel = result;
    }

    pub fn cancellations(&self) -> Vec<String> {
        self.state.lock().unwrap().cancellations.clone()
    }

    pub fn created(&self) -> Vec<CreatePaymentRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn refunds(&self) -> Vec<RefundRequest> {
        self.state.lock().unwrap().refunds.clone()
    }

    pub fn captures(&self) -> Vec<String> {
        self.state.lock().unwrap().captures.clone()
    }
}

fn answer(behaviour: &FakeBehaviour) -> Result<(), ProviderError> {
    match behaviour {
        FakeBehaviour::Accept => Ok(()),
        FakeBehaviour::Unavailable => Err(ProviderError::Unavailable("503 Service Unavailable".into())),
        FakeBehaviour::Reject(reason) => Err(ProviderError::Rejected(reason.clone())),
    }
}

impl PaymentGateway for FakeGateway {
    fn supports(&self, _provider: Provider) -> bool {
        true
    }

    async fn create_payment(&self, request: &CreatePaymentRequest) -> Result<CreatedPayment, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.created.push(request.clone());
        answer(&state.create)?;
        Ok(CreatedPayment {
            provider_ref: format!("pi_{}", request.idempotency_key),
            client_action: Some(format!("secret_{}", request.ledger_ref)),
        })
    }

    async fn capture(&self, _provider: Provider, provider_ref: &str) -> Result<CaptureResult, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.captures.push(provider_ref.to_string());
        Ok(CaptureResult { charge_ref: Some(format!("cap_{provider_ref}")), completed: state.capture_completes })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundResult, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.refunds.push(request.clone());
        answer(&state.refund)?;
        Ok(RefundResult { refund_id: format!("re_{}", request.idempotency_key), amount: request.amount.unwrap_or(Cents::ZERO) })
    }

    async fn fetch_status(&self, _provider: Provider, _provider_ref: &str) -> Result<ProviderPaymentState, ProviderError> {
        self.state.lock().unwrap().status.clone()
    }

    async fn cancel(&self, _provider: Provider, provider_ref: &str) -> Result<ProviderPaymentState, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.cancellations.push(provider_ref.to_string());
        let result = state.cancel.clone();
        if let Ok(after) = &result {
            state.status = Ok(*after);
        }
        result
    }
}

/// Records every email instead of sending it. Can be switched into a failing mode.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if *self.failing.lock().unwrap() {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
