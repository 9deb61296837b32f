use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    InvoiceIssuedEvent,
    PaymentRefundedEvent,
    PaymentSucceededEvent,
    PayoutCompletedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_succeeded_producer: Vec<EventProducer<PaymentSucceededEvent>>,
    pub payment_refunded_producer: Vec<EventProducer<PaymentRefundedEvent>>,
    pub payout_completed_producer: Vec<EventProducer<PayoutCompletedEvent>>,
    pub invoice_issued_producer: Vec<EventProducer<InvoiceIssuedEvent>>,
}

impl EventProducers {
    pub async fn publish_payment_succeeded(&self, event: PaymentSucceededEvent) {
        for producer in &self.payment_succeeded_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payment_refunded(&self, event: PaymentRefundedEvent) {
        for producer in &self.payment_refunded_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payout_completed(&self, event: PayoutCompletedEvent) {
        for producer in &self.payout_completed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_invoice_issued(&self, event: InvoiceIssuedEvent) {
        for producer in &self.invoice_issued_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_payment_succeeded: Option<EventHandler<PaymentSucceededEvent>>,
    pub on_payment_refunded: Option<EventHandler<PaymentRefundedEvent>>,
    pub on_payout_completed: Option<EventHandler<PayoutCompletedEvent>>,
    pub on_invoice_issued: Option<EventHandler<InvoiceIssuedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_payment_succeeded: hooks
                .on_payment_succeeded
                .map(|f| EventHandler::new("payment_succeeded", buffer_size, f)),
            on_payment_refunded: hooks
                .on_payment_refunded
                .map(|f| EventHandler::new("payment_refunded", buffer_size, f)),
            on_payout_completed: hooks
                .on_payout_completed
                .map(|f| EventHandler::new("payout_completed", buffer_size, f)),
            on_invoice_issued: hooks.on_invoice_issued.map(|f| EventHandler::new("invoice_issued", buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_succeeded {
            result.payment_succeeded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_refunded {
            result.payment_refunded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_completed {
            result.payout_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_invoice_issued {
            result.invoice_issued_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_succeeded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_refunded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_completed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_invoice_issued {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_succeeded: Option<Handler<PaymentSucceededEvent>>,
    pub on_payment_refunded: Option<Handler<PaymentRefundedEvent>>,
    pub on_payout_completed: Option<Handler<PayoutCompletedEvent>>,
    pub on_invoice_issued: Option<Handler<InvoiceIssuedEvent>>,
}

impl EventHooks {
    pub fn on_payment_succeeded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentSucceededEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_succeeded = Some(Arc::new(f));
        self
    }

    pub fn on_payment_refunded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentRefundedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_refunded = Some(Arc::new(f));
        self
    }

    pub fn on_payout_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutCompletedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payout_completed = Some(Arc::new(f));
        self
    }

    pub fn on_invoice_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoiceIssuedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_invoice_issued = Some(Arc::new(f));
        self
    }
}
