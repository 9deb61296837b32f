use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::FutureExt;
use gateway_tools::{PaypalApi, StripeApi};
use log::*;
use settlement_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    InvoiceApi,
    MerchantApi,
    PaymentFlowApi,
    PayoutApi,
    SqliteDatabase,
};

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    integrations::{email::SmtpMailer, gateways::ProviderGateways},
    middleware::{JwtMiddlewareFactory, StripeSignatureMiddlewareFactory},
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        CancelPayoutRoute,
        CompletePayoutRoute,
        CreatePaymentRoute,
        CreatePayoutRoute,
        DeleteInvoiceRoute,
        FailPayoutRoute,
        FeeQuoteRoute,
        FetchInvoiceRoute,
        FetchPaymentRoute,
        FetchPayoutRoute,
        InvoiceDocumentRoute,
        InvoiceForPayoutRoute,
        MerchantSummaryRoute,
        MyInvoiceDocumentRoute,
        MyInvoicesRoute,
        MyPayoutsRoute,
        MyPendingRoute,
        MySummaryRoute,
        ReconcileRoute,
        RefundPaymentRoute,
        RegenerateInvoiceDocumentRoute,
        ResendInvoiceEmailRoute,
        StartPayoutRoute,
        UpdateInvoiceStatusRoute,
        UpdateMerchantProfileRoute,
    },
    webhook_routes::{PaypalWebhookRoute, StripeWebhookRoute},
};

const EVENT_BUFFER_SIZE: usize = 64;

type Gateways = ProviderGateways;
type Database = SqliteDatabase;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateways = build_gateways(&config)?;
    let mailer = SmtpMailer::new(&config.smtp)?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let flow = PaymentFlowApi::new(db.clone(), gateways.clone(), config.ledger.clone(), producers.clone());
    let _worker = start_reconciliation_worker(flow, MerchantApi::new(db.clone()), config.reconciliation.clone());
    let srv = create_server_instance(config, db, gateways, mailer, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn build_gateways(config: &ServerConfig) -> Result<ProviderGateways, ServerError> {
    let stripe = config
        .stripe
        .clone()
        .map(StripeApi::new)
        .transpose()
        .map_err(|e| ServerError::InitializeError(format!("Could not create the Stripe client. {e}")))?;
    let paypal = config
        .paypal
        .clone()
        .map(PaypalApi::new)
        .transpose()
        .map_err(|e| ServerError::InitializeError(format!("Could not create the PayPal client. {e}")))?;
    Ok(ProviderGateways::new(stripe, paypal))
}

/// The server's own subscribers: an audit trail in the log. Applications embedding the engine add their own hooks to
/// notify the booking system.
fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_payment_succeeded(|ev| {
            async move {
                let p = ev.payment;
                info!(
                    "📬️ Payment {} for booking {} succeeded. {} credited to {}",
                    p.id, p.booking_id, p.business_fee, p.merchant_id
                );
            }
            .boxed()
        })
        .on_payment_refunded(|ev| {
            async move {
                let p = ev.payment;
                info!(
                    "📬️ Payment {} for booking {} was refunded. {} reversed for {}",
                    p.id, p.booking_id, p.business_fee, p.merchant_id
                );
            }
            .boxed()
        })
        .on_payout_completed(|ev| {
            async move {
                let p = ev.payout;
                info!("📬️ Payout {} of {} to {} completed", p.id, p.amount, p.merchant_id);
            }
            .boxed()
        })
        .on_invoice_issued(|ev| {
            async move {
                let i = ev.invoice;
                info!("📬️ Invoice {} issued to {} (email: {})", i.invoice_number, i.merchant_id, i.email_status);
            }
            .boxed()
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateways: ProviderGateways,
    mailer: SmtpMailer,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let flow_api = PaymentFlowApi::new(db.clone(), gateways.clone(), config.ledger.clone(), producers.clone());
        let payout_api = PayoutApi::new(db.clone(), producers.clone());
        let invoice_api = InvoiceApi::new(db.clone(), mailer.clone(), config.invoices.clone(), producers.clone());
        let merchant_api = MerchantApi::new(db.clone());
        let validator = TokenValidator::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("stl::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(payout_api))
            .app_data(web::Data::new(invoice_api))
            .app_data(web::Data::new(merchant_api))
            .app_data(web::Data::new(gateways.clone()))
            .app_data(web::Data::new(config.reconciliation.clone()));
        // Routes that require authentication
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(validator))
            .service(FeeQuoteRoute::<Database, Gateways>::new())
            .service(CreatePaymentRoute::<Database, Gateways>::new())
            .service(FetchPaymentRoute::<Database, Gateways>::new())
            .service(RefundPaymentRoute::<Database, Gateways>::new())
            .service(CreatePayoutRoute::<Database>::new())
            .service(FetchPayoutRoute::<Database>::new())
            .service(StartPayoutRoute::<Database>::new())
            .service(CompletePayoutRoute::<Database>::new())
            .service(CancelPayoutRoute::<Database>::new())
            .service(FailPayoutRoute::<Database>::new())
            .service(UpdateMerchantProfileRoute::<Database>::new())
            .service(MerchantSummaryRoute::<Database>::new())
            .service(InvoiceForPayoutRoute::<Database, SmtpMailer>::new())
            .service(FetchInvoiceRoute::<Database, SmtpMailer>::new())
            .service(UpdateInvoiceStatusRoute::<Database, SmtpMailer>::new())
            .service(ResendInvoiceEmailRoute::<Database, SmtpMailer>::new())
            .service(RegenerateInvoiceDocumentRoute::<Database, SmtpMailer>::new())
            .service(DeleteInvoiceRoute::<Database, SmtpMailer>::new())
            .service(InvoiceDocumentRoute::<Database, SmtpMailer>::new())
            .service(ReconcileRoute::<Database, Gateways>::new())
            .service(MyPendingRoute::<Database>::new())
            .service(MySummaryRoute::<Database>::new())
            .service(MyPayoutsRoute::<Database>::new())
            .service(MyInvoicesRoute::<Database>::new())
            .service(MyInvoiceDocumentRoute::<Database, SmtpMailer>::new());
        let stripe_scope = match &config.stripe {
            Some(stripe) => web::scope("/stripe").wrap(StripeSignatureMiddlewareFactory::new(
                stripe.webhook_secret.clone(),
                stripe.signature_tolerance,
                stripe.signature_checks,
            )),
            None => web::scope("/stripe").wrap(StripeSignatureMiddlewareFactory::rejecting()),
        };
        let webhook_scope = web::scope("/webhooks")
            .service(stripe_scope.service(StripeWebhookRoute::<Database, Gateways>::new()))
            .service(PaypalWebhookRoute::<Database, Gateways>::new());
        app.service(health).service(webhook_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
