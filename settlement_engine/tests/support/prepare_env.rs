use log::*;
use settlement_common::Cents;
use settlement_engine::{
    db_types::{MerchantProfile, Payment, Provider},
    events::EventProducers,
    invoice_objects::InvoiceSettings,
    payment_objects::{LedgerSettings, PaymentRequest},
    traits::{EventApplication, NormalizedEvent, PaymentOutcome},
    InvoiceApi,
    MerchantApi,
    PaymentFlowApi,
    PayoutApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tempfile::TempDir;

use super::fakes::{FakeGateway, RecordingMailer};

/// A migrated database in a temporary directory, with every API wired up against it. The directory (and the
/// database) are removed when the environment is dropped.
pub struct TestEnv {
    pub dir: TempDir,
    pub db: SqliteDatabase,
    pub gateway: FakeGateway,
    pub mailer: RecordingMailer,
    pub payments: PaymentFlowApi<SqliteDatabase, FakeGateway>,
    pub payouts: PayoutApi<SqliteDatabase>,
    pub invoices: InvoiceApi<SqliteDatabase, RecordingMailer>,
    pub merchants: MerchantApi<SqliteDatabase>,
}

pub async fn prepare_test_env() -> TestEnv {
    prepare_test_env_with_producers(EventProducers::default()).await
}

pub async fn prepare_test_env_with_producers(producers: EventProducers) -> TestEnv {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().expect("Error creating temporary directory");
    let url = format!("sqlite://{}", dir.path().join("settlement.db").display());
    Sqlite::create_database(&url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(&url, 25).await.expect("Error connecting to database");
    db.run_migrations().await.expect("Error running DB migrations");
    info!("🚀️ Test database ready at {url}");
    let gateway = FakeGateway::default();
    let mailer = RecordingMailer::default();
    let invoice_settings = InvoiceSettings {
        document_dir: dir.path().join("invoices"),
        issuer: settlement_engine::db_types::Party {
            legal_name: "Marketplace Platform GmbH".into(),
            street: "Torstr. 5".into(),
            postal_code: "10119".into(),
            city: "Berlin".into(),
            country: "DE".into(),
            tax_id: Some("30/123/45678".into()),
            vat_id: Some("DE999999999".into()),
            email: Some("billing@platform.example".into()),
        },
        ..Default::default()
    };
    TestEnv {
        payments: PaymentFlowApi::new(db.clone(), gateway.clone(), LedgerSettings::default(), producers.clone()),
        payouts: PayoutApi::new(db.clone(), producers.clone()),
        invoices: InvoiceApi::new(db.clone(), mailer.clone(), invoice_settings, producers),
        merchants: MerchantApi::new(db.clone()),
        dir,
        db,
        gateway,
        mailer,
    }
}

pub fn payment_request(booking_id: &str, merchant_id: &str, amount: i64) -> PaymentRequest {
    PaymentRequest {
        booking_id: booking_id.to_string(),
        payer_id: format!("payer-{booking_id}"),
        merchant_id: merchant_id.to_string(),
        amount: Cents::from(amount),
        currency: None,
        provider: Provider::Stripe,
    }
}

pub fn succeeded_event(payment: &Payment) -> NormalizedEvent {
    let provider_ref = payment.provider_ref.clone().expect("payment has no provider reference");
    NormalizedEvent::new(payment.provider, format!("evt_ok_{provider_ref}"), provider_ref, PaymentOutcome::Succeeded)
}

/// Opens a payment and delivers the provider's success event for it.
pub async fn paid_booking(env: &TestEnv, booking_id: &str, merchant_id: &str, amount: i64) -> Payment {
    let initiation =
        env.payments.create_payment(payment_request(booking_id, merchant_id, amount)).await.expect("create payment");
    match env.payments.handle_provider_event(succeeded_event(&initiation.payment)).await.expect("apply event") {
        EventApplication::Applied { payment, .. } => payment,
        other => panic!("Expected the success event to apply, got {other:?}"),
    }
}

pub fn profile(email: &str) -> MerchantProfile {
    MerchantProfile {
        legal_name: "Salon Schönschnitt UG".into(),
        street: "Kastanienallee 12".into(),
        postal_code: "10435".into(),
        city: "Berlin".into(),
        country: "DE".into(),
        tax_id: Some("27/456/78901".into()),
        vat_id: None,
        email: email.into(),
    }
}
