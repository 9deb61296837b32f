use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use log::debug;
use serde_json::json;
use settlement_common::Cents;
use settlement_engine::db_types::{Invoice, Payout, PayoutMethod, PayoutStatus, Role};

use crate::{
    auth::{TokenIssuer, TokenValidator},
    config::AuthConfig,
    middleware::JwtMiddlewareFactory,
};

// Test-only secret. Never use it anywhere else.
pub fn auth_config() -> AuthConfig {
    AuthConfig::new("endpoint-tests-0123456789abcdef-0123")
}

pub fn issue_token(sub: &str, roles: Vec<Role>, merchant_id: Option<&str>, duration: Option<Duration>) -> String {
    TokenIssuer::new(&auth_config())
        .issue_token(sub, roles, merchant_id.map(String::from), duration)
        .expect("Failed to sign token")
}

pub fn admin_token() -> String {
    issue_token("admin-1", vec![Role::Admin], None, None)
}

pub fn owner_token(merchant_id: &str) -> String {
    issue_token("owner-1", vec![Role::Owner], Some(merchant_id), None)
}

/// Sends `req` to an `/api` scope configured by `configure`, behind the JWT middleware. Errors raised by middleware
/// are turned into their HTTP responses, as the server would.
pub async fn send_request(
    req: TestRequest,
    token: &str,
    configure: impl FnOnce(&mut ServiceConfig),
) -> (StatusCode, String) {
    let req = if token.is_empty() { req } else { req.insert_header(("Authorization", format!("Bearer {token}"))) };
    let validator = TokenValidator::new(&auth_config());
    let app = App::new().service(web::scope("/api").wrap(JwtMiddlewareFactory::new(validator)).configure(configure));
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = res.into_body().try_into_bytes().unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn payout(id: i64, merchant_id: &str, status: PayoutStatus) -> Payout {
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    Payout {
        id,
        merchant_id: merchant_id.to_string(),
        amount: Cents::from(12_000),
        currency: "EUR".into(),
        status,
        method: PayoutMethod::BankTransfer,
        period_start: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        period_end: NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
        covered_payment_count: 3,
        transaction_reference: None,
        notes: None,
        failure_reason: None,
        approved_by: "admin-1".into(),
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn invoice(id: i64, merchant_id: &str, document_path: Option<&str>) -> Invoice {
    let party = json!({
        "legal_name": "Salon Sieben GmbH",
        "street": "Hauptstr. 7",
        "postal_code": "10115",
        "city": "Berlin",
        "country": "DE",
        "tax_id": null,
        "vat_id": "DE123456789",
        "email": "billing@salon7.example"
    });
    serde_json::from_value(json!({
        "id": id,
        "invoice_number": "INV-2026-03-0001",
        "payout_id": 4,
        "merchant_id": merchant_id,
        "issue_date": "2026-03-02",
        "period_start": "2026-02-01",
        "period_end": "2026-02-28",
        "recipient": party,
        "issuer": party,
        "currency": "EUR",
        "net_amount": 12000,
        "vat_rate": 19,
        "vat_amount": 2280,
        "gross_amount": 14280,
        "due_date": "2026-03-16",
        "bank_details": { "account_holder": "Platform GmbH", "bank_name": "Bank", "iban": "DE89370400440532013000", "bic": "COBADEFFXXX" },
        "status": "sent",
        "document_path": document_path,
        "email_status": "sent",
        "email_attempts": 1,
        "email_error": null,
        "emailed_at": "2026-03-02T09:00:00Z",
        "sent_at": "2026-03-02T09:00:00Z",
        "paid_at": null,
        "cancelled_at": null,
        "dunning_at": null,
        "created_at": "2026-03-02T09:00:00Z",
        "updated_at": "2026-03-02T09:00:00Z"
    }))
    .expect("Invalid invoice fixture")
}
