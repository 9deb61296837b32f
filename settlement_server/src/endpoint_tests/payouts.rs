use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use settlement_engine::{
    db_types::{NewPayout, PayoutStatus},
    events::EventProducers,
    traits::SettlementError,
    PayoutApi,
};

use super::{
    helpers::{admin_token, payout, send_request},
    mocks::MockPayoutStore,
};
use crate::routes::{CancelPayoutRoute, CompletePayoutRoute, CreatePayoutRoute, StartPayoutRoute};

#[actix_web::test]
async fn create_payout_records_the_approver() {
    let _ = env_logger::try_init().ok();
    let mut store = MockPayoutStore::new();
    store
        .expect_create_payout()
        .withf(|p: &NewPayout| p.merchant_id == "salon-7" && p.approved_by == "admin-1" && p.amount.is_none())
        .times(1)
        .returning(|_| Ok((payout(11, "salon-7", PayoutStatus::Pending), vec![])));
    let body = json!({
        "merchant_id": "salon-7",
        "method": "bank_transfer",
        "period_start": "2026-02-01",
        "period_end": "2026-02-28"
    });
    let req = TestRequest::post().uri("/api/payouts").set_json(body);
    let (status, body) = send_request(req, &admin_token(), configure_with(store)).await;
    assert_eq!(status, StatusCode::CREATED);
    let payout: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(payout["id"], json!(11));
    assert_eq!(payout["status"], json!("pending"));
}

#[actix_web::test]
async fn complete_unknown_payout() {
    let _ = env_logger::try_init().ok();
    let mut store = MockPayoutStore::new();
    store.expect_complete_payout().returning(|id, _, _| Err(SettlementError::NotFound(format!("Payout {id}"))));
    let req = TestRequest::patch().uri("/api/payouts/99/complete").set_json(json!({"transaction_reference": "TRX-1"}));
    let (status, body) = send_request(req, &admin_token(), configure_with(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Payout 99"), "{body}");
}

#[actix_web::test]
async fn complete_payout_twice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockPayoutStore::new();
    store
        .expect_complete_payout()
        .returning(|id, _, _| Err(SettlementError::Conflict(format!("Payout {id} is already completed"))));
    let req = TestRequest::patch().uri("/api/payouts/4/complete").set_json(json!({"transaction_reference": "TRX-1"}));
    let (status, body) = send_request(req, &admin_token(), configure_with(store)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"Payout 4 is already completed"}"#);
}

#[actix_web::test]
async fn complete_payout_needs_a_reference() {
    let _ = env_logger::try_init().ok();
    // The backend is never consulted
    let store = MockPayoutStore::new();
    let req = TestRequest::patch().uri("/api/payouts/4/complete").set_json(json!({"transaction_reference": "  "}));
    let (status, body) = send_request(req, &admin_token(), configure_with(store)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("transaction reference"), "{body}");
}

#[actix_web::test]
async fn complete_payout() {
    let _ = env_logger::try_init().ok();
    let mut store = MockPayoutStore::new();
    store.expect_complete_payout().times(1).returning(|id, reference, notes| {
        assert_eq!(reference, "TRX-2026-0042");
        assert_eq!(notes, Some("March batch"));
        let mut p = payout(id, "salon-7", PayoutStatus::Completed);
        p.transaction_reference = Some(reference.to_string());
        Ok(p)
    });
    let params = json!({"transaction_reference": " TRX-2026-0042 ", "notes": "March batch"});
    let req = TestRequest::patch().uri("/api/payouts/4/complete").set_json(params);
    let (status, body) = send_request(req, &admin_token(), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let payout: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(payout["status"], json!("completed"));
    assert_eq!(payout["transaction_reference"], json!("TRX-2026-0042"));
}

#[actix_web::test]
async fn cancel_payout_without_a_body() {
    let _ = env_logger::try_init().ok();
    let mut store = MockPayoutStore::new();
    store
        .expect_release_payout()
        .times(1)
        .returning(|id, status, reason| {
            assert_eq!(id, 4);
            assert_eq!(status, PayoutStatus::Cancelled);
            assert_eq!(reason, None);
            Ok(payout(id, "salon-7", status))
        });
    let req = TestRequest::patch().uri("/api/payouts/4/cancel");
    let (status, body) = send_request(req, &admin_token(), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let payout: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(payout["status"], json!("cancelled"));
}

fn configure_with(store: MockPayoutStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(CreatePayoutRoute::<MockPayoutStore>::new())
            .service(StartPayoutRoute::<MockPayoutStore>::new())
            .service(CompletePayoutRoute::<MockPayoutStore>::new())
            .service(CancelPayoutRoute::<MockPayoutStore>::new())
            .app_data(web::Data::new(PayoutApi::new(store, EventProducers::default())));
    }
}
