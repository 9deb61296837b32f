use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::NaiveDate;
use serde_json::{json, Value};
use settlement_common::Cents;
use settlement_engine::{
    db_types::PayoutStatus,
    traits::{MonthlyBreakdown, PendingSummary},
    MerchantApi,
};

use super::{
    helpers::{admin_token, owner_token, payout, send_request},
    mocks::MockMerchantStore,
};
use crate::routes::{MyPayoutsRoute, MyPendingRoute, MySummaryRoute, UpdateMerchantProfileRoute};

#[actix_web::test]
async fn my_pending_is_scoped_to_the_token() {
    let _ = env_logger::try_init().ok();
    let mut store = MockMerchantStore::new();
    store.expect_pending_summary().withf(|merchant_id: &str| merchant_id == "salon-7").times(1).returning(|_| {
        Ok(PendingSummary {
            pending_amount: Cents::from(4_200),
            payment_count: 3,
            oldest_payment: NaiveDate::from_ymd_opt(2026, 3, 1),
            newest_payment: NaiveDate::from_ymd_opt(2026, 3, 9),
        })
    });
    let (status, body) =
        send_request(TestRequest::get().uri("/api/my/pending"), &owner_token("salon-7"), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["pending_amount"], json!(4200));
    assert_eq!(summary["payment_count"], json!(3));
    assert_eq!(summary["oldest_payment"], json!("2026-03-01"));
}

#[actix_web::test]
async fn my_summary_adds_up_the_months() {
    let _ = env_logger::try_init().ok();
    let mut store = MockMerchantStore::new();
    store.expect_fetch_merchant().returning(|_| Ok(None));
    store
        .expect_monthly_breakdown()
        .withf(|merchant_id: &str, year: &i32| merchant_id == "salon-7" && *year == 2025)
        .returning(|_, _| {
            Ok(vec![
                month("2025-01", 2, 10_000, 1_000, 9_000),
                month("2025-04", 1, 5_050, 505, 4_545),
            ])
        });
    let req = TestRequest::get().uri("/api/my/summary?year=2025");
    let (status, body) = send_request(req, &owner_token("salon-7"), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["year"], json!(2025));
    assert_eq!(summary["year_gross"], json!(15_050));
    assert_eq!(summary["year_platform_fees"], json!(1_505));
    assert_eq!(summary["year_business_fees"], json!(13_545));
    assert_eq!(summary["year_payment_count"], json!(3));
    assert_eq!(summary["months"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn my_summary_rejects_silly_years() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/api/my/summary?year=12");
    let (status, body) = send_request(req, &owner_token("salon-7"), configure_with(MockMerchantStore::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("12 is not a valid year"), "{body}");
}

#[actix_web::test]
async fn my_payouts() {
    let _ = env_logger::try_init().ok();
    let mut store = MockMerchantStore::new();
    store
        .expect_payout_history()
        .withf(|merchant_id: &str| merchant_id == "salon-7")
        .returning(|_| Ok(vec![payout(2, "salon-7", PayoutStatus::Completed), payout(5, "salon-7", PayoutStatus::Pending)]));
    let (status, body) =
        send_request(TestRequest::get().uri("/api/my/payouts"), &owner_token("salon-7"), configure_with(store)).await;
    assert_eq!(status, StatusCode::OK);
    let payouts: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(payouts[0]["id"], json!(2));
    assert_eq!(payouts[0]["status"], json!("completed"));
    assert_eq!(payouts[1]["status"], json!("pending"));
}

#[actix_web::test]
async fn profile_needs_a_valid_email() {
    let _ = env_logger::try_init().ok();
    let profile = json!({
        "legal_name": "Salon Sieben GmbH",
        "street": "Hauptstr. 7",
        "postal_code": "10115",
        "city": "Berlin",
        "country": "DE",
        "tax_id": null,
        "vat_id": null,
        "email": "billing.salon7.example"
    });
    let req = TestRequest::put().uri("/api/merchants/salon-7/profile").set_json(profile);
    let (status, body) = send_request(req, &admin_token(), configure_with(MockMerchantStore::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("is not a valid email address"), "{body}");
}

fn month(month: &str, count: i64, gross: i64, platform: i64, business: i64) -> MonthlyBreakdown {
    MonthlyBreakdown {
        month: month.to_string(),
        payment_count: count,
        gross_amount: Cents::from(gross),
        platform_fees: Cents::from(platform),
        business_fees: Cents::from(business),
    }
}

fn configure_with(store: MockMerchantStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(MyPendingRoute::<MockMerchantStore>::new())
            .service(MySummaryRoute::<MockMerchantStore>::new())
            .service(MyPayoutsRoute::<MockMerchantStore>::new())
            .service(UpdateMerchantProfileRoute::<MockMerchantStore>::new())
            .app_data(web::Data::new(MerchantApi::new(store)));
    }
}
