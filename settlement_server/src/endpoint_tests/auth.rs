use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Duration;
use settlement_engine::{db_types::Role, events::EventProducers, MerchantApi, PayoutApi};

use super::{
    helpers::{issue_token, owner_token, send_request},
    mocks::{MockMerchantStore, MockPayoutStore},
};
use crate::routes::{MyPendingRoute, StartPayoutRoute};

#[actix_web::test]
async fn no_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::patch().uri("/api/payouts/1/start"), "", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No bearer token was provided."), "{body}");
}

#[actix_web::test]
async fn garbage_token() {
    let _ = env_logger::try_init().ok();
    let (status, _) = send_request(TestRequest::patch().uri("/api/payouts/1/start"), "not.a.token", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn expired_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("admin-1", vec![Role::Admin], None, Some(Duration::hours(-3)));
    let (status, body) = send_request(TestRequest::patch().uri("/api/payouts/1/start"), &token, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Access token is invalid."), "{body}");
}

#[actix_web::test]
async fn owners_cannot_use_admin_routes() {
    let _ = env_logger::try_init().ok();
    let token = owner_token("salon-7");
    let (status, body) = send_request(TestRequest::patch().uri("/api/payouts/1/start"), &token, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("Insufficient Permissions."), "{body}");
}

#[actix_web::test]
async fn admins_cannot_use_owner_routes() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("admin-1", vec![Role::Admin], None, None);
    let (status, _) = send_request(TestRequest::get().uri("/api/my/pending"), &token, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn owner_without_merchant_account() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("owner-1", vec![Role::Owner], None, None);
    let (status, body) = send_request(TestRequest::get().uri("/api/my/pending"), &token, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("not linked to a merchant account"), "{body}");
}

fn configure(cfg: &mut ServiceConfig) {
    // None of these requests get past authentication, so the mocks carry no expectations.
    let payouts = PayoutApi::new(MockPayoutStore::new(), EventProducers::default());
    let merchants = MerchantApi::new(MockMerchantStore::new());
    cfg.service(StartPayoutRoute::<MockPayoutStore>::new())
        .service(MyPendingRoute::<MockMerchantStore>::new())
        .app_data(web::Data::new(payouts))
        .app_data(web::Data::new(merchants));
}
