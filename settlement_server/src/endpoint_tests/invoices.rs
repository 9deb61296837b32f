use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use settlement_engine::{events::EventProducers, invoice_objects::InvoiceSettings, traits::SettlementError, InvoiceApi};
use tempfile::TempDir;

use super::{
    helpers::{admin_token, invoice, owner_token, send_request},
    mocks::MockInvoiceStore,
};
use crate::{
    integrations::email::SmtpMailer,
    routes::{DeleteInvoiceRoute, FetchInvoiceRoute, MyInvoiceDocumentRoute},
};

#[actix_web::test]
async fn fetch_missing_invoice() {
    let _ = env_logger::try_init().ok();
    let mut store = MockInvoiceStore::new();
    store.expect_fetch_invoice().returning(|_| Ok(None));
    let dir = TempDir::new().unwrap();
    let (status, body) =
        send_request(TestRequest::get().uri("/api/invoices/8"), &admin_token(), configure_with(store, &dir)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Invoice 8"), "{body}");
}

#[actix_web::test]
async fn issued_invoices_cannot_be_deleted() {
    let _ = env_logger::try_init().ok();
    let mut store = MockInvoiceStore::new();
    store.expect_delete_draft_invoice().times(1).returning(|_| {
        Err(SettlementError::Conflict("Invoice INV-2026-03-0001 is sent. Only drafts can be deleted".into()))
    });
    let dir = TempDir::new().unwrap();
    let (status, body) =
        send_request(TestRequest::delete().uri("/api/invoices/1"), &admin_token(), configure_with(store, &dir)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Only drafts can be deleted"), "{body}");
}

#[actix_web::test]
async fn owners_cannot_download_other_merchants_invoices() {
    let _ = env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir);
    let mut store = MockInvoiceStore::new();
    store.expect_fetch_invoice().returning(move |id| Ok(Some(invoice(id, "salon-7", Some(&path)))));
    store.expect_fetch_line_items().returning(|_| Ok(vec![]));
    let req = TestRequest::get().uri("/api/my/invoices/1/document");
    let (status, body) = send_request(req, &owner_token("barber-3"), configure_with(store, &dir)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body.contains("Rechnung"), "{body}");
}

#[actix_web::test]
async fn owners_download_their_invoices() {
    let _ = env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    let path = write_document(&dir);
    let mut store = MockInvoiceStore::new();
    store.expect_fetch_invoice().returning(move |id| Ok(Some(invoice(id, "salon-7", Some(&path)))));
    store.expect_fetch_line_items().returning(|_| Ok(vec![]));
    let req = TestRequest::get().uri("/api/my/invoices/1/document");
    let (status, body) = send_request(req, &owner_token("salon-7"), configure_with(store, &dir)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<html><body>Rechnung INV-2026-03-0001</body></html>");
}

#[actix_web::test]
async fn missing_documents_are_not_found() {
    let _ = env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    let mut store = MockInvoiceStore::new();
    store.expect_fetch_invoice().returning(|id| Ok(Some(invoice(id, "salon-7", None))));
    store.expect_fetch_line_items().returning(|_| Ok(vec![]));
    let req = TestRequest::get().uri("/api/my/invoices/1/document");
    let (status, body) = send_request(req, &owner_token("salon-7"), configure_with(store, &dir)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("has no rendered document"), "{body}");
}

fn write_document(dir: &TempDir) -> String {
    let path = dir.path().join("INV-2026-03-0001.html");
    std::fs::write(&path, "<html><body>Rechnung INV-2026-03-0001</body></html>").unwrap();
    path.to_string_lossy().into_owned()
}

fn configure_with(store: MockInvoiceStore, dir: &TempDir) -> impl FnOnce(&mut ServiceConfig) {
    let settings = InvoiceSettings { document_dir: dir.path().to_path_buf(), ..InvoiceSettings::default() };
    let api = InvoiceApi::new(store, SmtpMailer::disabled(), settings, EventProducers::default());
    move |cfg| {
        cfg.service(FetchInvoiceRoute::<MockInvoiceStore, SmtpMailer>::new())
            .service(DeleteInvoiceRoute::<MockInvoiceStore, SmtpMailer>::new())
            .service(MyInvoiceDocumentRoute::<MockInvoiceStore, SmtpMailer>::new())
            .app_data(web::Data::new(api));
    }
}
