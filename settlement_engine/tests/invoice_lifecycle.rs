use std::path::Path;

use chrono::NaiveDate;
use settlement_common::Cents;
use settlement_engine::{
    db_types::{EmailDeliveryStatus, InvoiceStatus, NewPayout, PayoutMethod, SettlementPeriod},
    traits::SettlementError,
};

mod support;
use support::prepare_env::{paid_booking, prepare_test_env, profile, TestEnv};

fn issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 2).unwrap()
}

async fn settled_payout(env: &TestEnv, merchant_id: &str, amounts: &[i64]) -> i64 {
    for (i, amount) in amounts.iter().enumerate() {
        paid_booking(env, &format!("{merchant_id}-{i}"), merchant_id, *amount).await;
    }
    let payout = env
        .payouts
        .create_payout(NewPayout {
            merchant_id: merchant_id.into(),
            amount: None,
            method: PayoutMethod::BankTransfer,
            period: SettlementPeriod::new(
                NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
            ),
            notes: None,
            approved_by: "admin-1".into(),
        })
        .await
        .unwrap();
    env.payouts.complete_payout(payout.id, "SEPA-2026-0100", None).await.unwrap();
    payout.id
}

#[tokio::test]
async fn only_completed_payouts_with_a_billing_profile_are_invoiced() {
    let env = prepare_test_env().await;
    paid_booking(&env, "bk-1", "salon-1", 1_000).await;
    let payout = env
        .payouts
        .create_payout(NewPayout {
            merchant_id: "salon-1".into(),
            amount: None,
            method: PayoutMethod::Manual,
            period: SettlementPeriod::new(issue_date(), issue_date()),
            notes: None,
            approved_by: "admin-1".into(),
        })
        .await
        .unwrap();
    let err = env.invoices.create_for_payout_on(payout.id, issue_date()).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)), "{err}");

    env.payouts.complete_payout(payout.id, "CASH-1", None).await.unwrap();
    let err = env.invoices.create_for_payout_on(payout.id, issue_date()).await.unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)), "{err}");

    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
    let issued = env.invoices.create_for_payout_on(payout.id, issue_date()).await.unwrap();
    assert_eq!(issued.invoice.recipient.legal_name, "Salon Schönschnitt UG");
    assert_eq!(issued.lines.len(), 1);
}

#[tokio::test]
async fn a_payout_is_invoiced_once() {
    let env = prepare_test_env().await;
    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
    let payout = settled_payout(&env, "salon-1", &[1_000, 2_000]).await;
    let issued = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap();
    assert_eq!(issued.invoice.net_amount, Cents::from(2_850));
    assert_eq!(issued.invoice.vat_rate, 19);
    assert_eq!(issued.invoice.vat_amount, Cents::from(542));
    assert_eq!(issued.invoice.gross_amount, Cents::from(3_392));
    assert_eq!(issued.invoice.due_date, NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());

    let err = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)), "{err}");
    let found = env.invoices.fetch_invoice_for_payout(payout).await.unwrap().unwrap();
    assert_eq!(found.id, issued.invoice.id);
}

#[tokio::test]
async fn delivered_invoices_are_sent_and_follow_the_status_machine() {
    let env = prepare_test_env().await;
    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
    let payout = settled_payout(&env, "salon-1", &[1_000]).await;
    let invoice = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap().invoice;
    assert_eq!(invoice.status, InvoiceStatus::Sent);
    assert_eq!(invoice.email_status, EmailDeliveryStatus::Sent);
    assert!(invoice.sent_at.is_some());
    let sent = env.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@salon-1.example");
    assert!(sent[0].subject.contains(&invoice.invoice_number));

    let err = env.invoices.delete_invoice(invoice.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)), "{err}");
    let err = env.invoices.update_status(invoice.id, InvoiceStatus::Draft).await.unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)));
    let err = env.invoices.update_status(invoice.id, InvoiceStatus::Overdue).await.unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)));

    let dunning = env.invoices.update_status(invoice.id, InvoiceStatus::Dunning).await.unwrap();
    assert_eq!(dunning.status, InvoiceStatus::Dunning);
    assert!(dunning.dunning_at.is_some());
    assert_eq!(dunning.effective_status(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()), InvoiceStatus::Overdue);

    let paid = env.invoices.update_status(invoice.id, InvoiceStatus::Paid).await.unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert!(paid.paid_at.is_some());
    let err = env.invoices.update_status(invoice.id, InvoiceStatus::Cancelled).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)), "{err}");
    let err = env.invoices.update_status(7_777, InvoiceStatus::Paid).await.unwrap_err();
    assert!(matches!(err, SettlementError::NotFound(_)));
}

#[tokio::test]
async fn failed_emails_keep_the_invoice_and_can_be_retried() {
    let env = prepare_test_env().await;
    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
    let payout = settled_payout(&env, "salon-1", &[1_000]).await;
    env.mailer.set_failing(true);
    let invoice = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap().invoice;
    assert_eq!(invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.email_status, EmailDeliveryStatus::Failed);
    assert_eq!(invoice.email_attempts, 1);
    assert!(invoice.email_error.as_deref().unwrap_or_default().contains("connection refused"));
    assert!(invoice.document_path.is_some());

    env.mailer.set_failing(false);
    let resent = env.invoices.resend_email(invoice.id).await.unwrap();
    assert_eq!(resent.email_status, EmailDeliveryStatus::Sent);
    assert_eq!(resent.email_attempts, 2);
    assert_eq!(resent.email_error, None);
    assert_eq!(resent.status, InvoiceStatus::Sent);
    assert_eq!(env.mailer.sent().len(), 1);
}

#[tokio::test]
async fn drafts_can_be_deleted_with_their_document() {
    let env = prepare_test_env().await;
    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
    let payout = settled_payout(&env, "salon-1", &[1_000, 1_500]).await;
    env.mailer.set_failing(true);
    let invoice = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap().invoice;
    let path = invoice.document_path.clone().unwrap();
    assert!(Path::new(&path).exists());

    let deleted = env.invoices.delete_invoice(invoice.id).await.unwrap();
    assert_eq!(deleted.id, invoice.id);
    assert!(!Path::new(&path).exists());
    assert!(env.invoices.fetch_invoice(invoice.id).await.unwrap().is_none());
    let err = env.invoices.delete_invoice(invoice.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::NotFound(_)));

    // The payout can be invoiced again, under a new number.
    let again = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap().invoice;
    assert_eq!(again.invoice_number, "INV-2026-10-00002");
}

#[tokio::test]
async fn documents_can_be_regenerated_and_downloaded() {
    let env = prepare_test_env().await;
    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
    let payout = settled_payout(&env, "salon-1", &[1_000]).await;
    let invoice = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap().invoice;
    let path = invoice.document_path.clone().unwrap();
    std::fs::remove_file(&path).unwrap();
    let err = env.invoices.document(invoice.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::NotFound(_)), "{err}");

    let regenerated = env.invoices.regenerate_document(invoice.id).await.unwrap();
    assert_eq!(regenerated.document_path.as_deref(), Some(path.as_str()));
    let document = env.invoices.document(invoice.id).await.unwrap();
    assert_eq!(document.filename, format!("{}.html", invoice.invoice_number));
    let html = String::from_utf8(document.bytes).unwrap();
    assert!(html.contains(&invoice.invoice_number));
    assert!(html.contains("Salon Schönschnitt UG"));
}

#[tokio::test]
async fn cancelled_invoices_are_not_resent() {
    let env = prepare_test_env().await;
    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
    let payout = settled_payout(&env, "salon-1", &[1_000]).await;
    let invoice = env.invoices.create_for_payout_on(payout, issue_date()).await.unwrap().invoice;
    env.invoices.update_status(invoice.id, InvoiceStatus::Cancelled).await.unwrap();
    let err = env.invoices.resend_email(invoice.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::Conflict(_)));
    assert_eq!(env.mailer.sent().len(), 1);
}
