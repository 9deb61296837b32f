//! A booking is paid, settled, paid out and invoiced.
use chrono::{Datelike, NaiveDate, Utc};
use settlement_common::Cents;
use settlement_engine::{
    db_types::{InvoiceStatus, NewPayout, PaymentPayoutStatus, PaymentStatus, PayoutMethod, SettlementPeriod},
    payment_objects::InitiationStatus,
    traits::EventApplication,
};

mod support;
use support::prepare_env::{payment_request, prepare_test_env, profile, succeeded_event};

#[tokio::test]
async fn booking_to_invoice() {
    let env = prepare_test_env().await;
    env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();

    let quote = env.payments.quote(Cents::from(1_000)).unwrap();
    assert_eq!(quote.platform_fee, Cents::from(75));
    assert_eq!(quote.business_fee, Cents::from(925));

    let initiation = env.payments.create_payment(payment_request("bk-2026-0001", "salon-1", 1_000)).await.unwrap();
    assert_eq!(initiation.status, InitiationStatus::Started);
    let event = succeeded_event(&initiation.payment);
    let EventApplication::Applied { payment, .. } = env.payments.handle_provider_event(event).await.unwrap() else {
        panic!("Expected the payment to succeed");
    };
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert!(payment.succeeded_at.is_some());

    let summary = env.merchants.pending_summary("salon-1").await.unwrap();
    assert_eq!(summary.pending_amount, Cents::from(925));
    assert_eq!(summary.payment_count, 1);

    let payout = env
        .payouts
        .create_payout(NewPayout {
            merchant_id: "salon-1".into(),
            amount: Some(Cents::from(925)),
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
    env.payouts.start_payout(payout.id).await.unwrap();
    env.payouts.complete_payout(payout.id, "SEPA-2026-0001", None).await.unwrap();
    let (_, covered) = env.payouts.payout_with_payments(payout.id).await.unwrap().unwrap();
    assert_eq!(covered.len(), 1);
    assert_eq!(covered[0].payout_status, PaymentPayoutStatus::Paid);

    let issued = env.invoices.create_for_payout_on(payout.id, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()).await.unwrap();
    let invoice = &issued.invoice;
    assert_eq!(invoice.invoice_number, "INV-2026-10-00001");
    assert_eq!(invoice.net_amount, Cents::from(925));
    assert_eq!(invoice.vat_amount, Cents::from(176));
    assert_eq!(invoice.gross_amount, Cents::from(1_101));
    assert_eq!(invoice.status, InvoiceStatus::Sent);
    assert_eq!(issued.lines.len(), 1);
    assert_eq!(issued.lines[0].description, "Booking bk-2026-0001");
    assert_eq!(issued.lines[0].line_total, Cents::from(925));

    let document = env.invoices.document(invoice.id).await.unwrap();
    assert_eq!(document.content_type, "text/html; charset=utf-8");
    let html = String::from_utf8(document.bytes).unwrap();
    for expected in ["INV-2026-10-00001", "01.09.2026 - 30.09.2026", "9.25 EUR", "1.76 EUR", "11.01 EUR", "15.10.2026"] {
        assert!(html.contains(expected), "document is missing {expected}");
    }

    let merchant_invoices = env.merchants.invoices("salon-1").await.unwrap();
    assert_eq!(merchant_invoices.len(), 1);

    let year = Utc::now().year();
    let financials = env.merchants.financial_summary("salon-1", year).await.unwrap();
    assert_eq!(financials.year_gross, Cents::from(1_000));
    assert_eq!(financials.year_platform_fees, Cents::from(75));
    assert_eq!(financials.year_business_fees, Cents::from(925));
    assert_eq!(financials.balance.total_paid_out, Cents::from(925));
    assert_eq!(financials.balance.pending_balance, Cents::ZERO);

    assert!(env.merchants.balance_audit("salon-1").await.unwrap().is_consistent());
    assert!(env.merchants.find_balance_drift().await.unwrap().is_empty());
}
