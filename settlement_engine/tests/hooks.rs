use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::NaiveDate;
use futures_util::FutureExt;
use log::*;
use settlement_engine::{
    db_types::{NewPayout, PayoutMethod, SettlementPeriod},
    events::{EventHandlers, EventHooks},
};
use tokio::runtime::Runtime;

mod support;
use support::prepare_env::{paid_booking, prepare_test_env_with_producers, profile};

#[derive(Clone, Default)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    fn called(&self) {
        self.called.fetch_add(1, Ordering::SeqCst);
    }

    fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }

    async fn wait_for(&self, expected: i32) {
        for _ in 0..50 {
            if self.count() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[test]
fn hooks_fire_for_every_settlement_event() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let succeeded = HookCalled::default();
        let refunded = HookCalled::default();
        let payouts = HookCalled::default();
        let invoices = HookCalled::default();

        let mut hooks = EventHooks::default();
        let s = succeeded.clone();
        hooks.on_payment_succeeded(move |ev| {
            let s = s.clone();
            async move {
                info!("🪝️ Payment {} succeeded", ev.payment.id);
                s.called();
            }
            .boxed()
        });
        let r = refunded.clone();
        hooks.on_payment_refunded(move |ev| {
            let r = r.clone();
            async move {
                info!("🪝️ Payment {} refunded", ev.payment.id);
                r.called();
            }
            .boxed()
        });
        let p = payouts.clone();
        hooks.on_payout_completed(move |ev| {
            let p = p.clone();
            async move {
                info!("🪝️ Payout {} completed", ev.payout.id);
                p.called();
            }
            .boxed()
        });
        let i = invoices.clone();
        hooks.on_invoice_issued(move |ev| {
            let i = i.clone();
            async move {
                info!("🪝️ Invoice {} issued", ev.invoice.invoice_number);
                i.called();
            }
            .boxed()
        });
        let handlers = EventHandlers::new(10, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;

        let env = prepare_test_env_with_producers(producers).await;
        env.merchants.update_profile("salon-1", profile("owner@salon-1.example")).await.unwrap();
        let first = paid_booking(&env, "bk-1", "salon-1", 1_000).await;
        paid_booking(&env, "bk-2", "salon-1", 2_000).await;
        paid_booking(&env, "bk-3", "salon-1", 3_000).await;
        env.payments.refund(first.id, "customer cancelled").await.unwrap();
        let payout = env
            .payouts
            .create_payout(NewPayout {
                merchant_id: "salon-1".into(),
                amount: None,
                method: PayoutMethod::Paypal,
                period: SettlementPeriod::new(
                    NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2026, 9, 30).unwrap(),
                ),
                notes: None,
                approved_by: "admin-1".into(),
            })
            .await
            .unwrap();
        env.payouts.complete_payout(payout.id, "PAYPAL-BATCH-1", None).await.unwrap();
        env.invoices.create_for_payout(payout.id).await.unwrap();

        succeeded.wait_for(3).await;
        refunded.wait_for(1).await;
        payouts.wait_for(1).await;
        invoices.wait_for(1).await;
        assert_eq!(succeeded.count(), 3);
        assert_eq!(refunded.count(), 1);
        assert_eq!(payouts.count(), 1);
        assert_eq!(invoices.count(), 1);
    });
}
