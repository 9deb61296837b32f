use log::*;
use serde::{Deserialize, Serialize};
use settlement_engine::{
    payment_objects::ReconciliationReport,
    traits::{MerchantManagement, PaymentGateway, PaymentLedger, SettlementError},
    MerchantApi,
    PaymentFlowApi,
};
use tokio::task::JoinHandle;

use crate::config::ReconciliationConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub payments: ReconciliationReport,
    /// Merchants whose stored balance disagrees with their ledger rows.
    pub drifted_merchants: Vec<String>,
}

/// One reconciliation pass: settle stale open payments against the providers, then audit every merchant balance.
pub async fn reconcile_once<B, G>(
    flow: &PaymentFlowApi<B, G>,
    merchants: &MerchantApi<B>,
    config: &ReconciliationConfig,
) -> Result<ReconciliationSummary, SettlementError>
where
    B: PaymentLedger + MerchantManagement,
    G: PaymentGateway,
{
    let payments = flow.reconcile_payments(config.stale_after, config.abandon_after).await?;
    let drifted_merchants = merchants.find_balance_drift().await?.into_iter().map(|(id, _)| id).collect();
    Ok(ReconciliationSummary { payments, drifted_merchants })
}

/// Starts the reconciliation worker on the current actix system. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_reconciliation_worker<B, G>(
    flow: PaymentFlowApi<B, G>,
    merchants: MerchantApi<B>,
    config: ReconciliationConfig,
) -> JoinHandle<()>
where
    B: PaymentLedger + MerchantManagement + 'static,
    G: PaymentGateway + 'static,
{
    actix_web::rt::spawn(async move {
        let mut timer = tokio::time::interval(config.interval);
        info!("🕰️ Reconciliation worker started. Running every {}s", config.interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running reconciliation job");
            match reconcile_once(&flow, &merchants, &config).await {
                Ok(summary) => {
                    let report = summary.payments;
                    if report.checked > 0 {
                        info!(
                            "🕰️ Reconciled {} open payments: {} resolved, {} retried, {} abandoned, {} still open, {} \
                             errors",
                            report.checked,
                            report.resolved,
                            report.retried,
                            report.abandoned,
                            report.still_open,
                            report.errors
                        );
                    }
                    if !summary.drifted_merchants.is_empty() {
                        warn!("🕰️ Balance drift detected for {}", summary.drifted_merchants.join(", "));
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running the reconciliation job: {e}");
                },
            }
        }
    })
}
