use mockall::mock;
use settlement_engine::{
    db_types::{Invoice, InvoiceLineItem, InvoiceStatus, Merchant, MerchantProfile, NewPayout, Payment, Payout, PayoutStatus},
    traits::{
        BalanceAudit,
        EmailDelivery,
        InvoiceDraft,
        InvoiceManagement,
        MerchantManagement,
        MonthlyBreakdown,
        PayoutManagement,
        PendingSummary,
        SettlementError,
    },
};

mock! {
    pub MerchantStore {}
    impl MerchantManagement for MerchantStore {
        async fn fetch_merchant(&self, merchant_id: &str) -> Result<Option<Merchant>, SettlementError>;
        async fn upsert_profile(&self, merchant_id: &str, profile: MerchantProfile) -> Result<Merchant, SettlementError>;
        async fn pending_summary(&self, merchant_id: &str) -> Result<PendingSummary, SettlementError>;
        async fn monthly_breakdown(&self, merchant_id: &str, year: i32) -> Result<Vec<MonthlyBreakdown>, SettlementError>;
        async fn payout_history(&self, merchant_id: &str) -> Result<Vec<Payout>, SettlementError>;
        async fn invoices_for_merchant(&self, merchant_id: &str) -> Result<Vec<Invoice>, SettlementError>;
        async fn merchant_ids(&self) -> Result<Vec<String>, SettlementError>;
        async fn balance_audit(&self, merchant_id: &str) -> Result<BalanceAudit, SettlementError>;
    }
}

mock! {
    pub InvoiceStore {}
    impl Clone for InvoiceStore {
        fn clone(&self) -> Self;
    }
    impl InvoiceManagement for InvoiceStore {
        async fn create_invoice(&self, draft: InvoiceDraft) -> Result<(Invoice, Vec<InvoiceLineItem>), SettlementError>;
        async fn fetch_invoice(&self, id: i64) -> Result<Option<Invoice>, SettlementError>;
        async fn fetch_invoice_for_payout(&self, payout_id: i64) -> Result<Option<Invoice>, SettlementError>;
        async fn fetch_line_items(&self, invoice_id: i64) -> Result<Vec<InvoiceLineItem>, SettlementError>;
        async fn set_document_path(&self, id: i64, path: &str) -> Result<Invoice, SettlementError>;
        async fn record_email_result(&self, id: i64, result: EmailDelivery) -> Result<Invoice, SettlementError>;
        async fn update_invoice_status(&self, id: i64, status: InvoiceStatus) -> Result<Invoice, SettlementError>;
        async fn delete_draft_invoice(&self, id: i64) -> Result<Invoice, SettlementError>;
    }
}

mock! {
    pub PayoutStore {}
    impl Clone for PayoutStore {
        fn clone(&self) -> Self;
    }
    impl PayoutManagement for PayoutStore {
        async fn create_payout(&self, payout: NewPayout) -> Result<(Payout, Vec<Payment>), SettlementError>;
        async fn fetch_payout(&self, id: i64) -> Result<Option<Payout>, SettlementError>;
        async fn start_payout(&self, id: i64) -> Result<Payout, SettlementError>;
        async fn complete_payout<'a>(&self, id: i64, transaction_reference: &str, notes: Option<&'a str>) -> Result<Payout, SettlementError>;
        async fn release_payout<'a>(&self, id: i64, status: PayoutStatus, reason: Option<&'a str>) -> Result<Payout, SettlementError>;
    }
}
