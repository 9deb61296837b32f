use crate::db_types::{NewInvoiceLine, Payment};

/// One invoice line per covered payment. The line is priced at the merchant's share of the payment (the business
/// fee), and dated on the day the payment succeeded.
pub fn build_line_items(payments: &[Payment], vat_rate: i64) -> Vec<NewInvoiceLine> {
    payments
        .iter()
        .map(|p| NewInvoiceLine {
            payment_id: p.id,
            service_date: p.succeeded_at.unwrap_or(p.created_at).date_naive(),
            description: format!("Booking {}", p.booking_id),
            quantity: 1,
            unit_price: p.business_fee,
            line_total: p.business_fee,
            vat_rate,
        })
        .collect()
}
