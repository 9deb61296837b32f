use settlement_common::Cents;

use crate::db_types::InvoiceTotals;

/// VAT on `net` at `rate_percent`, rounded half away from zero to the nearest cent.
pub fn vat_for(net: Cents, rate_percent: i64) -> Cents {
    net.scale_basis_points(rate_percent * 100)
}

/// Computes the totals block of an invoice. `gross == net + vat` holds by construction.
pub fn invoice_totals(net: Cents, rate_percent: i64) -> InvoiceTotals {
    let vat_amount = vat_for(net, rate_percent);
    InvoiceTotals { net, vat_rate: rate_percent, vat_amount, gross: net + vat_amount }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nineteen_percent() {
        let t = invoice_totals(Cents::from(925), 19);
        assert_eq!(t.vat_amount, Cents::from(176));
        assert_eq!(t.gross, Cents::from(1_101));

        let t = invoice_totals(Cents::from(3_333), 19);
        assert_eq!(t.vat_amount, Cents::from(633));
        assert_eq!(t.gross, Cents::from(3_966));
    }

    #[test]
    fn zero_rate() {
        let t = invoice_totals(Cents::from(10_000), 0);
        assert_eq!(t.vat_amount, Cents::ZERO);
        assert_eq!(t.gross, t.net);
    }
}
