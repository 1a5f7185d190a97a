use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::{EmissionRecord, EmissionState};
use crate::core::round_half_up;

/// Monthly VAT declaration figures derived from emitted documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatSummary {
    /// First issue date covered, inclusive.
    pub from: Option<NaiveDate>,
    /// Last issue date covered, inclusive.
    pub to: Option<NaiveDate>,
    /// Number of declarable documents in the period.
    pub documents: usize,
    /// Bases taxed at a non-zero rate.
    pub taxed_sales: Decimal,
    /// Bases taxed at 0%.
    pub zero_rated_sales: Decimal,
    /// VAT charged on the taxed sales.
    pub vat_generated: Decimal,
    /// VAT withheld by buyers, as supplied by the caller.
    pub vat_withheld: Decimal,
    /// Taxed over total sales, 4 decimals; one when there are no sales.
    pub proportion_factor: Decimal,
    /// Generated minus withheld, never negative.
    pub vat_payable: Decimal,
}

/// Whether a record counts towards declared sales.
fn is_declarable(record: &EmissionRecord) -> bool {
    !matches!(
        record.state,
        EmissionState::Rejected(_) | EmissionState::TechnicalError
    ) && record.total > Decimal::ZERO
}

/// Summarize records issued between `from` and `to`, both inclusive.
pub fn vat_summary(
    records: &[EmissionRecord],
    from: NaiveDate,
    to: NaiveDate,
    withheld_vat: Decimal,
) -> VatSummary {
    let mut summary = VatSummary {
        from: Some(from),
        to: Some(to),
        vat_withheld: withheld_vat,
        ..Default::default()
    };

    for record in records
        .iter()
        .filter(|r| (from..=to).contains(&r.issue_date))
        .filter(|r| is_declarable(r))
    {
        summary.documents += 1;
        summary.taxed_sales += record.subtotal_taxed;
        summary.zero_rated_sales += record.subtotal_zero;
        summary.vat_generated += record.vat;
    }

    let total_sales = summary.taxed_sales + summary.zero_rated_sales;
    summary.proportion_factor = if total_sales.is_zero() {
        Decimal::ONE
    } else {
        round_half_up(summary.taxed_sales / total_sales, 4)
    };
    summary.vat_payable = (summary.vat_generated - withheld_vat).max(Decimal::ZERO);
    summary
}
