use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::{FacturaError, ValidationError};
use super::types::*;

/// Totals at or above this amount must not be paid in cash in production.
pub const FINANCIAL_INSTRUMENT_THRESHOLD: Decimal = dec!(1000.00);

/// Highest total that may be issued to the generic final consumer.
pub const FINAL_CONSUMER_CEILING: Decimal = dec!(50.00);

/// Round a Decimal to `dp` decimal places using half-up (commercial rounding).
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Per-line taxable base: round(quantity × unit price, 2).
pub fn line_base(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round_half_up(quantity * unit_price, 2)
}

/// Per-line VAT: round(base × rate / 100, 2).
pub fn line_tax(base: Decimal, rate: Decimal) -> Decimal {
    round_half_up(base * rate / dec!(100), 2)
}

/// Reject requests with no lines or with lines lacking a product code.
pub fn validate_items(items: &[SaleItem]) -> Result<(), FacturaError> {
    if items.is_empty() {
        return Err(FacturaError::Validation(
            "the invoice has no line items".into(),
        ));
    }
    if let Some(pos) = items.iter().position(|i| i.code.trim().is_empty()) {
        return Err(FacturaError::Validation(format!(
            "line {} has no product code",
            pos + 1
        )));
    }
    Ok(())
}

/// Total of a request using per-line rounding, before any document is built.
pub fn preliminary_total(items: &[SaleItem]) -> Decimal {
    items
        .iter()
        .map(|i| {
            let base = line_base(i.quantity, i.unit_price);
            base + line_tax(base, i.rate)
        })
        .sum()
}

/// Business rules the SRI enforces on the sale as a whole.
///
/// `payment_method` is checked as supplied; an empty code is not treated as
/// cash here.
pub fn check_regulatory(
    environment: Environment,
    total: Decimal,
    payment_method: &str,
    buyer_id: &str,
) -> Result<(), FacturaError> {
    if environment == Environment::Production
        && total >= FINANCIAL_INSTRUMENT_THRESHOLD
        && payment_method == CASH_PAYMENT_CODE
    {
        return Err(FacturaError::Regulatory(format!(
            "sales of {FINANCIAL_INSTRUMENT_THRESHOLD} or more (total {total}) must be paid \
             through the financial system, not in cash"
        )));
    }
    if buyer_id.trim() == FINAL_CONSUMER_ID && total > FINAL_CONSUMER_CEILING {
        return Err(FacturaError::Regulatory(format!(
            "final consumer invoices may not exceed {FINAL_CONSUMER_CEILING} (total {total}); \
             identify the buyer"
        )));
    }
    Ok(())
}

/// Compute per-line amounts and aggregate them into buckets ordered by rate code.
pub fn calculate_lines(items: &[SaleItem]) -> (Vec<LineItem>, Vec<TaxBucket>) {
    let mut lines = Vec::with_capacity(items.len());
    let mut buckets: BTreeMap<String, TaxBucket> = BTreeMap::new();

    for item in items {
        let base = line_base(item.quantity, item.unit_price);
        let tax = line_tax(base, item.rate);

        let bucket = buckets
            .entry(item.rate_code.clone())
            .or_insert_with(|| TaxBucket {
                rate_code: item.rate_code.clone(),
                rate: item.rate,
                base: Decimal::ZERO,
                tax: Decimal::ZERO,
            });
        bucket.base += base;
        bucket.tax += tax;

        lines.push(LineItem {
            code: item.code.trim().to_string(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: Decimal::ZERO,
            rate_code: item.rate_code.clone(),
            rate: item.rate,
            base,
            tax,
        });
    }

    (lines, buckets.into_values().collect())
}

/// Check the configured issuer before it is used to key a document.
/// Returns all validation errors found (not just the first).
pub fn validate_issuer(issuer: &Issuer) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if issuer.ruc.len() != 13 || !is_digits(&issuer.ruc) {
        errors.push(ValidationError::with_rule(
            "issuer.ruc",
            format!("RUC must be 13 digits, got '{}'", issuer.ruc),
            "RUC-LENGTH",
        ));
    }
    if issuer.legal_name.trim().is_empty() {
        errors.push(ValidationError::new(
            "issuer.legal_name",
            "legal name must not be empty",
        ));
    }
    validate_code(&issuer.establishment, "issuer.establishment", &mut errors);
    validate_code(&issuer.emission_point, "issuer.emission_point", &mut errors);

    errors
}

/// Security codes are exactly 8 digits.
pub fn validate_security_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 8 && is_digits(code) {
        Ok(())
    } else {
        Err(ValidationError::with_rule(
            "emission.security_code",
            format!("security code must be 8 digits, got '{code}'"),
            "CODE-LENGTH",
        ))
    }
}

fn validate_code(code: &str, field: &str, errors: &mut Vec<ValidationError>) {
    let code = code.trim();
    if code.is_empty() || code.len() > 3 || !is_digits(code) {
        errors.push(ValidationError::with_rule(
            field,
            format!("must be 1 to 3 digits, got '{code}'"),
            "CODE-LENGTH",
        ));
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(code: &str, qty: Decimal, price: Decimal, rate_code: &str, rate: Decimal) -> SaleItem {
        SaleItem {
            code: code.into(),
            description: format!("item {code}"),
            quantity: qty,
            unit_price: price,
            rate_code: rate_code.into(),
            rate,
        }
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(round_half_up(dec!(0.125), 2), dec!(0.13));
        assert_eq!(round_half_up(dec!(0.124), 2), dec!(0.12));
        assert_eq!(line_tax(dec!(0.10), dec!(15)), dec!(0.02)); // 0.015
    }

    #[test]
    fn per_line_rounding_before_aggregation() {
        // Three lines of 0.10 at 15%: each tax 0.015 -> 0.02, so 0.06 in total,
        // where rounding the aggregate (0.045) would give 0.05.
        let items = vec![
            item("A", dec!(1), dec!(0.10), "4", dec!(15)),
            item("B", dec!(1), dec!(0.10), "4", dec!(15)),
            item("C", dec!(1), dec!(0.10), "4", dec!(15)),
        ];
        let (_, buckets) = calculate_lines(&items);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].base, dec!(0.30));
        assert_eq!(buckets[0].tax, dec!(0.06));
    }

    #[test]
    fn buckets_sorted_by_rate_code() {
        let items = vec![
            item("A", dec!(2), dec!(5), "4", dec!(15)),
            item("B", dec!(1), dec!(3), "0", dec!(0)),
            item("C", dec!(1), dec!(1), "4", dec!(15)),
        ];
        let (lines, buckets) = calculate_lines(&items);
        assert_eq!(lines.len(), 3);
        let codes: Vec<_> = buckets.iter().map(|b| b.rate_code.as_str()).collect();
        assert_eq!(codes, ["0", "4"]);
        assert_eq!(buckets[1].base, dec!(11.00));
        assert_eq!(buckets[1].tax, dec!(1.65));
    }

    #[test]
    fn empty_code_reports_line() {
        let items = vec![item("A", dec!(1), dec!(1), "0", dec!(0)), item(" ", dec!(1), dec!(1), "0", dec!(0))];
        let err = validate_items(&items).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn cash_threshold_is_inclusive() {
        let result = check_regulatory(Environment::Production, dec!(1000.00), "01", "0102030405");
        assert!(matches!(result, Err(FacturaError::Regulatory(_))));
        assert!(check_regulatory(Environment::Production, dec!(999.99), "01", "0102030405").is_ok());
        assert!(check_regulatory(Environment::Production, dec!(5000), "19", "0102030405").is_ok());
    }

    #[test]
    fn empty_payment_code_is_not_cash_for_threshold() {
        assert!(check_regulatory(Environment::Production, dec!(1500), "", "0102030405").is_ok());
    }

    #[test]
    fn final_consumer_ceiling_is_exclusive() {
        assert!(check_regulatory(Environment::Test, dec!(50.00), "01", FINAL_CONSUMER_ID).is_ok());
        assert!(check_regulatory(Environment::Test, dec!(50.01), "01", FINAL_CONSUMER_ID).is_err());
    }

    #[test]
    fn issuer_checks() {
        let issuer = Issuer {
            ruc: "17921467390".into(),
            legal_name: String::new(),
            trade_name: None,
            head_office_address: String::new(),
            establishment_address: None,
            establishment: "1".into(),
            emission_point: "0011".into(),
            environment: Environment::Test,
            special_taxpayer: None,
            obligated_accounting: false,
            retention_agent: None,
            rimpe: None,
        };
        let errors = validate_issuer(&issuer);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["issuer.ruc", "issuer.legal_name", "issuer.emission_point"]);
    }

    #[test]
    fn security_code_length() {
        assert!(validate_security_code("12345678").is_ok());
        assert!(validate_security_code("1234567").is_err());
        assert!(validate_security_code("1234567a").is_err());
    }
}
