//! Property-based tests for access keys and tax aggregation.

#![cfg(feature = "core")]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use comprobantes::core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn issuer() -> Issuer {
    Issuer {
        ruc: "1792146739001".into(),
        legal_name: "COMERCIAL ANDINA S.A.".into(),
        trade_name: None,
        head_office_address: "Av. Amazonas N34-12".into(),
        establishment_address: None,
        establishment: "1".into(),
        emission_point: "1".into(),
        environment: Environment::Test,
        special_taxpayer: None,
        obligated_accounting: false,
        retention_agent: None,
        rimpe: None,
    }
}

// ── Proptest Strategies ─────────────────────────────────────────────────────

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2020i32..=2035, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_fields() -> impl Strategy<Value = AccessKeyFields> {
    (
        arb_date(),
        "[0-9]{13}",
        prop_oneof![Just(Environment::Test), Just(Environment::Production)],
        1u32..=999,
        1u32..=999,
        1u32..=MAX_SEQUENTIAL,
        "[0-9]{8}",
    )
        .prop_map(|(date, ruc, env, estab, point, seq, code)| AccessKeyFields {
            issue_date: date,
            document_type: DocumentType::Invoice,
            ruc,
            environment: env,
            establishment: format!("{estab:03}"),
            emission_point: format!("{point:03}"),
            sequential: Sequential::new(seq).unwrap(),
            security_code: code,
            emission_type: EmissionType::Normal,
        })
}

/// Price with up to three decimals (0.001 to 999.999).
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|mills| Decimal::new(mills, 3))
}

/// Quantity with up to two decimals (0.01 to 50.00).
fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..=5_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_rate() -> impl Strategy<Value = (&'static str, Decimal)> {
    prop_oneof![
        Just(("0", dec!(0))),
        Just(("4", dec!(15))),
        Just(("5", dec!(5))),
        Just(("8", dec!(8))),
    ]
}

fn arb_items() -> impl Strategy<Value = Vec<SaleItem>> {
    prop::collection::vec((arb_quantity(), arb_price(), arb_rate()), 1..=8).prop_map(|items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (quantity, unit_price, (rate_code, rate)))| SaleItem {
                code: format!("P{:03}", i + 1),
                description: format!("Item {}", i + 1),
                quantity,
                unit_price,
                rate_code: rate_code.into(),
                rate,
            })
            .collect()
    })
}

// ── Property Tests ──────────────────────────────────────────────────────────

proptest! {
    /// The last digit is the Modulo-11 digit of the first 48 and the key parses back.
    #[test]
    fn access_key_check_digit(fields in arb_fields()) {
        let key = AccessKey::generate(&fields);
        let text = key.as_str();

        prop_assert_eq!(text.len(), ACCESS_KEY_LEN);
        prop_assert!(text.bytes().all(|b| b.is_ascii_digit()));
        prop_assert_eq!(key.check_digit(), modulo11(&text[..48]));
        let digits = fields.digits();
        prop_assert_eq!(&text[..48], digits.as_str());

        let parsed = AccessKey::parse(text).unwrap();
        prop_assert_eq!(&parsed, &key);
        prop_assert_eq!(parsed.fields().unwrap(), fields);
    }

    /// A single-digit change is rejected unless the check digit happens to match.
    #[test]
    fn altered_digit_is_rejected(fields in arb_fields(), pos in 0usize..48, bump in 1u8..=9) {
        let key = AccessKey::generate(&fields);
        let mut digits = key.as_str().as_bytes().to_vec();
        digits[pos] = b'0' + (digits[pos] - b'0' + bump) % 10;
        let altered = String::from_utf8(digits).unwrap();

        // Some changes land on the same check digit.
        if modulo11(&altered[..48]) != key.check_digit() {
            prop_assert!(AccessKey::parse(&altered).is_err());
        }
    }

    /// Bucket bases add up to the sum of rounded line bases per rate code,
    /// and the total is the rounded sum of bases plus taxes.
    #[test]
    fn buckets_aggregate_rounded_lines(items in arb_items()) {
        let request = SaleRequest {
            buyer_id: "1790012345001".into(),
            buyer_name: "DISTRIBUIDORA NORTE".into(),
            items: items.clone(),
            ..Default::default()
        };
        let doc = TaxDocumentBuilder::new(issuer(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
            .sequential(Sequential::first())
            .build(&request)
            .unwrap();

        let mut expected: BTreeMap<String, Decimal> = BTreeMap::new();
        for item in &items {
            *expected.entry(item.rate_code.clone()).or_default() +=
                round_half_up(item.quantity * item.unit_price, 2);
        }

        let codes: Vec<&str> = doc.buckets.iter().map(|b| b.rate_code.as_str()).collect();
        let expected_codes: Vec<&str> = expected.keys().map(String::as_str).collect();
        prop_assert_eq!(codes, expected_codes);
        for bucket in &doc.buckets {
            prop_assert_eq!(bucket.base, expected[&bucket.rate_code]);
        }

        for line in &doc.lines {
            prop_assert_eq!(line.base, round_half_up(line.quantity * line.unit_price, 2));
            prop_assert_eq!(line.tax, round_half_up(line.base * line.rate / dec!(100), 2));
        }

        let total = round_half_up(doc.buckets.iter().map(|b| b.base + b.tax).sum(), 2);
        prop_assert_eq!(doc.total, total);
        prop_assert_eq!(doc.subtotal, doc.taxed_base() + doc.zero_rated_base());
        prop_assert_eq!(doc.payments[0].total, doc.total);
    }
}
