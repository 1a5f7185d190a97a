use std::path::PathBuf;

use chrono::NaiveDate;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use comprobantes::core::*;
use comprobantes::xades::{SigningIdentity, XadesSigner};
use comprobantes::xml;

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

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

fn sale(lines: usize) -> SaleRequest {
    SaleRequest {
        buyer_id: "1790012345001".into(),
        buyer_name: "DISTRIBUIDORA NORTE CIA. LTDA.".into(),
        buyer_email: "compras@norte.ec".into(),
        payment_method: "20".into(),
        items: (1..=lines)
            .map(|i| SaleItem {
                code: format!("P{i:04}"),
                description: format!("Item {i}"),
                quantity: dec!(2),
                unit_price: dec!(4.125),
                rate_code: if i % 3 == 0 { "0".into() } else { "4".into() },
                rate: if i % 3 == 0 { dec!(0) } else { dec!(15) },
            })
            .collect(),
        ..Default::default()
    }
}

fn build(request: &SaleRequest) -> TaxDocument {
    TaxDocumentBuilder::new(issuer(), test_date())
        .sequential(Sequential::first())
        .build(request)
        .unwrap()
}

fn bench_access_key(c: &mut Criterion) {
    let fields = build(&sale(1)).access_key.fields().unwrap();
    c.bench_function("access_key_generate", |b| {
        b.iter(|| black_box(AccessKey::generate(black_box(&fields))));
    });
}

fn bench_build_document(c: &mut Criterion) {
    let request = sale(10);
    c.bench_function("build_document_10_lines", |b| {
        b.iter(|| black_box(build(black_box(&request))));
    });
}

fn bench_serialize(c: &mut Criterion) {
    let small = build(&sale(10));
    c.bench_function("factura_serialize_10_lines", |b| {
        b.iter(|| black_box(xml::to_factura_xml(black_box(&small))));
    });

    let large = build(&sale(1000));
    c.bench_function("factura_serialize_1000_lines", |b| {
        b.iter(|| black_box(xml::to_factura_xml(black_box(&large))));
    });
}

fn bench_sign(c: &mut Criterion) {
    let p12 = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/signer.p12");
    let signer = XadesSigner::new(SigningIdentity::from_pkcs12_file(&p12, "changeit").unwrap());
    let document = xml::to_factura_xml(&build(&sale(10))).unwrap();
    c.bench_function("xades_sign_10_lines", |b| {
        b.iter(|| black_box(signer.sign(black_box(&document))));
    });
}

criterion_group!(
    benches,
    bench_access_key,
    bench_build_document,
    bench_serialize,
    bench_sign,
);
criterion_main!(benches);
