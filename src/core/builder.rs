use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::access_key::{AccessKey, AccessKeyFields};
use super::error::{FacturaError, join_errors};
use super::numbering::Sequential;
use super::types::*;
use super::validation;

/// Builds a keyed [`TaxDocument`] from a [`SaleRequest`].
///
/// ```
/// use comprobantes::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let issuer = Issuer {
///     ruc: "1792146739001".into(),
///     legal_name: "COMERCIAL ANDINA S.A.".into(),
///     trade_name: None,
///     head_office_address: "Av. Amazonas N34-12".into(),
///     establishment_address: None,
///     establishment: "1".into(),
///     emission_point: "1".into(),
///     environment: Environment::Test,
///     special_taxpayer: None,
///     obligated_accounting: true,
///     retention_agent: None,
///     rimpe: None,
/// };
/// let request = SaleRequest {
///     buyer_id: "1710034065".into(),
///     buyer_name: "JUAN PEREZ".into(),
///     payment_method: "01".into(),
///     items: vec![SaleItem {
///         code: "P001".into(),
///         description: "Cafe molido 500g".into(),
///         quantity: dec!(2),
///         unit_price: dec!(4.50),
///         rate_code: "4".into(),
///         rate: dec!(15),
///     }],
///     ..Default::default()
/// };
///
/// let doc = TaxDocumentBuilder::new(issuer, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
///     .sequential(Sequential::first())
///     .build(&request)
///     .unwrap();
///
/// assert_eq!(doc.total, dec!(10.35));
/// assert_eq!(doc.access_key.as_str().len(), 49);
/// ```
pub struct TaxDocumentBuilder {
    issuer: Issuer,
    issue_date: NaiveDate,
    sequential: Option<Sequential>,
    security_code: String,
    document_type: DocumentType,
    emission_type: EmissionType,
}

impl TaxDocumentBuilder {
    /// A builder for an invoice with normal emission and the default security code.
    pub fn new(issuer: Issuer, issue_date: NaiveDate) -> Self {
        Self {
            issuer,
            issue_date,
            sequential: None,
            security_code: DEFAULT_SECURITY_CODE.to_string(),
            document_type: DocumentType::Invoice,
            emission_type: EmissionType::Normal,
        }
    }

    /// Sequential assigned by the caller from the last persisted record.
    pub fn sequential(mut self, sequential: Sequential) -> Self {
        self.sequential = Some(sequential);
        self
    }

    /// Override the 8-digit numeric code embedded in the access key.
    pub fn security_code(mut self, code: impl Into<String>) -> Self {
        self.security_code = code.into();
        self
    }

    /// Validate the request, apply the regulatory rules and assemble the document.
    pub fn build(self, request: &SaleRequest) -> Result<TaxDocument, FacturaError> {
        let issuer_errors = validation::validate_issuer(&self.issuer);
        if !issuer_errors.is_empty() {
            return Err(FacturaError::Configuration(join_errors(&issuer_errors)));
        }
        validation::validate_security_code(&self.security_code)
            .map_err(|e| FacturaError::Configuration(e.to_string()))?;
        let sequential = self
            .sequential
            .ok_or_else(|| FacturaError::Numbering("sequential must be assigned".into()))?;

        validation::validate_items(&request.items)?;

        let environment = self.issuer.environment;
        let preliminary = validation::preliminary_total(&request.items);
        validation::check_regulatory(
            environment,
            preliminary,
            request.payment_method.trim(),
            &request.buyer_id,
        )?;

        // Defaulting happens after the rules above ran on the code as supplied.
        let payment_method = match request.payment_method.trim() {
            "" => CASH_PAYMENT_CODE.to_string(),
            code => code.to_string(),
        };

        let (lines, buckets) = validation::calculate_lines(&request.items);
        let subtotal: Decimal = buckets.iter().map(|b| b.base).sum();
        let total = validation::round_half_up(
            buckets.iter().map(|b| b.base + b.tax).sum(),
            2,
        );

        let access_key = AccessKey::generate(&AccessKeyFields {
            issue_date: self.issue_date,
            document_type: self.document_type,
            ruc: self.issuer.ruc.clone(),
            environment,
            establishment: self.issuer.establishment_code(),
            emission_point: self.issuer.emission_point_code(),
            sequential,
            security_code: self.security_code.clone(),
            emission_type: self.emission_type,
        });

        let buyer = Buyer {
            id_type: BuyerIdType::infer(&request.buyer_id),
            identification: request.buyer_id.trim().to_string(),
            name: request.buyer_name.trim().to_string(),
            address: non_empty(&request.buyer_address),
            email: non_empty(&request.buyer_email),
            phone: non_empty(&request.buyer_phone),
        };

        let payments = vec![PaymentTerm {
            method_code: payment_method,
            total,
            term: request.payment_term.as_deref().and_then(non_empty),
            time_unit: request.payment_time_unit.as_deref().and_then(non_empty),
        }];

        Ok(TaxDocument {
            environment,
            emission_type: self.emission_type,
            document_type: self.document_type,
            additional: additional_fields(request),
            issuer: self.issuer,
            buyer,
            issue_date: self.issue_date,
            sequential,
            access_key,
            lines,
            buckets,
            subtotal,
            total_discount: Decimal::ZERO,
            tip: Decimal::ZERO,
            total,
            currency: CURRENCY.to_string(),
            payments,
        })
    }
}

fn additional_fields(request: &SaleRequest) -> Vec<AdditionalField> {
    [
        ("Email", &request.buyer_email),
        ("Telefono", &request.buyer_phone),
        ("Observacion", &request.observation),
        ("Direccion", &request.buyer_address),
    ]
    .into_iter()
    .filter_map(|(name, value)| {
        non_empty(value).map(|value| AdditionalField {
            name: name.to_string(),
            value,
        })
    })
    .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
