use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::access_key::AccessKey;
use super::numbering::Sequential;

/// Identification used by the SRI for anonymous retail buyers.
pub const FINAL_CONSUMER_ID: &str = "9999999999999";

/// Payment method "sin utilizacion del sistema financiero" (cash).
pub const CASH_PAYMENT_CODE: &str = "01";

/// Tax code of IVA (VAT) in `totalImpuesto` / `impuesto`.
pub const VAT_TAX_CODE: &str = "2";

/// Security code embedded in every access key unless configured otherwise.
pub const DEFAULT_SECURITY_CODE: &str = "12345678";

/// Currency label required by the `factura` schema.
pub const CURRENCY: &str = "DOLAR";

/// SRI environment (`ambiente`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// 1: pruebas.
    #[default]
    Test,
    /// 2: produccion.
    Production,
}

impl Environment {
    /// The code written to XML and embedded in the access key.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Test => "1",
            Self::Production => "2",
        }
    }

    /// Inverse of [`Self::code`]; `None` for unknown codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Test),
            "2" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Emission type (`tipoEmision`). Only normal emission is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmissionType {
    #[default]
    Normal,
}

impl EmissionType {
    /// The code written to XML and embedded in the access key.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Normal => "1",
        }
    }

    /// Inverse of [`Self::code`]; `None` for unknown codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Normal),
            _ => None,
        }
    }
}

/// Tax document type (`codDoc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// 01: factura.
    Invoice,
    /// 04: nota de credito.
    CreditNote,
    /// 05: nota de debito.
    DebitNote,
    /// 06: guia de remision.
    Waybill,
    /// 07: comprobante de retencion.
    Withholding,
}

impl DocumentType {
    /// The code written to XML and embedded in the access key.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "01",
            Self::CreditNote => "04",
            Self::DebitNote => "05",
            Self::Waybill => "06",
            Self::Withholding => "07",
        }
    }

    /// Inverse of [`Self::code`]; `None` for unknown codes.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Invoice),
            "04" => Some(Self::CreditNote),
            "05" => Some(Self::DebitNote),
            "06" => Some(Self::Waybill),
            "07" => Some(Self::Withholding),
            _ => None,
        }
    }
}

/// Buyer identification type (`tipoIdentificacionComprador`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuyerIdType {
    /// 04
    Ruc,
    /// 05
    Cedula,
    /// 06
    Passport,
    /// 07
    FinalConsumer,
    /// 08
    Foreign,
}

impl BuyerIdType {
    /// The `tipoIdentificacionComprador` code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ruc => "04",
            Self::Cedula => "05",
            Self::Passport => "06",
            Self::FinalConsumer => "07",
            Self::Foreign => "08",
        }
    }

    /// Infer the identification type from the identification itself.
    pub fn infer(identification: &str) -> Self {
        let id = identification.trim();
        if id == FINAL_CONSUMER_ID {
            return Self::FinalConsumer;
        }
        let all_digits = !id.is_empty() && id.chars().all(|c| c.is_ascii_digit());
        match id.len() {
            13 if all_digits => Self::Ruc,
            10 if all_digits => Self::Cedula,
            _ => Self::Passport,
        }
    }
}

/// Issuer identity and fiscal flags, as configured for the point of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issuer {
    /// 13-digit RUC.
    pub ruc: String,
    /// Razon social.
    pub legal_name: String,
    /// Nombre comercial.
    #[serde(default)]
    pub trade_name: Option<String>,
    /// Direccion matriz. Falls back to the legal name when empty.
    #[serde(default)]
    pub head_office_address: String,
    /// Direccion del establecimiento.
    #[serde(default)]
    pub establishment_address: Option<String>,
    /// Establishment code, up to 3 digits.
    pub establishment: String,
    /// Point-of-emission code, up to 3 digits.
    pub emission_point: String,
    #[serde(default)]
    pub environment: Environment,
    /// Contribuyente especial resolution number.
    #[serde(default)]
    pub special_taxpayer: Option<String>,
    #[serde(default)]
    pub obligated_accounting: bool,
    /// Agente de retencion resolution number.
    #[serde(default)]
    pub retention_agent: Option<String>,
    /// RIMPE regime legend.
    #[serde(default)]
    pub rimpe: Option<String>,
}

impl Issuer {
    /// Establishment code zero-padded to 3 digits.
    pub fn establishment_code(&self) -> String {
        format!("{:0>3}", self.establishment.trim())
    }

    /// Point-of-emission code zero-padded to 3 digits.
    pub fn emission_point_code(&self) -> String {
        format!("{:0>3}", self.emission_point.trim())
    }

    /// Head-office address, or the legal name if no address is configured.
    pub fn head_office(&self) -> &str {
        if self.head_office_address.trim().is_empty() {
            &self.legal_name
        } else {
            &self.head_office_address
        }
    }
}

/// Buyer identity as it appears on the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub id_type: BuyerIdType,
    pub identification: String,
    pub name: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A document line with its per-line rounded amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Codigo principal.
    pub code: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    /// Codigo porcentaje of the VAT rate (e.g. "0", "4").
    pub rate_code: String,
    /// VAT rate in percent (e.g. 15).
    pub rate: Decimal,
    /// round(quantity × unit price, 2).
    pub base: Decimal,
    /// round(base × rate / 100, 2).
    pub tax: Decimal,
}

/// Aggregated tax base and amount for one VAT rate code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBucket {
    pub rate_code: String,
    pub rate: Decimal,
    pub base: Decimal,
    pub tax: Decimal,
}

/// A payment entry (`pagos/pago`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTerm {
    /// Forma de pago code (e.g. "01" cash, "19" credit card, "20" other financial).
    pub method_code: String,
    pub total: Decimal,
    /// Plazo.
    pub term: Option<String>,
    /// Unidad de tiempo (e.g. "dias").
    pub time_unit: Option<String>,
}

/// A free-form `campoAdicional`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub name: String,
    pub value: String,
}

/// The canonical in-memory invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxDocument {
    pub environment: Environment,
    pub emission_type: EmissionType,
    pub document_type: DocumentType,
    pub issuer: Issuer,
    pub buyer: Buyer,
    pub issue_date: NaiveDate,
    pub sequential: Sequential,
    pub access_key: AccessKey,
    pub lines: Vec<LineItem>,
    /// Ordered by rate code.
    pub buckets: Vec<TaxBucket>,
    /// Total sin impuestos.
    pub subtotal: Decimal,
    pub total_discount: Decimal,
    /// Propina.
    pub tip: Decimal,
    /// Importe total.
    pub total: Decimal,
    pub currency: String,
    pub payments: Vec<PaymentTerm>,
    pub additional: Vec<AdditionalField>,
}

impl TaxDocument {
    /// Taxable base of all buckets with a non-zero rate.
    pub fn taxed_base(&self) -> Decimal {
        self.buckets
            .iter()
            .filter(|b| !b.rate.is_zero())
            .map(|b| b.base)
            .sum()
    }

    /// Base of zero-rated buckets.
    pub fn zero_rated_base(&self) -> Decimal {
        self.buckets
            .iter()
            .filter(|b| b.rate.is_zero())
            .map(|b| b.base)
            .sum()
    }

    /// Sum of VAT across buckets.
    pub fn vat_total(&self) -> Decimal {
        self.buckets.iter().map(|b| b.tax).sum()
    }
}

/// A sale as submitted by the point-of-sale front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleRequest {
    pub buyer_id: String,
    pub buyer_name: String,
    pub buyer_address: String,
    pub buyer_email: String,
    pub buyer_phone: String,
    /// Forma de pago code. Empty means cash, applied after the regulatory checks.
    pub payment_method: String,
    pub payment_term: Option<String>,
    pub payment_time_unit: Option<String>,
    pub observation: String,
    /// Ignored: the sequential is always recomputed from the store.
    pub sequential: Option<String>,
    pub items: Vec<SaleItem>,
}

/// One requested line of a sale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleItem {
    pub code: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Codigo porcentaje (e.g. "0" for 0%, "4" for 15%).
    pub rate_code: String,
    /// Rate in percent.
    pub rate: Decimal,
}
