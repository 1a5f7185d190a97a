use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Buyer, LineItem, TaxDocument};
use crate::xades::SignedDocument;

/// Lifecycle state of an emitted document, persisted as its SRI-style code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EmissionState {
    /// PENDIENTE: created, not yet sent.
    Pending,
    /// RECIBIDA: accepted by reception, authorization outstanding.
    Received,
    /// AUTORIZADO: terminal success.
    Authorized,
    /// PENDIENTE_ENVIO: signed but the SRI could not be reached.
    PendingSubmission,
    /// ERROR_TECNICO: local failure, never reached the SRI.
    TechnicalError,
    /// The SRI's own rejection code (DEVUELTA, NO AUTORIZADO, ...).
    Rejected(String),
}

impl EmissionState {
    /// The persisted state code.
    pub fn code(&self) -> &str {
        match self {
            Self::Pending => "PENDIENTE",
            Self::Received => "RECIBIDA",
            Self::Authorized => "AUTORIZADO",
            Self::PendingSubmission => "PENDIENTE_ENVIO",
            Self::TechnicalError => "ERROR_TECNICO",
            Self::Rejected(code) => code,
        }
    }

    /// Any code that is not one of the fixed states is a rejection code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "PENDIENTE" => Self::Pending,
            "RECIBIDA" => Self::Received,
            "AUTORIZADO" => Self::Authorized,
            "PENDIENTE_ENVIO" => Self::PendingSubmission,
            "ERROR_TECNICO" => Self::TechnicalError,
            other => Self::Rejected(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authorized | Self::TechnicalError | Self::Rejected(_))
    }

    /// States the reconciliation worker picks up.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(self, Self::PendingSubmission | Self::Received)
    }
}

impl fmt::Display for EmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for EmissionState {
    fn from(value: String) -> Self {
        Self::from_code(&value)
    }
}

impl From<EmissionState> for String {
    fn from(value: EmissionState) -> Self {
        value.code().to_string()
    }
}

/// The persisted record of one emission attempt, keyed by access key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub access_key: String,
    pub sequential: String,
    pub issue_date: NaiveDate,
    pub issued_at: NaiveDateTime,
    pub buyer: Buyer,
    pub lines: Vec<LineItem>,
    /// Base taxed at a non-zero rate.
    pub subtotal_taxed: Decimal,
    /// Base taxed at 0%.
    pub subtotal_zero: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
    pub state: EmissionState,
    /// Last error or SRI message text; `None` once authorized.
    pub error_message: Option<String>,
    pub authorization_number: Option<String>,
    pub authorization_date: Option<String>,
    /// The exact bytes submitted to the SRI.
    pub signed_xml: Vec<u8>,
    /// Human-readable rendering, absent for technical errors.
    pub rendered: Option<Vec<u8>>,
}

impl EmissionRecord {
    /// A PENDIENTE record for a signed document.
    pub fn new(doc: &TaxDocument, signed: SignedDocument, issued_at: NaiveDateTime) -> Self {
        let mut record = Self::unsigned(doc, issued_at);
        record.signed_xml = signed.into_bytes();
        record
    }

    /// An ERROR_TECNICO record for a document that could not be serialized or signed.
    pub fn technical_error(doc: &TaxDocument, issued_at: NaiveDateTime, message: impl Into<String>) -> Self {
        let mut record = Self::unsigned(doc, issued_at);
        record.state = EmissionState::TechnicalError;
        record.error_message = Some(message.into());
        record
    }

    fn unsigned(doc: &TaxDocument, issued_at: NaiveDateTime) -> Self {
        Self {
            access_key: doc.access_key.to_string(),
            sequential: doc.sequential.to_string(),
            issue_date: doc.issue_date,
            issued_at,
            buyer: doc.buyer.clone(),
            lines: doc.lines.clone(),
            subtotal_taxed: doc.taxed_base(),
            subtotal_zero: doc.zero_rated_base(),
            vat: doc.vat_total(),
            total: doc.total,
            state: EmissionState::Pending,
            error_message: None,
            authorization_number: None,
            authorization_date: None,
            signed_xml: Vec::new(),
            rendered: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_strings() {
        for state in [
            EmissionState::Pending,
            EmissionState::Received,
            EmissionState::Authorized,
            EmissionState::PendingSubmission,
            EmissionState::TechnicalError,
            EmissionState::Rejected("NO AUTORIZADO".into()),
        ] {
            assert_eq!(EmissionState::from_code(state.code()), state);
        }
    }

    #[test]
    fn unknown_code_is_rejection() {
        assert_eq!(
            EmissionState::from_code("DEVUELTA"),
            EmissionState::Rejected("DEVUELTA".into())
        );
        assert!(EmissionState::from_code("DEVUELTA").is_terminal());
        assert!(EmissionState::Received.needs_reconciliation());
        assert!(!EmissionState::Pending.is_terminal());
    }
}
