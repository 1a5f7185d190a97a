//! The 49-digit SRI access key (`claveAcceso`) and its Modulo-11 check digit.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::FacturaError;
use super::numbering::Sequential;
use super::types::{DocumentType, EmissionType, Environment};

/// Length of a complete access key.
pub const ACCESS_KEY_LEN: usize = 49;

/// Modulo-11 check digit over a string of decimal digits.
///
/// Digits are weighted 2,3,4,5,6,7,2,3,... from the rightmost one. The result
/// is `11 - (sum mod 11)`, with 11 mapped to 0 and 10 mapped to 1.
/// Non-digit characters count as zero.
pub fn modulo11(digits: &str) -> u8 {
    let mut sum = 0u32;
    let mut weight = 2u32;
    for c in digits.chars().rev() {
        sum += c.to_digit(10).unwrap_or(0) * weight;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }
    match 11 - (sum % 11) {
        11 => 0,
        10 => 1,
        d => d as u8,
    }
}

/// The fields an access key is composed of, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyFields {
    /// Written as `ddmmyyyy`.
    pub issue_date: NaiveDate,
    /// Two-digit comprobante type.
    pub document_type: DocumentType,
    /// 13-digit issuer RUC.
    pub ruc: String,
    pub environment: Environment,
    /// Establishment code; zero-padded to 3 digits.
    pub establishment: String,
    /// Point-of-emission code; zero-padded to 3 digits.
    pub emission_point: String,
    /// Nine digits, zero-padded.
    pub sequential: Sequential,
    /// 8-digit numeric code.
    pub security_code: String,
    /// Normal emission is `1`.
    pub emission_type: EmissionType,
}

impl AccessKeyFields {
    /// The 48 digits preceding the check digit.
    pub fn digits(&self) -> String {
        format!(
            "{}{}{}{}{:0>3}{:0>3}{}{}{}",
            self.issue_date.format("%d%m%Y"),
            self.document_type.code(),
            self.ruc,
            self.environment.code(),
            self.establishment,
            self.emission_point,
            self.sequential,
            self.security_code,
            self.emission_type.code(),
        )
    }
}

/// A computed access key. Immutable: resubmissions reuse the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    /// Compose the key and append its check digit.
    pub fn generate(fields: &AccessKeyFields) -> Self {
        let digits = fields.digits();
        let check = modulo11(&digits);
        Self(format!("{digits}{check}"))
    }

    /// Accept an existing key after checking length, digits and check digit.
    pub fn parse(text: &str) -> Result<Self, FacturaError> {
        let text = text.trim();
        if text.len() != ACCESS_KEY_LEN || !text.chars().all(|c| c.is_ascii_digit()) {
            return Err(FacturaError::Validation(format!(
                "access key must be {ACCESS_KEY_LEN} digits, got '{text}'"
            )));
        }
        let (body, check) = text.split_at(ACCESS_KEY_LEN - 1);
        let expected = modulo11(body);
        if check != expected.to_string() {
            return Err(FacturaError::Validation(format!(
                "access key check digit is {check}, expected {expected}"
            )));
        }
        Ok(Self(text.to_string()))
    }

    /// The 49 digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing Modulo-11 digit.
    pub fn check_digit(&self) -> u8 {
        self.0
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .map_or(0, |d| d as u8)
    }

    /// Decode the embedded fields.
    pub fn fields(&self) -> Result<AccessKeyFields, FacturaError> {
        let k = self.0.as_str();
        let invalid = |what: &str| FacturaError::Validation(format!("access key has invalid {what}"));
        let issue_date = NaiveDate::parse_from_str(&k[0..8], "%d%m%Y").map_err(|_| invalid("date"))?;
        Ok(AccessKeyFields {
            issue_date,
            document_type: DocumentType::from_code(&k[8..10]).ok_or_else(|| invalid("document type"))?,
            ruc: k[10..23].to_string(),
            environment: Environment::from_code(&k[23..24]).ok_or_else(|| invalid("environment"))?,
            establishment: k[24..27].to_string(),
            emission_point: k[27..30].to_string(),
            sequential: Sequential::parse(&k[30..39]).map_err(|_| invalid("sequential"))?,
            security_code: k[39..47].to_string(),
            emission_type: EmissionType::from_code(&k[47..48]).ok_or_else(|| invalid("emission type"))?,
        })
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccessKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccessKey {
    type Error = FacturaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessKey> for String {
    fn from(value: AccessKey) -> Self {
        value.0
    }
}
