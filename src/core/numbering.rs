use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::FacturaError;

/// Highest sequential the 9-digit field can hold.
pub const MAX_SEQUENTIAL: u32 = 999_999_999;

/// Document sequential (`secuencial`), rendered as 9 zero-padded digits.
///
/// The SRI requires sequentials to be unique per establishment and point of
/// emission. They are never taken from the caller: the next value is always
/// derived from the last persisted record with [`Sequential::after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sequential(u32);

impl Sequential {
    /// The first sequential, `000000001`.
    pub fn first() -> Self {
        Self(1)
    }

    /// Validate a raw value against `1..=MAX_SEQUENTIAL`.
    pub fn new(value: u32) -> Result<Self, FacturaError> {
        if value == 0 || value > MAX_SEQUENTIAL {
            return Err(FacturaError::Numbering(format!(
                "sequential {value} is outside 1..={MAX_SEQUENTIAL}"
            )));
        }
        Ok(Self(value))
    }

    /// Parse a persisted sequential such as "000000042".
    pub fn parse(text: &str) -> Result<Self, FacturaError> {
        let text = text.trim();
        if text.is_empty() || text.len() > 9 || !text.chars().all(|c| c.is_ascii_digit()) {
            return Err(FacturaError::Numbering(format!(
                "'{text}' is not a sequential of up to 9 digits"
            )));
        }
        let value = text
            .parse::<u32>()
            .map_err(|e| FacturaError::Numbering(format!("'{text}': {e}")))?;
        Self::new(value)
    }

    /// The numeric value, without zero padding.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The sequential following this one.
    pub fn next(&self) -> Result<Self, FacturaError> {
        if self.0 >= MAX_SEQUENTIAL {
            return Err(FacturaError::Numbering(
                "sequential range exhausted for this point of emission".into(),
            ));
        }
        Ok(Self(self.0 + 1))
    }

    /// Next sequential given the sequential of the most recent record, if any.
    pub fn after(last: Option<&str>) -> Result<Self, FacturaError> {
        match last {
            Some(last) => Self::parse(last)?.next(),
            None => Ok(Self::first()),
        }
    }
}

impl fmt::Display for Sequential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:09}", self.0)
    }
}

impl TryFrom<String> for Sequential {
    type Error = FacturaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sequential> for String {
    fn from(value: Sequential) -> Self {
        value.to_string()
    }
}
