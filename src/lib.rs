//! # comprobantes
//!
//! Electronic invoicing for Ecuador's SRI offline scheme: access keys,
//! `factura` XML, XAdES-BES signatures, the reception and authorization web
//! services, and the background reconciliation of documents left pending.
//!
//! All monetary values use [`rust_decimal::Decimal`] with half-up rounding,
//! applied per line before aggregation.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use comprobantes::core::*;
//!
//! let key = AccessKey::generate(&AccessKeyFields {
//!     issue_date: NaiveDate::from_ymd_opt(2011, 10, 21).unwrap(),
//!     document_type: DocumentType::Invoice,
//!     ruc: "1792146739001".into(),
//!     environment: Environment::Test,
//!     establishment: "2".into(),
//!     emission_point: "1".into(),
//!     sequential: Sequential::first(),
//!     security_code: "12345678".into(),
//!     emission_type: EmissionType::Normal,
//! });
//!
//! assert_eq!(key.as_str(), "2110201101179214673900110020010000000011234567813");
//! assert_eq!(key.check_digit(), modulo11(&key.as_str()[..48]));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` | Document model, access keys, numbering, validation, settings |
//! | `xml` | `factura` 1.1.0 serialization |
//! | `xades` | PKCS#12 loading and XAdES-BES RSA-SHA1 signing |
//! | `sri` | SOAP client for reception and authorization |
//! | `emission` | State machine, orchestrator, reconciliation worker |
//! | `all` (default) | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod config;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "xades")]
pub mod xades;

#[cfg(feature = "sri")]
pub mod sri;

#[cfg(feature = "emission")]
pub mod emission;

#[cfg(feature = "emission")]
pub mod sync;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
