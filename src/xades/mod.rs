//! XAdES-BES signatures over serialized tax documents.
//!
//! The SRI requires an enveloped XML-DSig signature with RSA-SHA1 and the
//! XAdES signed-properties extension. The signature block is assembled from
//! canonical text fragments and spliced into the document by text insertion,
//! so the document bytes that were digested are never re-serialized.

pub mod certificate;
pub mod fragments;
mod signer;

pub use certificate::{SigningCertificate, SigningIdentity, validate_pkcs12};
pub use fragments::SignatureIds;
pub use signer::*;
