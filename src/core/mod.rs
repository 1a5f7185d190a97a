//! Core document types, access keys, numbering and validation.
//!
//! This module provides the in-memory model of an SRI `factura` and the
//! rules applied while building one from a sale request.

mod access_key;
mod builder;
mod error;
mod numbering;
mod types;
mod validation;

pub use access_key::*;
pub use builder::*;
pub use error::*;
pub use numbering::*;
pub use types::*;
pub use validation::*;
