//! Canonical XML serialization of SRI tax documents.
//!
//! The serializer writes elements in schema order with a fixed indentation and
//! canonical-XML text escaping, so the bytes it produces can be digested and
//! signed as-is.

mod factura;
pub mod xml_utils;

pub use factura::*;
