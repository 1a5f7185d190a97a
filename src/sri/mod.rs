//! SRI offline web services: reception (`validarComprobante`) and
//! authorization (`autorizacionComprobante`).
//!
//! The client separates transport failure ([`SriError::Network`]), which
//! means "retry later", from a parsed answer that rejects the document,
//! which is returned as data.

mod client;
pub mod soap;
mod types;

pub use client::*;
pub use types::*;
