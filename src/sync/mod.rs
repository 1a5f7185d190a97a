//! Background reconciliation with the SRI and the shared activity log.

mod log;
mod worker;

pub use log::*;
pub use worker::*;
