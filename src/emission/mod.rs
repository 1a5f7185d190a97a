//! Emission pipeline: the document state machine, its persistence and the
//! foreground orchestrator.
//!
//! ```text
//! PENDIENTE ──submit──▶ RECIBIDA ──authorize──▶ AUTORIZADO
//!     │                    │
//!     │ network            └──▶ NO AUTORIZADO, ...
//!     ▼
//! PENDIENTE_ENVIO          DEVUELTA, ERROR_TECNICO
//! ```

mod orchestrator;
mod render;
mod report;
mod secrets;
mod state;
mod store;
pub mod transitions;

pub use orchestrator::*;
pub use render::*;
pub use report::*;
pub use secrets::*;
pub use state::*;
pub use store::*;
pub use transitions::{AuthorizeOutcome, SubmitOutcome};
