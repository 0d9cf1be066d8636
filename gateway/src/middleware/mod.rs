//! Actix middleware layers.
//!
//! Registration order matters: the last layer registered with
//! [`actix_web::App::wrap`] runs first. The server registers
//! `Idempotency`, then `ProblemJson`, then `RequestTrace`, so a request
//! flows trace -> problem translation -> idempotency -> handler, and any
//! error raised by the idempotency layer is still normalized into a
//! problem detail on the way out.

pub mod idempotency;
pub mod problem;
pub mod trace;

pub use idempotency::{IDEMPOTENCY_KEY_HEADER, Idempotency};
pub use problem::ProblemJson;
pub use trace::{RequestTrace, TRACE_ID_HEADER, TraceId};
