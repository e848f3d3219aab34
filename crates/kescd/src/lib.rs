//! kescd: keystore daemon
//!
//! Serves the escrow store over HTTP:
//!   PUT    /api/add/{SU}   store a wrapped session key
//!   POST   /api/get/{SU}   release it against a matching token
//!   DELETE /api/rem/{SU}   remove it against a matching token
//!   GET    /api/info/{SU}  fail count and remove-after threshold
//!   GET    /metrics        Prometheus text format
//!   GET    /healthz        liveness probe

pub mod metrics;
pub mod server;

pub use server::{router, serve, AppState};
