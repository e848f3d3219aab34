//! kesc-store: server-side escrow state machine
//!
//! Per entry: absent → present → (present, fail count rising) → deleted | evicted

pub mod entry;
pub mod store;

pub use entry::EscrowEntry;
pub use store::{EscrowStore, DEFAULT_SHARDS};
