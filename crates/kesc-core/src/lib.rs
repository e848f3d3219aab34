pub mod config;
pub mod error;
pub mod types;

pub use error::{EscrowError, EscrowResult};
pub use types::{AuthToken, EntryInfo, Envelope, StorageId, WireEnvelope};
