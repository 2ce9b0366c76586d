//! Memory records and the in-process store that owns them

pub mod record;
pub mod store;

pub use record::{MemoryRecord, Metadata};
pub use store::MemoryStore;
