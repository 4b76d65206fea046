//! Key-addressed JSON record store.
//!
//! One store instance is one logical table: records are opaque JSON objects
//! addressed by a string key. Supports unconditional put, insert-if-absent,
//! and field-merge updates that report a missing key instead of creating it.
//!
//! Two backends: `MemoryRecordStore` (tests, local runs) and `PgRecordStore`
//! (one JSONB table per logical table).

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use traits::{RecordStore, RecordStoreExt, UpdateOutcome};
