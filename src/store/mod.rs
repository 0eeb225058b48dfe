//! Store Module
//!
//! In-memory key-value map that mutations and replay are applied to.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Concurrent readers, exclusive writers
//! - Apply replayed events during recovery
//!
//! The store itself is not durable. Durability comes from the transaction
//! log; the engine pairs every mutation here with a log write.

mod table;

pub use table::KvStore;
