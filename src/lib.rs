//! # txkv
//!
//! A key-value store served over HTTP, with:
//! - An append-only transaction log recording every mutation
//! - Interchangeable log backends (flat file, SQLite table)
//! - Asynchronous single-writer persistence with bounded backpressure
//! - Crash recovery by replaying the log at startup
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Server                             │
//! │                  (Concurrent Handlers)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   KvStore   │          │ Transaction │
//!   │  (RwLock)   │          │   Logger    │
//!   └─────────────┘          └──────┬──────┘
//!          ▲                        │ writer thread
//!          │ replay                 ▼
//!          │                 ┌─────────────┐
//!          └─────────────────│   Storage   │
//!                            │ File/SQLite │
//!                            └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod txlog;
pub mod store;
pub mod storage;
pub mod http;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TxkvError, Result};
pub use config::Config;
pub use engine::Engine;
pub use txlog::{Event, EventType, TransactionLogger};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of txkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
