//! A shared-table synchronization protocol: a repository store and a
//! reconciliation engine on the server, a local store and merge engine
//! on the client, reconciled by per-row `version` and table-wide `tver`
//! cursors. See `SPEC_FULL.md` for the full module breakdown.

pub mod client;
pub mod csv_util;
pub mod error;
pub mod server;
pub mod store;
pub mod wire;

pub use client::{LocalStore, RepositoryCoords, SharedTable};
pub use error::{FormatError, SyncError};
pub use server::{ServerEngine, TableFormat};
