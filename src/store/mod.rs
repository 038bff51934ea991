//! The repository store: a durable keyed table of `(id -> row)`.
//!
//! This is the leaf component in the design (`spec.md` §4.1). The core
//! (the server reconciliation engine) only ever talks to the
//! [`RowStore`] trait; [`sqlite::SqliteRowStore`] is the concrete,
//! `rusqlite`-backed implementation, generalizing the way the teacher
//! crate's `SyncEngine` owns and drives a single `rusqlite::Connection`.

pub mod sqlite;

/// One row as held by the repository store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: i64,
    pub version: i64,
    pub tver: i64,
    pub user: String,
    pub data: String,
}

/// Operations the server reconciliation engine needs from a row store.
/// Every method here corresponds 1:1 to a bullet in `spec.md` §4.1.
pub trait RowStore {
    /// `max(tver)` across all rows, or 0 if the table is empty.
    fn current_table_version(&self) -> Result<i64, rusqlite::Error>;

    /// Rows whose `tver > cursor`, ordered ascending by id. When
    /// `include_header` is set (i.e. the table is `stbcsv`), the row with
    /// `id = 0` is always included regardless of its `tver`, so clients
    /// can verify header identity on every pull. For other formats this
    /// is format-conditional (Design Notes / Open Question 3), unlike the
    /// reference server which always included it.
    fn scan_since(&self, cursor: i64, include_header: bool) -> Result<Vec<StoredRow>, rusqlite::Error>;

    /// Atomic conditional update: succeeds (returns `true`) iff a row
    /// matched `(id, version = expected_prev_version)`.
    fn update_if(
        &self,
        id: i64,
        expected_prev_version: i64,
        new_version: i64,
        tver: i64,
        user: &str,
        data: &str,
    ) -> Result<bool, rusqlite::Error>;

    /// Insert a row. If `id` is `None`, the id is chosen as
    /// `max(existing_id) + 1`, starting at 0 for an empty table.
    fn insert(
        &self,
        id: Option<i64>,
        version: i64,
        tver: i64,
        user: &str,
        data: &str,
    ) -> Result<i64, rusqlite::Error>;

    fn fetch_header(&self) -> Result<Option<StoredRow>, rusqlite::Error> {
        self.read(0)
    }

    fn read(&self, id: i64) -> Result<Option<StoredRow>, rusqlite::Error>;

    /// Every row in the table, ascending by id. Used by the column-
    /// addition utility, which must rewrite every row in one pass.
    fn scan_all(&self) -> Result<Vec<StoredRow>, rusqlite::Error> {
        self.scan_since(0, true)
    }

    /// Run `f` to completion and commit iff it returns `Ok`; otherwise the
    /// transaction rolls back. Mirrors the teacher crate's
    /// `SyncEngine::with_tx`.
    fn transaction<R, E>(&self, f: impl FnOnce() -> Result<R, E>) -> Result<R, E>
    where
        E: From<rusqlite::Error>;

    /// As [`transaction`](RowStore::transaction), but `f` additionally
    /// decides whether to commit: it returns `(value, should_commit)`.
    /// Used by the push handler, which must be able to produce a valid
    /// `Ok` response (`FORMAT_CONFLICT`) while still rolling back every
    /// write the batch made (Open Question 1).
    fn with_transaction<R, E>(&self, f: impl FnOnce() -> Result<(R, bool), E>) -> Result<R, E>
    where
        E: From<rusqlite::Error>;
}
