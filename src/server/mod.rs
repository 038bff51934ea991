//! Server reconciliation engine (`spec.md` §4.2).
//!
//! Translates wire requests into [`crate::store::RowStore`] operations,
//! maintains table-version monotonicity, detects conflicts, and emits
//! wire responses. Generalizes the teacher crate's transactional,
//! closure-driven style (`SyncEngine::with_tx`) to the pull/push state
//! machine this spec requires.

pub mod column;

use log::{debug, warn};
use thiserror::Error;

use crate::store::RowStore;
use crate::wire::{PullResponse, PushRequest, PushResponse, PushResult, WireRow, WireRowId, WireRowIds, WireRows};

/// Which header-row handling applies to a shared table. Only `Stbcsv`
/// tables treat the row at id=0 specially; this also decides whether
/// `scan_since`/`scan_all` unconditionally surface that row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Stbcsv,
    Csv,
    Other,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("store: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

pub struct ServerEngine<'s, S: RowStore> {
    store: &'s S,
    format: TableFormat,
}

impl<'s, S: RowStore> ServerEngine<'s, S> {
    pub fn new(store: &'s S, format: TableFormat) -> Self {
        Self { store, format }
    }

    /// Handle a `pull` request: stream every row changed since
    /// `pulled_version`, plus the header row unconditionally for
    /// `stbcsv` tables.
    pub fn handle_pull(&self, pulled_version: i64) -> Result<PullResponse, ServerError> {
        let current = self.store.current_table_version()?;
        let include_header = self.format == TableFormat::Stbcsv;
        debug!("pull: pulled_version={pulled_version} current={current}");
        let rows = self.store.scan_since(pulled_version, include_header)?;
        Ok(PullResponse {
            version: current,
            rows: WireRows {
                row: rows
                    .into_iter()
                    .map(|r| WireRow { id: r.id, version: r.version, data: r.data })
                    .collect(),
            },
        })
    }

    /// Handle a `push` request per `spec.md` §4.2. The whole batch
    /// executes in a single transaction; on `FORMAT_CONFLICT` the
    /// transaction rolls back entirely (Open Question 1 — see
    /// DESIGN.md), rather than keeping already-applied modifications.
    pub fn handle_push(&self, request: &PushRequest, user: &str) -> Result<PushResponse, ServerError> {
        self.store.with_transaction(|| self.push_body(request, user))
    }

    fn push_body(&self, request: &PushRequest, user: &str) -> Result<(PushResponse, bool), ServerError> {
        let base_version = self.store.current_table_version()?;
        let mut tver = base_version + 1;

        let mut mods = Vec::new();
        let mut conflict_count: i64 = 0;

        for row in &request.rows.row {
            if row.id == 0 && self.format == TableFormat::Stbcsv {
                if row.version != 1 {
                    return Err(ServerError::BadRequest(
                        "header row (id=0) must be submitted at version 1".into(),
                    ));
                }
                match self.store.fetch_header()? {
                    None => {
                        self.store.insert(Some(0), 1, tver, user, &row.data)?;
                    }
                    Some(existing) if existing.data == row.data => {
                        // header unchanged: no-op
                    }
                    Some(_) => {
                        warn!("format conflict on header row, rolling back push");
                        let response = PushResponse {
                            result: PushResult::FormatConflict,
                            version: base_version,
                            conflict_count: 0,
                            modified_rows: WireRowIds::default(),
                            new_rows: WireRowIds::default(),
                        };
                        return Ok((response, false));
                    }
                }
                continue;
            }

            if row.version < 1 {
                return Err(ServerError::BadRequest(format!(
                    "row {} submitted with version {} < 1",
                    row.id, row.version
                )));
            }
            let matched = self
                .store
                .update_if(row.id, row.version - 1, row.version, tver, user, &row.data)?;
            if matched {
                mods.push(row.id);
            } else {
                debug!("conflict on row {}", row.id);
                conflict_count += 1;
            }
        }

        let mut news = Vec::new();
        for new_row in &request.new_rows.row {
            let id = self.store.insert(None, 1, tver, user, &new_row.data)?;
            news.push(id);
        }

        if mods.is_empty() && news.is_empty() {
            tver -= 1;
        }

        let response = PushResponse {
            result: PushResult::Ok,
            version: tver,
            conflict_count,
            modified_rows: WireRowIds { row: mods.into_iter().map(|id| WireRowId { id }).collect() },
            new_rows: WireRowIds { row: news.into_iter().map(|id| WireRowId { id }).collect() },
        };
        Ok((response, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::{SqliteRowStore, create_table};
    use crate::wire::{WireNewRow, WireNewRows};
    use rusqlite::Connection;

    fn setup(format: TableFormat) -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn, "shared").unwrap();
        let _ = format;
        (conn, "shared".to_string())
    }

    fn push_new(data: &[&str]) -> PushRequest {
        PushRequest {
            kind: crate::wire::PushRequestKind::Push,
            rows: WireRows::default(),
            new_rows: WireNewRows { row: data.iter().map(|d| WireNewRow { data: d.to_string() }).collect() },
        }
    }

    #[test]
    fn push_new_rows_assigns_ids_in_submission_order() {
        let (conn, table) = setup(TableFormat::Csv);
        let store = SqliteRowStore::new(&conn, &table).unwrap();
        let eng = ServerEngine::new(&store, TableFormat::Csv);

        let resp = eng.handle_push(&push_new(&["a", "b", "c"]), "alice").unwrap();
        assert!(matches!(resp.result, PushResult::Ok));
        assert_eq!(resp.version, 1);
        let ids: Vec<i64> = resp.new_rows.row.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn conflict_only_push_does_not_advance_table_version() {
        let (conn, table) = setup(TableFormat::Csv);
        let store = SqliteRowStore::new(&conn, &table).unwrap();
        let eng = ServerEngine::new(&store, TableFormat::Csv);
        eng.handle_push(&push_new(&["a"]), "alice").unwrap();

        let conflicting = PushRequest {
            kind: crate::wire::PushRequestKind::Push,
            rows: WireRows { row: vec![WireRow { id: 0, version: 5, data: "bogus".into() }] },
            new_rows: WireNewRows::default(),
        };
        let resp = eng.handle_push(&conflicting, "bob").unwrap();
        assert_eq!(resp.conflict_count, 1);
        assert_eq!(resp.version, 1);
        assert!(resp.modified_rows.row.is_empty());
    }

    #[test]
    fn header_format_conflict_rolls_back_whole_batch() {
        let (conn, table) = setup(TableFormat::Stbcsv);
        let store = SqliteRowStore::new(&conn, &table).unwrap();
        let eng = ServerEngine::new(&store, TableFormat::Stbcsv);

        let first = PushRequest {
            kind: crate::wire::PushRequestKind::Push,
            rows: WireRows { row: vec![WireRow { id: 0, version: 1, data: "Name,Age".into() }] },
            new_rows: WireNewRows { row: vec![WireNewRow { data: "Alice,30".into() }] },
        };
        eng.handle_push(&first, "alice").unwrap();

        let conflicting = PushRequest {
            kind: crate::wire::PushRequestKind::Push,
            rows: WireRows { row: vec![WireRow { id: 0, version: 1, data: "Name,Email,Age".into() }] },
            new_rows: WireNewRows { row: vec![WireNewRow { data: "Bob,40".into() }] },
        };
        let resp = eng.handle_push(&conflicting, "bob").unwrap();
        assert!(matches!(resp.result, PushResult::FormatConflict));

        // The row Bob tried to add must not have been committed.
        assert_eq!(store.current_table_version().unwrap(), 1);
        assert!(store.read(2).unwrap().is_none());
    }
}
