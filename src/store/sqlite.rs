use log::{debug, trace};
use rusqlite::{Connection, OptionalExtension, params};

use super::{RowStore, StoredRow};

/// `rusqlite`-backed [`RowStore`], one table per shared table, following
/// the column layout from `spec.md` §6: `(id, version, tver, user, data)`
/// plus an index on `tver`.
///
/// The table name is administrator-supplied (see `create_table`), never
/// derived from row data, and is validated once at construction time
/// against [`is_valid_identifier`] since SQLite has no way to bind an
/// identifier as a parameter.
pub struct SqliteRowStore<'c> {
    conn: &'c Connection,
    table: String,
}

impl<'c> SqliteRowStore<'c> {
    pub fn new(conn: &'c Connection, table_name: &str) -> Result<Self, rusqlite::Error> {
        if !is_valid_identifier(table_name) {
            return Err(rusqlite::Error::InvalidParameterName(table_name.to_string()));
        }
        Ok(Self { conn, table: table_name.to_string() })
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }
}

/// Create the relational table and its `tver` index for a new shared
/// table. The server bootstrap CLI's sole job.
pub fn create_table(conn: &Connection, table_name: &str) -> Result<(), rusqlite::Error> {
    if !is_valid_identifier(table_name) {
        return Err(rusqlite::Error::InvalidParameterName(table_name.to_string()));
    }
    debug!("creating shared table {table_name}");
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (
            id INTEGER PRIMARY KEY,
            version INTEGER NOT NULL,
            tver INTEGER NOT NULL,
            user TEXT NOT NULL,
            data TEXT NOT NULL
        );
        CREATE INDEX {table}_tver_idx ON {table} (tver);",
        table = table_name,
    ))
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.is_empty() && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn row_from_sql(r: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: r.get(0)?,
        version: r.get(1)?,
        tver: r.get(2)?,
        user: r.get(3)?,
        data: r.get(4)?,
    })
}

impl<'c> RowStore for SqliteRowStore<'c> {
    fn current_table_version(&self) -> Result<i64, rusqlite::Error> {
        let version: Option<i64> = self.conn.query_row(
            &format!("SELECT max(tver) FROM {}", self.table),
            [],
            |r| r.get(0),
        )?;
        Ok(version.unwrap_or(0))
    }

    fn scan_since(&self, cursor: i64, include_header: bool) -> Result<Vec<StoredRow>, rusqlite::Error> {
        trace!("scan_since(cursor={cursor}, include_header={include_header})");
        let sql = if include_header {
            format!("SELECT id, version, tver, user, data FROM {} WHERE tver > ?1 OR id = 0 ORDER BY id", self.table)
        } else {
            format!("SELECT id, version, tver, user, data FROM {} WHERE tver > ?1 ORDER BY id", self.table)
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![cursor], row_from_sql)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn update_if(
        &self,
        id: i64,
        expected_prev_version: i64,
        new_version: i64,
        tver: i64,
        user: &str,
        data: &str,
    ) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET version = ?1, tver = ?2, user = ?3, data = ?4 WHERE id = ?5 AND version = ?6",
                self.table
            ),
            params![new_version, tver, user, data, id, expected_prev_version],
        )?;
        Ok(changed > 0)
    }

    fn insert(
        &self,
        id: Option<i64>,
        version: i64,
        tver: i64,
        user: &str,
        data: &str,
    ) -> Result<i64, rusqlite::Error> {
        let id = match id {
            Some(id) => id,
            None => {
                let max: Option<i64> = self.conn.query_row(
                    &format!("SELECT max(id) FROM {}", self.table),
                    [],
                    |r| r.get(0),
                )?;
                max.map(|m| m + 1).unwrap_or(0)
            }
        };
        self.conn.execute(
            &format!(
                "INSERT INTO {} (id, version, tver, user, data) VALUES (?1, ?2, ?3, ?4, ?5)",
                self.table
            ),
            params![id, version, tver, user, data],
        )?;
        Ok(id)
    }

    fn read(&self, id: i64) -> Result<Option<StoredRow>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT id, version, tver, user, data FROM {} WHERE id = ?1", self.table),
                params![id],
                row_from_sql,
            )
            .optional()
    }

    fn transaction<R, E>(&self, f: impl FnOnce() -> Result<R, E>) -> Result<R, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = self.conn.unchecked_transaction().map_err(E::from)?;
        let value = f()?;
        tx.commit().map_err(E::from)?;
        Ok(value)
    }

    fn with_transaction<R, E>(&self, f: impl FnOnce() -> Result<(R, bool), E>) -> Result<R, E>
    where
        E: From<rusqlite::Error>,
    {
        let tx = self.conn.unchecked_transaction().map_err(E::from)?;
        let (value, should_commit) = f()?;
        if should_commit {
            tx.commit().map_err(E::from)?;
        } else {
            tx.rollback().map_err(E::from)?;
        }
        Ok(value)
    }
}
