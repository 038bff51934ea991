//! Server-side counterpart of the column-addition utility
//! (`spec.md` §4.7): locates `col_after` in the header, inserts
//! `col_new` immediately after it in every row, inside one transaction
//! over the repository store. Idempotent.

use log::info;

use crate::csv_util::{join_row, split_line};
use crate::store::RowStore;

use super::ServerError;

pub fn add_column<S: RowStore>(store: &S, col_after: &str, col_new: &str) -> Result<(), ServerError> {
    store.transaction(|| {
        let rows = store.scan_all()?;
        let Some(header) = rows.iter().find(|r| r.id == 0) else {
            return Err(ServerError::BadRequest("table has no header row".into()));
        };

        let header_fields = split_line(&header.data)?;
        let Some(after_idx) = header_fields.iter().position(|f| f == col_after) else {
            return Err(ServerError::BadRequest(format!("column {col_after:?} not found in header")));
        };
        let pos = after_idx + 1;

        if pos < header_fields.len() && header_fields[pos] == col_new {
            info!("column {col_new:?} already present at index {pos}; no-op");
            return Ok(());
        }

        info!("adding column {col_new:?} after {col_after:?} at index {pos}");
        for row in &rows {
            let mut fields = split_line(&row.data)?;
            let value = if row.id == 0 { col_new.to_string() } else { String::new() };
            fields.insert(pos, value);
            let new_data = join_row(&fields)?;
            store.update_if(row.id, row.version, row.version, row.tver, &row.user, &new_data)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::{SqliteRowStore, create_table};
    use rusqlite::Connection;

    fn populated() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn, "shared").unwrap();
        {
            let store = SqliteRowStore::new(&conn, "shared").unwrap();
            store.insert(Some(0), 1, 1, "alice", "Name,Age").unwrap();
            store.insert(None, 1, 1, "alice", "Ivan,30").unwrap();
            store.insert(None, 1, 1, "alice", "Maria,25").unwrap();
        }
        (conn, "shared".to_string())
    }

    #[test]
    fn inserts_column_and_empty_cells() {
        let (conn, table) = populated();
        let store = SqliteRowStore::new(&conn, &table).unwrap();
        add_column(&store, "Name", "Email").unwrap();

        assert_eq!(store.read(0).unwrap().unwrap().data, "Name,Email,Age");
        assert_eq!(store.read(1).unwrap().unwrap().data, "Ivan,,30");
        assert_eq!(store.read(2).unwrap().unwrap().data, "Maria,,25");
    }

    #[test]
    fn rerunning_is_a_no_op() {
        let (conn, table) = populated();
        let store = SqliteRowStore::new(&conn, &table).unwrap();
        add_column(&store, "Name", "Email").unwrap();
        add_column(&store, "Name", "Email").unwrap();
        assert_eq!(store.read(0).unwrap().unwrap().data, "Name,Email,Age");
        assert_eq!(store.read(1).unwrap().unwrap().data, "Ivan,,30");
    }
}
