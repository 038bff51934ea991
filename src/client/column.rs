//! Client-side column insertion (`spec.md` §4.7). Must run before any
//! `CsvView::reader()` on the same local store: it rewrites row text
//! directly, bypassing the `modified` bookkeeping the façade relies on.

use crate::csv_util::{join_row, split_line};
use crate::error::SyncError;

use super::local_store::LocalStore;

/// Insert `col_new` immediately after `col_after` in every row held by
/// `store` (synced, conflicted, and pending-new alike). A no-op if the
/// column already exists at that position, so repeated calls are safe.
pub fn add_column(store: &mut LocalStore, col_after: &str, col_new: &str) -> Result<(), SyncError> {
    if store.reader_taken {
        return Err(SyncError::Invariant("add_column must run before any reader() on the local store"));
    }
    let header = store.rows.get(&0).ok_or(SyncError::Invariant("add_column requires a header row"))?;
    let header_fields = split_line(&header.data)?;
    let after_idx = header_fields
        .iter()
        .position(|f| f == col_after)
        .ok_or_else(|| SyncError::Malformed(format!("column {col_after:?} not found")))?;
    let pos = after_idx + 1;

    if header_fields.get(pos).map(String::as_str) == Some(col_new) {
        return Ok(());
    }

    for row in store.rows.values_mut() {
        let mut fields = split_line(&row.data)?;
        let value = if row.id == 0 { col_new.to_string() } else { String::new() };
        fields.insert(pos, value);
        row.data = join_row(&fields)?;
    }
    for conflict in store.conflict_rows.values_mut() {
        let mut fields = split_line(&conflict.data)?;
        fields.insert(pos, String::new());
        conflict.data = join_row(&fields)?;
    }
    for pending in store.new_rows.iter_mut() {
        let mut fields = split_line(&pending.data)?;
        fields.insert(pos, String::new());
        pending.data = join_row(&fields)?;
    }
    Ok(())
}
