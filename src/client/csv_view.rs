//! CSV façade (`spec.md` §4.6).
//!
//! A read/write adapter exposing the synced-plus-pending rows as a CSV
//! stream ordered by id ascending, with pending-new rows appended at the
//! end. Design Notes item 2: the primary mutation API is the keyed
//! [`LocalStore::update`]/[`LocalStore::add`]; this is a positional
//! adapter built on top for callers that parse/emit whole CSV streams.

use std::cell::Cell;
use std::rc::Rc;

use crate::csv_util::split_line;
use crate::error::SyncError;
use crate::server::TableFormat;

use super::local_store::{LocalStore, SyncedRow};

#[derive(Clone, Copy)]
enum Slot {
    Synced(i64),
    Pending(usize),
}

struct ConflictSlot {
    id: i64,
    resolved: Rc<Cell<bool>>,
}

struct ReaderSnapshot {
    slots: Vec<Slot>,
    conflicts: Vec<ConflictSlot>,
}

struct WriteCursor {
    slots: Vec<Slot>,
    index: usize,
}

/// A handle to one unresolved conflict, valid for the lifetime of the
/// snapshot that produced it (i.e. until the next `reader()` call).
#[derive(Clone)]
pub struct ConflictHandle {
    index: usize,
    id: i64,
    server_version: i64,
    server_data: String,
    resolved: Rc<Cell<bool>>,
}

impl ConflictHandle {
    /// The positional index (as yielded by `reader()`) this conflict
    /// occupies.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// The server's competing version of this row, as CSV fields.
    pub fn row(&self) -> Result<(usize, Vec<String>), csv::Error> {
        Ok((self.index, split_line(&self.server_data)?))
    }

    pub fn server_version(&self) -> i64 {
        self.server_version
    }

    /// Promise that the next `write()` at this index incorporates the
    /// server's version. Applied when `writer()` is next called.
    pub fn resolve(&self) {
        self.resolved.set(true);
    }
}

pub struct CsvView<'s> {
    store: &'s mut LocalStore,
    format: TableFormat,
    snapshot: Option<ReaderSnapshot>,
    pending_conflicts: Vec<ConflictHandle>,
    write_cursor: Option<WriteCursor>,
}

impl<'s> CsvView<'s> {
    pub fn new(store: &'s mut LocalStore, format: TableFormat) -> Self {
        Self { store, format, snapshot: None, pending_conflicts: Vec::new(), write_cursor: None }
    }

    /// Snapshot the current ordering (synced rows by id, then
    /// pending-new in insertion order) and return each row's text for
    /// parsing. Must be called before `writer()`.
    pub fn reader(&mut self) -> Vec<String> {
        self.store.reader_taken = true;
        let mut slots = Vec::with_capacity(self.store.rows.len() + self.store.new_rows.len());
        let mut conflicts = Vec::new();
        let mut pending_conflicts = Vec::new();
        let mut data = Vec::new();

        for (index, (id, row)) in self.store.rows.iter().enumerate() {
            data.push(row.data.clone());
            slots.push(Slot::Synced(*id));
            if let Some(conflict) = self.store.conflict_rows.get(id) {
                let resolved = Rc::new(Cell::new(false));
                conflicts.push(ConflictSlot { id: *id, resolved: resolved.clone() });
                pending_conflicts.push(ConflictHandle {
                    index,
                    id: *id,
                    server_version: conflict.version,
                    server_data: conflict.data.clone(),
                    resolved,
                });
            }
        }
        for (pending_idx, pending) in self.store.new_rows.iter().enumerate() {
            data.push(pending.data.clone());
            slots.push(Slot::Pending(pending_idx));
        }

        self.snapshot = Some(ReaderSnapshot { slots, conflicts });
        self.pending_conflicts = pending_conflicts;
        self.write_cursor = None;
        data
    }

    /// Handles for every conflict noted while `reader()` prepared the
    /// last snapshot.
    pub fn get_conflicts(&self) -> Result<Vec<ConflictHandle>, SyncError> {
        if self.snapshot.is_none() {
            return Err(SyncError::Invariant("get_conflicts() called before reader()"));
        }
        Ok(self.pending_conflicts.clone())
    }

    /// Consume the reader snapshot and apply any conflict resolutions
    /// requested via `ConflictHandle::resolve()`, preparing for a
    /// sequence of positional `write()` calls.
    pub fn writer(&mut self) -> Result<(), SyncError> {
        let snapshot = self.snapshot.take().ok_or(SyncError::Invariant("writer() called before reader()"))?;
        for conflict in &snapshot.conflicts {
            if conflict.resolved.get() {
                if let Some(server_row) = self.store.conflict_rows.remove(&conflict.id) {
                    if let Some(row) = self.store.rows.get_mut(&conflict.id) {
                        row.version = server_row.version;
                    }
                }
            }
        }
        self.write_cursor = Some(WriteCursor { slots: snapshot.slots, index: 0 });
        Ok(())
    }

    /// Write the next row positionally. Past the end of the snapshot,
    /// creates pending-new rows; in `stbcsv` format, the very first
    /// write on a store with no pull-seeded header creates the
    /// immutable header row at id 0.
    pub fn write(&mut self, text: &str) -> Result<(), SyncError> {
        let cursor = self.write_cursor.as_mut().ok_or(SyncError::Invariant("write() called before writer()"))?;
        let text = text.trim_end_matches(['\r', '\n']).to_string();

        if cursor.index < cursor.slots.len() {
            match cursor.slots[cursor.index] {
                Slot::Synced(id) => self.store.update(id, text),
                Slot::Pending(pending_idx) => {
                    if let Some(pending) = self.store.new_rows.get_mut(pending_idx) {
                        pending.data = text;
                    }
                }
            }
        } else if cursor.index == 0 && self.format == TableFormat::Stbcsv && self.store.rows.get(&0).is_none() {
            self.store.rows.insert(0, SyncedRow { id: 0, version: 1, data: text, modified: false });
        } else {
            self.store.add(text);
        }

        cursor.index += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::local_store::RepositoryCoords;

    fn store() -> LocalStore {
        LocalStore::new(RepositoryCoords { url: "u".into(), realm: "r".into(), username: "a".into(), password: "p".into() })
    }

    #[test]
    fn reader_orders_synced_then_pending() {
        let mut s = store();
        s.rows.insert(2, SyncedRow { id: 2, version: 1, data: "b".into(), modified: false });
        s.rows.insert(1, SyncedRow { id: 1, version: 1, data: "a".into(), modified: false });
        s.add("c".into());
        let mut view = CsvView::new(&mut s, TableFormat::Csv);
        assert_eq!(view.reader(), vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn writer_marks_modified_on_text_change() {
        let mut s = store();
        s.rows.insert(1, SyncedRow { id: 1, version: 1, data: "a".into(), modified: false });
        let mut view = CsvView::new(&mut s, TableFormat::Csv);
        view.reader();
        view.writer().unwrap();
        view.write("a-changed").unwrap();
        assert!(s.rows[&1].modified);
        assert_eq!(s.rows[&1].data, "a-changed");
    }

    #[test]
    fn write_past_snapshot_end_creates_pending_row() {
        let mut s = store();
        let mut view = CsvView::new(&mut s, TableFormat::Csv);
        view.reader();
        view.writer().unwrap();
        view.write("brand new").unwrap();
        assert_eq!(s.new_rows.len(), 1);
        assert_eq!(s.new_rows[0].data, "brand new");
    }

    #[test]
    fn first_write_on_empty_stbcsv_store_creates_header() {
        let mut s = store();
        let mut view = CsvView::new(&mut s, TableFormat::Stbcsv);
        view.reader();
        view.writer().unwrap();
        view.write("Name,Age").unwrap();
        assert_eq!(s.rows[&0].data, "Name,Age");
        assert_eq!(s.rows[&0].version, 1);
    }

    #[test]
    fn resolve_advances_synced_row_version_on_next_writer() {
        let mut s = store();
        s.rows.insert(1, SyncedRow { id: 1, version: 1, data: "mine".into(), modified: true });
        s.conflict_rows.insert(1, crate::client::local_store::ConflictRow { id: 1, version: 2, data: "theirs".into() });

        let mut view = CsvView::new(&mut s, TableFormat::Csv);
        view.reader();
        let conflicts = view.get_conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        conflicts[0].resolve();

        view.writer().unwrap();
        view.write("merged").unwrap();

        assert_eq!(s.rows[&1].version, 2);
        assert_eq!(s.rows[&1].data, "merged");
        assert!(!s.conflict_rows.contains_key(&1));
    }

    #[test]
    fn writer_without_reader_fails() {
        let mut s = store();
        let mut view = CsvView::new(&mut s, TableFormat::Csv);
        assert!(view.writer().is_err());
    }
}
