//! Client merge engine — pull (`spec.md` §4.4).
//!
//! Classifies every row in a pull response into one of the five
//! outcomes from the spec's table and folds it into the [`LocalStore`].

use std::collections::HashSet;

use log::{debug, trace};

use crate::error::{FormatError, SyncError};
use crate::server::TableFormat;
use crate::wire::PullResponse;

use super::local_store::{ConflictRow, LocalStore, SyncedRow};

/// Apply one pull response to `store`. Returns `(count_changes,
/// count_conflicts)`; the invariant `count_changes >= count_conflicts`
/// always holds by construction (every branch that increments conflicts
/// also increments changes).
///
/// Validates the store invariants from spec §7 before mutating
/// anything: duplicate row ids within the response, and an id=0 row
/// pulled at a version other than 1 in `stbcsv` (the header row is
/// immutable at version 1 forever). Either is a protocol break and
/// aborts without touching `store`.
pub fn merge_pull(store: &mut LocalStore, response: &PullResponse, format: TableFormat) -> Result<(usize, usize), SyncError> {
    let mut seen_ids = HashSet::new();
    for wire_row in &response.rows.row {
        if !seen_ids.insert(wire_row.id) {
            return Err(SyncError::Invariant("duplicate row id within one pull response"));
        }
        if wire_row.id == 0 && format == TableFormat::Stbcsv && wire_row.version != 1 {
            return Err(SyncError::Invariant("header row (id=0) pulled at version != 1 in stbcsv"));
        }
    }

    let mut changes = 0usize;
    let mut conflicts = 0usize;

    for wire_row in &response.rows.row {
        let id = wire_row.id;

        if let Some(conflict) = store.conflict_rows.get_mut(&id) {
            if conflict.version != wire_row.version {
                trace!("row {id}: conflict row advanced to version {}", wire_row.version);
                conflict.version = wire_row.version;
                conflict.data = wire_row.data.clone();
                changes += 1;
                conflicts += 1;
            }
            continue;
        }

        if id == 0 && format == TableFormat::Stbcsv {
            if let Some(header) = store.rows.get(&0) {
                if header.data != wire_row.data {
                    return Err(SyncError::Format(FormatError::HeaderMismatch {
                        local: header.data.clone(),
                        remote: wire_row.data.clone(),
                    }));
                }
                continue;
            }
        }

        if let Some(existing) = store.rows.get_mut(&id) {
            if existing.version == wire_row.version {
                continue;
            }
            if !existing.modified {
                debug!("row {id}: fast-forward to version {}", wire_row.version);
                existing.version = wire_row.version;
                existing.data = wire_row.data.clone();
                changes += 1;
            } else {
                debug!("row {id}: new conflict against local modification");
                store.conflict_rows.insert(id, ConflictRow { id, version: wire_row.version, data: wire_row.data.clone() });
                changes += 1;
                conflicts += 1;
            }
            continue;
        }

        trace!("row {id}: brand new");
        store.rows.insert(id, SyncedRow { id, version: wire_row.version, data: wire_row.data.clone(), modified: false });
        changes += 1;
    }

    store.pulled_version = response.version;
    Ok((changes, conflicts))
}
