//! Client merge engine — push (`spec.md` §4.5).

use log::{debug, warn};

use crate::error::{FormatError, SyncError};
use crate::server::TableFormat;
use crate::wire::{PushRequest, PushRequestKind, PushResponse, PushResult, WireNewRow, WireNewRows, WireRow, WireRows};

use super::local_store::{LocalStore, SyncedRow};

/// Build the push request body from the current local store state. An
/// empty request (no synced row submitted, no pending-new rows) means
/// the round trip can be skipped entirely — callers should check
/// [`PushRequest::is_empty`] before sending.
pub fn build_push_request(store: &LocalStore, format: TableFormat) -> PushRequest {
    let mut rows = Vec::new();
    for row in store.rows.values() {
        if format == TableFormat::Stbcsv && row.id == 0 {
            // Unconditional: acts as a format probe even if unchanged.
            rows.push(WireRow { id: 0, version: 1, data: row.data.clone() });
        } else if row.modified {
            rows.push(WireRow { id: row.id, version: row.version + 1, data: row.data.clone() });
        }
    }
    let new_rows = store.new_rows.iter().map(|p| WireNewRow { data: p.data.clone() }).collect();
    PushRequest { kind: PushRequestKind::Push, rows: WireRows { row: rows }, new_rows: WireNewRows { row: new_rows } }
}

/// Apply a push response to the local store: accept modified/new rows,
/// leave conflicted rows untouched (they'll surface on the next pull),
/// and decide whether the cursor-advance optimisation applies.
///
/// Validates the store invariants from spec §7 before mutating
/// anything: duplicate row ids across `modified_rows`/`new_rows`, the
/// `new_rows` count matching the submitted pending rows, and
/// `submitted == accepted + conflicts`. Any violation aborts the
/// operation without touching `store`.
pub fn apply_push_response(store: &mut LocalStore, request: &PushRequest, response: &PushResponse, format: TableFormat) -> Result<(), SyncError> {
    if response.result == PushResult::FormatConflict {
        warn!("push rejected: server reports a format conflict");
        return Err(SyncError::Format(FormatError::ServerFormatConflict));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for wire_id in response.modified_rows.row.iter().chain(response.new_rows.row.iter()) {
        if !seen_ids.insert(wire_id.id) {
            return Err(SyncError::Invariant("duplicate row id within one push response"));
        }
    }

    if response.new_rows.row.len() != store.new_rows.len() {
        return Err(SyncError::Invariant("push response new_rows count does not match submitted pending rows"));
    }

    let submitted = request
        .rows
        .row
        .iter()
        .filter(|r| !(format == TableFormat::Stbcsv && r.id == 0))
        .count()
        + request.new_rows.row.len();
    let accepted = response.modified_rows.row.len() + response.new_rows.row.len();
    let conflicts = response.conflict_count as usize;
    if submitted != accepted + conflicts {
        return Err(SyncError::Invariant("submitted != accepted + conflicts"));
    }

    for wire_id in &response.modified_rows.row {
        if let Some(row) = store.rows.get_mut(&wire_id.id) {
            row.modified = false;
            row.version += 1;
            debug!("row {}: accepted at version {}", row.id, row.version);
        }
    }

    for (pending, wire_id) in store.new_rows.drain(..).zip(response.new_rows.row.iter()) {
        debug!("pending row accepted as id {}", wire_id.id);
        store.rows.insert(wire_id.id, SyncedRow { id: wire_id.id, version: 1, data: pending.data, modified: false });
    }

    if accepted > 0 && response.version == store.pulled_version + 1 {
        debug!("cursor advance optimisation: pulled_version -> {}", response.version);
        store.pulled_version = response.version;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::local_store::RepositoryCoords;
    use crate::wire::WireRowIds;

    fn store() -> LocalStore {
        LocalStore::new(RepositoryCoords { url: "u".into(), realm: "r".into(), username: "a".into(), password: "p".into() })
    }

    #[test]
    fn build_request_includes_modified_rows_and_pending_new() {
        let mut s = store();
        s.rows.insert(1, SyncedRow { id: 1, version: 3, data: "x".into(), modified: true });
        s.rows.insert(2, SyncedRow { id: 2, version: 1, data: "y".into(), modified: false });
        s.add("fresh".into());

        let req = build_push_request(&s, TableFormat::Csv);
        assert_eq!(req.rows.row.len(), 1);
        assert_eq!(req.rows.row[0].id, 1);
        assert_eq!(req.rows.row[0].version, 4);
        assert_eq!(req.new_rows.row.len(), 1);
    }

    #[test]
    fn header_probe_is_submitted_unconditionally() {
        let mut s = store();
        s.rows.insert(0, SyncedRow { id: 0, version: 1, data: "Name,Age".into(), modified: false });
        let req = build_push_request(&s, TableFormat::Stbcsv);
        assert_eq!(req.rows.row.len(), 1);
        assert_eq!(req.rows.row[0].version, 1);
    }

    #[test]
    fn accepting_modification_clears_flag_and_bumps_version() {
        let mut s = store();
        s.rows.insert(1, SyncedRow { id: 1, version: 3, data: "x".into(), modified: true });
        let request = build_push_request(&s, TableFormat::Csv);
        s.pulled_version = 4;
        let response = PushResponse {
            result: PushResult::Ok,
            version: 5,
            conflict_count: 0,
            modified_rows: WireRowIds { row: vec![crate::wire::WireRowId { id: 1 }] },
            new_rows: WireRowIds::default(),
        };
        apply_push_response(&mut s, &request, &response, TableFormat::Csv).unwrap();
        assert!(!s.rows[&1].modified);
        assert_eq!(s.rows[&1].version, 4);
        assert_eq!(s.pulled_version, 5);
    }

    #[test]
    fn pending_rows_are_accepted_in_submission_order() {
        let mut s = store();
        s.add("first".into());
        s.add("second".into());
        let request = build_push_request(&s, TableFormat::Csv);
        let response = PushResponse {
            result: PushResult::Ok,
            version: 1,
            conflict_count: 0,
            modified_rows: WireRowIds::default(),
            new_rows: WireRowIds { row: vec![crate::wire::WireRowId { id: 0 }, crate::wire::WireRowId { id: 1 }] },
        };
        apply_push_response(&mut s, &request, &response, TableFormat::Csv).unwrap();
        assert!(s.new_rows.is_empty());
        assert_eq!(s.rows[&0].data, "first");
        assert_eq!(s.rows[&1].data, "second");
    }

    #[test]
    fn cursor_advance_skipped_when_another_client_pushed_between() {
        let mut s = store();
        s.rows.insert(1, SyncedRow { id: 1, version: 1, data: "x".into(), modified: true });
        let request = build_push_request(&s, TableFormat::Csv);
        s.pulled_version = 2; // stale: someone else already advanced past 3
        let response = PushResponse {
            result: PushResult::Ok,
            version: 5,
            conflict_count: 0,
            modified_rows: WireRowIds { row: vec![crate::wire::WireRowId { id: 1 }] },
            new_rows: WireRowIds::default(),
        };
        apply_push_response(&mut s, &request, &response, TableFormat::Csv).unwrap();
        assert_eq!(s.pulled_version, 2);
    }

    #[test]
    fn duplicate_id_across_modified_and_new_rows_raises_invariant() {
        let mut s = store();
        s.rows.insert(1, SyncedRow { id: 1, version: 1, data: "x".into(), modified: true });
        s.add("fresh".into());
        let request = build_push_request(&s, TableFormat::Csv);
        let response = PushResponse {
            result: PushResult::Ok,
            version: 1,
            conflict_count: 0,
            modified_rows: WireRowIds { row: vec![crate::wire::WireRowId { id: 1 }] },
            new_rows: WireRowIds { row: vec![crate::wire::WireRowId { id: 1 }] },
        };
        let err = apply_push_response(&mut s, &request, &response, TableFormat::Csv).unwrap_err();
        assert!(matches!(err, SyncError::Invariant(_)));
        assert!(s.rows[&1].modified, "invariant violation must not mutate the store");
        assert_eq!(s.new_rows.len(), 1);
    }

    #[test]
    fn format_conflict_result_raises_format_error() {
        let mut s = store();
        let request = build_push_request(&s, TableFormat::Csv);
        let response = PushResponse {
            result: PushResult::FormatConflict,
            version: 1,
            conflict_count: 0,
            modified_rows: WireRowIds::default(),
            new_rows: WireRowIds::default(),
        };
        let err = apply_push_response(&mut s, &request, &response, TableFormat::Csv).unwrap_err();
        assert!(matches!(err, SyncError::Format(_)));
    }
}
