//! Client-side shared table (`spec.md` §4). Ties the local store, the
//! merge engine, and the CSV façade together behind a small pull/push
//! API, generalizing the teacher crate's closure-driven
//! `SyncClient::sync_cycle` to this spec's request/response shapes.
//! Transport itself (HTTP, auth) stays an external collaborator: callers
//! supply it as closures rather than this module reaching for a client.

pub mod column;
pub mod csv_view;
pub mod local_store;
pub mod merge;
pub mod push;

use std::path::Path;

use crate::error::SyncError;
use crate::server::TableFormat;
use crate::wire::{PullRequest, PullRequestKind, PullResponse, PushRequest, PushResponse};

pub use csv_view::{ConflictHandle, CsvView};
pub use local_store::{ConflictRow, LocalStore, PendingRow, RepositoryCoords, SyncedRow};

pub struct SharedTable {
    pub store: LocalStore,
    format: TableFormat,
}

impl SharedTable {
    pub fn new(store: LocalStore, format: TableFormat) -> Self {
        Self { store, format }
    }

    pub fn load_or_create(path: &Path, repository: RepositoryCoords, format: TableFormat) -> Result<Self, SyncError> {
        Ok(Self::new(LocalStore::load_or_create(path, repository)?, format))
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        self.store.save(path)
    }

    /// Fetch and merge one batch of upstream changes. Returns
    /// `(changes, conflicts)` from the merge, per `spec.md` §4.4.
    pub fn pull<F>(&mut self, transport: F) -> Result<(usize, usize), SyncError>
    where
        F: FnOnce(PullRequest) -> Result<PullResponse, SyncError>,
    {
        let request = PullRequest { kind: PullRequestKind::Pull, pulled_version: self.store.pulled_version };
        let response = transport(request)?;
        merge::merge_pull(&mut self.store, &response, self.format)
    }

    /// Submit local modifications and pending-new rows. A no-op if there
    /// is nothing to submit (no unconditional header probe in play).
    pub fn push<F>(&mut self, transport: F) -> Result<(), SyncError>
    where
        F: FnOnce(PushRequest) -> Result<PushResponse, SyncError>,
    {
        let request = push::build_push_request(&self.store, self.format);
        if request.is_empty() {
            return Ok(());
        }
        let response = transport(request.clone())?;
        push::apply_push_response(&mut self.store, &request, &response, self.format)
    }

    /// A read/write view over the rows as an ordered CSV stream, per
    /// `spec.md` §4.6.
    pub fn csv(&mut self) -> CsvView<'_> {
        CsvView::new(&mut self.store, self.format)
    }

    /// Insert a column after `col_after`, named `col_new`, across every
    /// row container. Must run before the next `csv()` use.
    pub fn add_column(&mut self, col_after: &str, col_new: &str) -> Result<(), SyncError> {
        column::add_column(&mut self.store, col_after, col_new)
    }
}
