//! Client local store (`spec.md` §4.3): a persistent document holding
//! repository coordinates, `pulled_version`, and three row containers.
//!
//! Design Notes item 1 is implemented here directly: the in-memory
//! model ([`LocalStore`]) is a typed struct with its own containers, not
//! a mutable XML tree. Serialization to/from the chosen on-disk format
//! (an XML document, per `spec.md` §6's local-store layout) is confined
//! to the private `xml` DTOs at the bottom of this file and never leaks
//! into the rest of the crate.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoords {
    pub url: String,
    pub realm: String,
    pub username: String,
    pub password: String,
}

/// A row mirroring a server row by id. `modified` is set once local
/// `data` has diverged from the data last received at `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedRow {
    pub id: i64,
    pub version: i64,
    pub data: String,
    pub modified: bool,
}

/// The server's competing version of a row the client has also
/// modified since the common ancestor version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRow {
    pub id: i64,
    pub version: i64,
    pub data: String,
}

/// A client-side row with no server id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRow {
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    pub repository: RepositoryCoords,
    pub pulled_version: i64,
    pub rows: BTreeMap<i64, SyncedRow>,
    pub conflict_rows: BTreeMap<i64, ConflictRow>,
    pub new_rows: Vec<PendingRow>,
    /// Set once `CsvView::reader()` has snapshotted this store in the
    /// current process. Not persisted: a freshly loaded store always
    /// starts with this clear. `column::add_column` refuses to run once
    /// it's set, since a column insertion bypasses the snapshot a
    /// `CsvView` in flight is relying on.
    pub reader_taken: bool,
}

impl LocalStore {
    /// A fresh local store, as created before the first pull. The three
    /// containers are "auto-created" in the sense that they start empty
    /// rather than requiring the caller to populate them up front.
    pub fn new(repository: RepositoryCoords) -> Self {
        Self {
            repository,
            pulled_version: 0,
            rows: BTreeMap::new(),
            conflict_rows: BTreeMap::new(),
            new_rows: Vec::new(),
            reader_taken: false,
        }
    }

    pub fn load(path: &Path) -> Result<Self, SyncError> {
        debug!("loading local store from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let doc: xml::Document = quick_xml::de::from_str(&text)?;
        Ok(doc.into_local_store())
    }

    pub fn load_or_create(path: &Path, repository: RepositoryCoords) -> Result<Self, SyncError> {
        if path.exists() { Self::load(path) } else { Ok(Self::new(repository)) }
    }

    /// Write to a temp sibling, then atomically rename over `path`,
    /// preserving one prior version as a `.bak` sibling.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let doc = xml::Document::from_local_store(self);
        let text = quick_xml::se::to_string(&doc)?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;

        if path.exists() {
            let backup = backup_path(path);
            std::fs::rename(path, &backup)?;
            debug!("kept backup at {}", backup.display());
        }
        tmp.persist(path).map_err(|e| SyncError::Io(e.error))?;
        info!("saved local store to {}", path.display());
        Ok(())
    }

    /// Keyed mutation (Design Notes item 2): update the synced row at
    /// `id` to `data`, marking it modified iff the text actually
    /// changed. Used by the CSV façade's writer and by direct callers.
    pub fn update(&mut self, id: i64, data: String) {
        if let Some(row) = self.rows.get_mut(&id) {
            if row.data != data {
                row.data = data;
                row.modified = true;
            }
        }
    }

    /// Keyed mutation: append a new pending-new row.
    pub fn add(&mut self, data: String) {
        self.new_rows.push(PendingRow { data });
    }
}

fn backup_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// On-disk XML shape, kept private so the wire-unrelated in-memory
/// model never needs to know about attribute/text-content quirks.
mod xml {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename = "local_store")]
    pub struct Document {
        pub repository: Repository,
        pub pulled_version: i64,
        pub rows: RowContainer,
        pub conflict_rows: RowContainer,
        pub new_rows: NewRowContainer,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Repository {
        pub url: String,
        pub realm: String,
        pub username: String,
        pub password: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct RowContainer {
        #[serde(rename = "row", default)]
        pub row: Vec<Row>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Row {
        #[serde(rename = "@id")]
        pub id: i64,
        #[serde(rename = "@version")]
        pub version: i64,
        #[serde(rename = "@modified", skip_serializing_if = "Option::is_none", default)]
        pub modified: Option<String>,
        #[serde(rename = "$text", default)]
        pub data: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct NewRowContainer {
        #[serde(rename = "row", default)]
        pub row: Vec<NewRow>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct NewRow {
        #[serde(rename = "$text", default)]
        pub data: String,
    }

    impl Document {
        pub fn into_local_store(self) -> LocalStore {
            let rows = self
                .rows
                .row
                .into_iter()
                .map(|r| (r.id, SyncedRow { id: r.id, version: r.version, data: r.data, modified: r.modified.is_some() }))
                .collect();
            let conflict_rows = self
                .conflict_rows
                .row
                .into_iter()
                .map(|r| (r.id, ConflictRow { id: r.id, version: r.version, data: r.data }))
                .collect();
            let new_rows = self.new_rows.row.into_iter().map(|r| PendingRow { data: r.data }).collect();
            LocalStore {
                repository: RepositoryCoords {
                    url: self.repository.url,
                    realm: self.repository.realm,
                    username: self.repository.username,
                    password: self.repository.password,
                },
                pulled_version: self.pulled_version,
                rows,
                conflict_rows,
                new_rows,
                reader_taken: false,
            }
        }

        pub fn from_local_store(store: &LocalStore) -> Self {
            Document {
                repository: Repository {
                    url: store.repository.url.clone(),
                    realm: store.repository.realm.clone(),
                    username: store.repository.username.clone(),
                    password: store.repository.password.clone(),
                },
                pulled_version: store.pulled_version,
                rows: RowContainer {
                    row: store
                        .rows
                        .values()
                        .map(|r| Row {
                            id: r.id,
                            version: r.version,
                            modified: r.modified.then(|| "1".to_string()),
                            data: r.data.clone(),
                        })
                        .collect(),
                },
                conflict_rows: RowContainer {
                    row: store
                        .conflict_rows
                        .values()
                        .map(|r| Row { id: r.id, version: r.version, modified: None, data: r.data.clone() })
                        .collect(),
                },
                new_rows: NewRowContainer {
                    row: store.new_rows.iter().map(|r| NewRow { data: r.data.clone() }).collect(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> RepositoryCoords {
        RepositoryCoords {
            url: "https://example.test/tables/trips".into(),
            realm: "shared-tables".into(),
            username: "alice".into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.xml");

        let mut store = LocalStore::new(coords());
        store.rows.insert(0, SyncedRow { id: 0, version: 1, data: "Name,Age".into(), modified: false });
        store.rows.insert(1, SyncedRow { id: 1, version: 2, data: "Ivan,30".into(), modified: true });
        store.conflict_rows.insert(1, ConflictRow { id: 1, version: 3, data: "Ivan,31".into() });
        store.new_rows.push(PendingRow { data: "Maria,25".into() });
        store.pulled_version = 7;
        store.save(&path).unwrap();

        let loaded = LocalStore::load(&path).unwrap();
        assert_eq!(loaded.pulled_version, 7);
        assert_eq!(loaded.rows.len(), 2);
        assert!(loaded.rows[&1].modified);
        assert!(!loaded.rows[&0].modified);
        assert_eq!(loaded.conflict_rows[&1].version, 3);
        assert_eq!(loaded.new_rows[0].data, "Maria,25");
        assert_eq!(loaded.repository.username, "alice");
    }

    #[test]
    fn save_keeps_one_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.xml");

        let mut store = LocalStore::new(coords());
        store.save(&path).unwrap();
        store.pulled_version = 1;
        store.save(&path).unwrap();

        assert!(path.exists());
        assert!(backup_path(&path).exists());
    }

    #[test]
    fn update_marks_modified_only_on_real_change() {
        let mut store = LocalStore::new(coords());
        store.rows.insert(5, SyncedRow { id: 5, version: 1, data: "x".into(), modified: false });
        store.update(5, "x".into());
        assert!(!store.rows[&5].modified);
        store.update(5, "y".into());
        assert!(store.rows[&5].modified);
    }
}
