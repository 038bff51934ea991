//! Wire protocol documents (`spec.md` §6).
//!
//! These are plain `serde`-derived structs; the actual XML encode/decode
//! is an external collaborator (`quick-xml`) the core merely drives. No
//! hand-rolled XML parsing lives here.

use serde::{Deserialize, Serialize};

/// One row as it appears on the wire, in either a pull response or a
/// push request's `<rows>` container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRow {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(rename = "@version")]
    pub version: i64,
    #[serde(rename = "$text", default)]
    pub data: String,
}

/// A row id bare reference, used in push responses' `modified_rows` /
/// `new_rows` containers where only the id is echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRowId {
    #[serde(rename = "@id")]
    pub id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireRows {
    #[serde(rename = "row", default)]
    pub row: Vec<WireRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireRowIds {
    #[serde(rename = "row", default)]
    pub row: Vec<WireRowId>,
}

/// A row submitted as brand new (no id yet), `<new_rows><row>DATA</row>...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireNewRow {
    #[serde(rename = "$text", default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireNewRows {
    #[serde(rename = "row", default)]
    pub row: Vec<WireNewRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "request")]
pub struct PullRequest {
    #[serde(rename = "type")]
    pub kind: PullRequestKind,
    pub pulled_version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PullRequestKind {
    #[serde(rename = "pull")]
    Pull,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "request")]
pub struct PushRequest {
    #[serde(rename = "type")]
    pub kind: PushRequestKind,
    pub rows: WireRows,
    pub new_rows: WireNewRows,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PushRequestKind {
    #[serde(rename = "push")]
    Push,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "response")]
pub struct PullResponse {
    pub version: i64,
    pub rows: WireRows,
}

/// `result` element of a push response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushResult {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FORMAT_CONFLICT")]
    FormatConflict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "response")]
pub struct PushResponse {
    pub result: PushResult,
    pub version: i64,
    pub conflict_count: i64,
    pub modified_rows: WireRowIds,
    pub new_rows: WireRowIds,
}

impl PushRequest {
    pub fn is_empty(&self) -> bool {
        self.rows.row.is_empty() && self.new_rows.row.is_empty()
    }
}
