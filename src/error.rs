use thiserror::Error;

/// Client-facing error. Recoverable: the caller may retry `pull`/`push`
/// after fixing whatever this describes.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned an empty response")]
    EmptyResponse,

    #[error("push rejected by server: {0}")]
    NonOkResult(String),

    #[error("malformed server response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("xml (read): {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("xml (write): {0}")]
    XmlWrite(#[from] quick_xml::SeError),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A store invariant was violated: this indicates a protocol break
    /// (duplicate ids in a response, `submitted != accepted + conflicts`,
    /// an id=0 row pulled at version > 1 in `stbcsv`). The operation
    /// aborts without mutating local state.
    #[error("invariant violation: {0}")]
    Invariant(&'static str),
}

/// Format conflicts on the distinguished header row (id = 0, `stbcsv`
/// tables only). A subclass of [`SyncError`] per the spec; represented
/// here as a nested enum with a blanket `From` so `?` still composes.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("local header {local:?} does not match server header {remote:?}")]
    HeaderMismatch { local: String, remote: String },

    #[error("server rejected push: header format conflict")]
    ServerFormatConflict,
}
