use std::path::PathBuf;

/// Errors returned by dataset reads and writes.
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("field `{field}` contains a delimiter and cannot be stored: {value:?}")]
    MalformedRecord { field: &'static str, value: String },

    #[error("{}:{line}: malformed row: {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}: unexpected header {found:?}", path.display())]
    HeaderMismatch { path: PathBuf, found: String },

    #[error("capture recorded in {} but not in {}: {source}", written.display(), failed.display())]
    PartialWrite {
        written: PathBuf,
        failed: PathBuf,
        #[source]
        source: Box<DatasetError>,
    },
}
