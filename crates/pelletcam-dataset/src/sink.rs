use crate::error::DatasetError;
use crate::record::CaptureRecord;
use crate::table::append;
use std::path::{Path, PathBuf};

/// The two results tables every capture is written to: the master table
/// shared across experiments and the per-session table next to the photos.
///
/// Writes are not transactional. If the master write succeeds and the
/// session write fails, `PartialWrite` is returned and the master row stays.
#[derive(Clone, Debug)]
pub struct ResultsSink {
    master: PathBuf,
    session: PathBuf,
}

impl ResultsSink {
    pub fn new(master: impl Into<PathBuf>, session: impl Into<PathBuf>) -> Self {
        Self {
            master: master.into(),
            session: session.into(),
        }
    }

    pub fn master(&self) -> &Path {
        &self.master
    }

    pub fn session(&self) -> &Path {
        &self.session
    }

    pub fn append(&self, record: &CaptureRecord) -> Result<(), DatasetError> {
        append(&self.master, record)?;
        if self.session == self.master {
            return Ok(());
        }
        append(&self.session, record).map_err(|e| DatasetError::PartialWrite {
            written: self.master.clone(),
            failed: self.session.clone(),
            source: Box::new(e),
        })
    }
}
