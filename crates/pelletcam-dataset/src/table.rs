use crate::error::DatasetError;
use crate::record::Record;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Header of the calibration table.
pub const CALIBRATION_HEADER: &str = "Image_Path, Clicked_X, Clicked_Y";

/// Header of the results table.
pub const RESULTS_HEADER: &str =
    "ID, Unic_number, Date, Red, Green, Blue, Ref. Red,Ref. Green,Ref. Blue";

const DELIMITER: char = ',';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    Calibration,
    Results,
}

impl TableKind {
    pub fn header(self) -> &'static str {
        match self {
            TableKind::Calibration => CALIBRATION_HEADER,
            TableKind::Results => RESULTS_HEADER,
        }
    }
}

/// Join the fields of `record` into one row, without a trailing newline.
pub fn shape_row<R: Record>(record: &R) -> Result<String, DatasetError> {
    let fields = record.fields();
    for (name, value) in R::FIELD_NAMES.iter().copied().zip(&fields) {
        if value.contains([DELIMITER, '\n', '\r']) {
            return Err(DatasetError::MalformedRecord {
                field: name,
                value: value.clone(),
            });
        }
    }
    Ok(fields.join(","))
}

/// Append one row for `record` to the table at `path`.
///
/// A missing or empty table is created with the header of `R::KIND` first;
/// an existing table is never given a second header.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(path = %path.display())))]
pub fn append<R: Record>(path: &Path, record: &R) -> Result<(), DatasetError> {
    let row = shape_row(record)?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut out = String::with_capacity(row.len() + 128);
    if file.metadata()?.len() == 0 {
        log::info!("creating {:?} table at {}", R::KIND, path.display());
        out.push_str(R::KIND.header());
        out.push('\n');
    }
    out.push_str(&row);
    out.push('\n');
    file.write_all(out.as_bytes())?;
    file.flush()?;

    log::debug!("appended to {}: {}", path.display(), row);
    Ok(())
}
