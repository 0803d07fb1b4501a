//! Append-only tables for pelletcam sessions.
//!
//! Two table kinds exist:
//! - the calibration table (`Image_Path, Clicked_X, Clicked_Y`), one row per
//!   operator click on a reference photo;
//! - the results table, one row per tagged capture with its sampled color and
//!   the session's reference color.
//!
//! Rows are plain comma-separated text without quoting. Field values that
//! contain the delimiter are rejected instead of being escaped.

mod error;
mod reader;
mod record;
mod sink;
mod table;

pub use error::DatasetError;
pub use reader::read_calibration;
pub use record::{CaptureRecord, Record, DATE_FORMAT};
pub use sink::ResultsSink;
pub use table::{append, shape_row, TableKind, CALIBRATION_HEADER, RESULTS_HEADER};
