use crate::table::TableKind;
use chrono::{Local, NaiveDateTime};
use pelletcam_core::{CalibrationObservation, MedianColor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `DD-MM-YYYY HH:MM`, as written in the results table.
pub const DATE_FORMAT: &str = "%d-%m-%Y %H:%M";

/// A value that can be stored as one row of a table.
pub trait Record {
    const KIND: TableKind;
    const FIELD_NAMES: &'static [&'static str];

    /// Field values in column order.
    fn fields(&self) -> Vec<String>;
}

impl Record for CalibrationObservation {
    const KIND: TableKind = TableKind::Calibration;
    const FIELD_NAMES: &'static [&'static str] = &["image_path", "x", "y"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.image_path.display().to_string(),
            self.point.x.to_string(),
            self.point.y.to_string(),
        ]
    }
}

/// Result of one tagged capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub tag: String,
    pub image_path: PathBuf,
    pub timestamp: NaiveDateTime,
    pub color: MedianColor,
    pub reference: MedianColor,
}

impl CaptureRecord {
    /// Build a record stamped with the current local time.
    pub fn now(
        tag: impl Into<String>,
        image_path: impl Into<PathBuf>,
        color: MedianColor,
        reference: MedianColor,
    ) -> Self {
        Self {
            tag: tag.into(),
            image_path: image_path.into(),
            timestamp: Local::now().naive_local(),
            color,
            reference,
        }
    }
}

impl Record for CaptureRecord {
    const KIND: TableKind = TableKind::Results;
    const FIELD_NAMES: &'static [&'static str] = &[
        "tag",
        "image_path",
        "date",
        "red",
        "green",
        "blue",
        "ref_red",
        "ref_green",
        "ref_blue",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.tag.clone(),
            self.image_path.display().to_string(),
            self.timestamp.format(DATE_FORMAT).to_string(),
            self.color.r.to_string(),
            self.color.g.to_string(),
            self.color.b.to_string(),
            self.reference.r.to_string(),
            self.reference.g.to_string(),
            self.reference.b.to_string(),
        ]
    }
}
