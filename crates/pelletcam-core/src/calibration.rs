//! Aggregation of calibration clicks into a reusable sampling point.

use crate::coords::ImageCoordinate;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Errors returned by calibration aggregation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("no calibration observations available")]
    EmptyDataset,
}

/// One operator click on one reference photo, in image space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationObservation {
    pub image_path: PathBuf,
    pub point: ImageCoordinate,
}

impl CalibrationObservation {
    pub fn new(image_path: impl Into<PathBuf>, point: ImageCoordinate) -> Self {
        Self {
            image_path: image_path.into(),
            point,
        }
    }
}

/// The aggregated sampling point used for every capture of a session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplingModel {
    /// Integer-valued centroid of all observations.
    pub center: ImageCoordinate,
    /// Number of observations the centroid was computed from.
    pub observations: usize,
}

/// Centroid of all observation points, truncated towards zero per axis.
///
/// No weighting or outlier rejection; callers recompute from the full
/// observation history every time.
pub fn aggregate(observations: &[CalibrationObservation]) -> Result<SamplingModel, CalibrationError> {
    if observations.is_empty() {
        return Err(CalibrationError::EmptyDataset);
    }

    let sum = observations
        .iter()
        .fold(Vector2::<f64>::zeros(), |acc, o| acc + o.point.to_point().coords);
    let mean = sum / observations.len() as f64;

    let model = SamplingModel {
        center: ImageCoordinate::new(mean.x.trunc(), mean.y.trunc()),
        observations: observations.len(),
    };
    log::info!(
        "sampling model from {} observation(s): ({}, {})",
        model.observations,
        model.center.x,
        model.center.y
    );
    Ok(model)
}
