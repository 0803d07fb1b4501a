//! Core types and algorithms for pellet color measurement.
//!
//! This crate is intentionally small and free of any device or file-format
//! concerns. It covers three steps:
//! - mapping an operator click from display space into image space,
//! - sampling a square region of interest and reducing it to a median color,
//! - aggregating calibration observations into a single sampling point.

mod calibration;
mod coords;
mod logger;
mod sampler;

pub use calibration::{aggregate, CalibrationError, CalibrationObservation, SamplingModel};
pub use coords::{map_click, DisplayClick, DisplaySize, ImageCoordinate};
pub use sampler::{
    median_color, region_bounds, sample, solid_swatch, MedianColor, Region, RegionSample,
    SampleError,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
