//! Display space to image space mapping.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Size of the fixed canvas a reference photo is shown on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Pixel position of an operator click, relative to the display canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayClick {
    pub x: f64,
    pub y: f64,
}

impl DisplayClick {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pixel position in the true resolution of a specific image.
///
/// Kept as floating point; integer truncation happens only when a sampling
/// box is derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageCoordinate {
    pub x: f64,
    pub y: f64,
}

impl ImageCoordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_point(self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn from_point(p: Point2<f64>) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Rescale a display click into the coordinate space of a `image_width` x
/// `image_height` image.
///
/// Each axis is scaled independently, no aspect-ratio correction is applied.
/// `display` must have non-zero dimensions.
pub fn map_click(
    click: DisplayClick,
    display: DisplaySize,
    image_width: u32,
    image_height: u32,
) -> ImageCoordinate {
    debug_assert!(display.width > 0 && display.height > 0);
    let scale = Vector2::new(
        image_width as f64 / display.width as f64,
        image_height as f64 / display.height as f64,
    );
    let p = Point2::new(click.x, click.y);
    ImageCoordinate::from_point(Point2::from(p.coords.component_mul(&scale)))
}
