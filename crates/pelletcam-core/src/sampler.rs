//! Region-of-interest extraction and per-channel median color.
//!
//! The sampling box around a center `(cx, cy)` with side `box_size` is
//! `[cx - h, cx + h) x [cy - h, cy + h)` where `cx`, `cy` are the floored
//! center coordinates and `h = box_size / 2` (integer division). The box is
//! therefore `box_size` wide only for even sizes. Any `box_size >= 1` covers at
//! least the center pixel, so a size of 1 samples `[cx, cx + 1)`. Bounds are
//! clamped to the image extent, so a center near or beyond an edge yields a
//! smaller (possibly empty) box instead of reading outside the image.

use crate::coords::ImageCoordinate;
use image::{imageops, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors returned by the region sampler.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error(
        "empty sampling region around ({x:.1}, {y:.1}) with box size {box_size} in a {width}x{height} image"
    )]
    EmptyRegion {
        x: f64,
        y: f64,
        box_size: u32,
        width: u32,
        height: u32,
    },
}

/// Half-open pixel box `[x0, x1) x [y0, y1)` inside an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Copy the pixels covered by this region out of `image`.
    pub fn crop(&self, image: &RgbImage) -> RgbImage {
        imageops::crop_imm(image, self.x0, self.y0, self.width(), self.height()).to_image()
    }
}

/// Representative color of a region: the median of each channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MedianColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl MedianColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgb(self) -> Rgb<u8> {
        Rgb([self.r, self.g, self.b])
    }
}

impl fmt::Display for MedianColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Result of sampling one image at one point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionSample {
    pub center: ImageCoordinate,
    pub region: Region,
    pub color: MedianColor,
}

/// Compute the clamped sampling box for `center` in a `width` x `height` image.
pub fn region_bounds(center: ImageCoordinate, box_size: u32, width: u32, height: u32) -> Region {
    let half = i64::from(box_size / 2);
    let cx = center.x.floor() as i64;
    let cy = center.y.floor() as i64;
    let clamp_x = |v: i64| v.clamp(0, i64::from(width)) as u32;
    let clamp_y = |v: i64| v.clamp(0, i64::from(height)) as u32;
    let min_extent = i64::from(box_size > 0);
    Region {
        x0: clamp_x(cx - half),
        y0: clamp_y(cy - half),
        x1: clamp_x((cx + half).max(cx + min_extent)),
        y1: clamp_y((cy + half).max(cy + min_extent)),
    }
}

/// Median of each channel over every pixel of `region`.
///
/// For an even pixel count the lower of the two middle values is used, so the
/// result always is a value that occurs in the region. Returns `None` for an
/// empty region.
pub fn median_color(image: &RgbImage, region: &Region) -> Option<MedianColor> {
    let n = region.pixel_count();
    if n == 0 {
        return None;
    }

    let mut channels = [
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    ];
    for y in region.y0..region.y1 {
        for x in region.x0..region.x1 {
            let Rgb(px) = *image.get_pixel(x, y);
            for (c, v) in channels.iter_mut().zip(px) {
                c.push(v);
            }
        }
    }

    let mid = (n - 1) / 2;
    let [r, g, b] = channels.map(|mut c| *c.select_nth_unstable(mid).1);
    Some(MedianColor { r, g, b })
}

/// Sample `image` around `center` and reduce the region to its median color.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(image), fields(width = image.width(), height = image.height()))
)]
pub fn sample(
    image: &RgbImage,
    center: ImageCoordinate,
    box_size: u32,
) -> Result<RegionSample, SampleError> {
    let (width, height) = image.dimensions();
    let region = region_bounds(center, box_size, width, height);
    let color = median_color(image, &region).ok_or(SampleError::EmptyRegion {
        x: center.x,
        y: center.y,
        box_size,
        width,
        height,
    })?;

    log::debug!(
        "sampled {}x{} px at ({:.1}, {:.1}) -> {}",
        region.width(),
        region.height(),
        center.x,
        center.y,
        color
    );

    Ok(RegionSample {
        center,
        region,
        color,
    })
}

/// Solid `side` x `side` image filled with `color`, used as a visual audit swatch.
pub fn solid_swatch(color: MedianColor, side: u32) -> RgbImage {
    RgbImage::from_pixel(side, side, color.to_rgb())
}
