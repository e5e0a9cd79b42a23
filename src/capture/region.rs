//! Pure region logic: the functional core.
//!
//! This module has zero infrastructure dependencies.
//! It validates capture requests and crops pixel data to a rectangle.

use image::{imageops, RgbImage};
use serde::Deserialize;
use std::fmt;

/// Smallest accepted width/height for a capture region, in pixels.
pub const MIN_REGION_SIZE: u32 = 64;

/// A rectangle of the primary display, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}

/// Body of a start request. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RegionRequest {
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub w: Option<i64>,
    pub h: Option<i64>,
}

impl RegionRequest {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            w: Some(w),
            h: Some(h),
        }
    }

    /// Apply defaults, validate, and normalize.
    ///
    /// Missing offsets default to 0 and missing sizes to the screen bounds.
    /// Returns `Ok(None)` when the request covers exactly the default full
    /// screen, `Ok(Some(region))` for a custom rectangle.
    pub fn resolve(&self, screen_width: u32, screen_height: u32) -> Result<Option<Region>, ControlError> {
        let x = self.x.unwrap_or(0);
        let y = self.y.unwrap_or(0);
        let w = self.w.unwrap_or(i64::from(screen_width));
        let h = self.h.unwrap_or(i64::from(screen_height));

        let min = i64::from(MIN_REGION_SIZE);
        if w < min || h < min {
            return Err(ControlError::RegionTooSmall {
                width: w,
                height: h,
            });
        }

        let region = Region {
            x: i32::try_from(x).map_err(|_| ControlError::RegionOutOfRange { x, y, w, h })?,
            y: i32::try_from(y).map_err(|_| ControlError::RegionOutOfRange { x, y, w, h })?,
            width: u32::try_from(w).map_err(|_| ControlError::RegionOutOfRange { x, y, w, h })?,
            height: u32::try_from(h).map_err(|_| ControlError::RegionOutOfRange { x, y, w, h })?,
        };

        let is_full_screen = region.x == 0
            && region.y == 0
            && region.width == screen_width
            && region.height == screen_height;

        Ok(if is_full_screen { None } else { Some(region) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("Region too small: {width}x{height} (minimum {min}x{min})", min = MIN_REGION_SIZE)]
    RegionTooSmall { width: i64, height: i64 },

    #[error("Region ({x},{y},{w},{h}) does not fit in screen coordinates")]
    RegionOutOfRange { x: i64, y: i64, w: i64, h: i64 },
}

/// Crops a full-screen image to `region`.
///
/// The region is relative to the image's top-left corner.
pub fn crop(image: &RgbImage, region: &Region) -> Result<RgbImage, CropError> {
    let (img_width, img_height) = image.dimensions();

    let fits = region.x >= 0
        && region.y >= 0
        && (region.x as u64) + u64::from(region.width) <= u64::from(img_width)
        && (region.y as u64) + u64::from(region.height) <= u64::from(img_height);

    if !fits {
        return Err(CropError::OutOfBounds {
            requested: *region,
            image_size: (img_width, img_height),
        });
    }

    Ok(imageops::crop_imm(
        image,
        region.x as u32,
        region.y as u32,
        region.width,
        region.height,
    )
    .to_image())
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error(
        "Crop rectangle {} exceeds image bounds ({}x{})",
        requested, image_size.0, image_size.1
    )]
    OutOfBounds {
        requested: Region,
        image_size: (u32, u32),
    },
}
