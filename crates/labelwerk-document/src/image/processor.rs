// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, resample, region crop, and luma conversion for
// rendered label pages. Operates on in-memory images using the `image` crate.

use image::{DynamicImage, GrayImage, Luma};
use image::imageops::FilterType;
use labelwerk_core::error::LabelwerkError;
use labelwerk_core::types::OcrRegion;
use tracing::{debug, info, instrument};

/// Minimum side, in pixels, of a crop worth handing to OCR.
pub const MIN_CROP_SIDE: i64 = 10;

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let crop = ImageProcessor::open("page-001.png")?
///     .resample_dpi(300, 150)
///     .crop_region(&OcrRegion::TRACKING_NUMBER_DEFAULT)?
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, LabelwerkError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            LabelwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        debug!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Resample an image scanned at `from_dpi` so it reads as `to_dpi`.
    ///
    /// Equal resolutions are a no-op. Each side keeps at least one pixel.
    #[instrument(skip(self), fields(from_dpi, to_dpi))]
    pub fn resample_dpi(self, from_dpi: u32, to_dpi: u32) -> Self {
        if from_dpi == 0 || from_dpi == to_dpi {
            return self;
        }
        let factor = to_dpi as f64 / from_dpi as f64;
        let width = ((self.image.width() as f64 * factor).round() as u32).max(1);
        let height = ((self.image.height() as f64 * factor).round() as u32).max(1);
        debug!(width, height, "Resampling page");
        Self {
            image: self.image.resize_exact(width, height, FilterType::Triangle),
        }
    }

    /// Crop a relative region for recognition.
    ///
    /// The origin is clamped into the image and each side is widened to at
    /// least [`MIN_CROP_SIDE`] pixels, then clipped to the image edge. A crop
    /// that still ends up smaller than 10x10 is a validation error, as is a
    /// region with a non-positive extent or an origin outside `[0, 1)`.
    #[instrument(skip(self), fields(x = region.x, y = region.y, w = region.width, h = region.height))]
    pub fn crop_region(self, region: &OcrRegion) -> Result<Self, LabelwerkError> {
        region.validate()?;

        let img_w = self.image.width() as i64;
        let img_h = self.image.height() as i64;
        if img_w == 0 || img_h == 0 {
            return Err(LabelwerkError::Validation("cannot crop an empty image".into()));
        }

        let (x, y, w, h) = region.to_absolute(self.image.width(), self.image.height());
        let x = x.clamp(0, img_w - 1);
        let y = y.clamp(0, img_h - 1);
        let mut w = w.min(img_w - x).max(MIN_CROP_SIDE);
        let mut h = h.min(img_h - y).max(MIN_CROP_SIDE);
        if x + w > img_w || y + h > img_h {
            w = img_w - x;
            h = img_h - y;
        }

        if w < MIN_CROP_SIDE || h < MIN_CROP_SIDE {
            return Err(LabelwerkError::Validation(format!(
                "crop region too small to recognise: {w}x{h}px (minimum {MIN_CROP_SIDE}x{MIN_CROP_SIDE})"
            )));
        }

        info!(x, y, w, h, "Cropping region");
        let cropped = self
            .image
            .crop_imm(x as u32, y as u32, w as u32, h as u32);
        Ok(Self { image: cropped })
    }

    /// Convert to 8-bit luma using the `0.299 R + 0.587 G + 0.114 B` weights,
    /// truncating.
    pub fn weighted_luma(&self) -> GrayImage {
        let rgb = self.image.to_rgb8();
        GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            let gray = r as f64 * 0.299 + g as f64 * 0.587 + b as f64 * 0.114;
            Luma([gray as u8])
        })
    }
}
