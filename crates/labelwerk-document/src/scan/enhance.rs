// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR preprocessing: global Otsu binarisation of a cropped label region, with
// a fallback to the untouched crop when binarisation wipes out the content.

use image::{DynamicImage, GrayImage, Luma};
use tracing::{debug, instrument, warn};

use crate::image::processor::ImageProcessor;

/// Crops smaller than this (either side) are passed to OCR untouched.
pub const MIN_PREPROCESS_SIDE: u32 = 50;

/// A binarised image with more than this share of one colour is rejected.
pub const MAX_UNIFORM_RATIO: f64 = 0.98;

/// What preprocessing produced.
#[derive(Debug, Clone)]
pub enum Preprocessed {
    /// Otsu-binarised crop.
    Binarized { image: GrayImage, threshold: u8 },
    /// The crop was too small or binarised to a near-uniform image.
    Original,
}

/// Prepares cropped label regions for OCR.
pub struct ScanEnhancer {
    image: DynamicImage,
}

impl ScanEnhancer {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Binarise with a global Otsu threshold: `gray > t` becomes white, the
    /// rest black.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn binarize_otsu(&self) -> Preprocessed {
        let (width, height) = (self.image.width(), self.image.height());
        if width < MIN_PREPROCESS_SIDE || height < MIN_PREPROCESS_SIDE {
            debug!("Region too small, skipping preprocessing");
            return Preprocessed::Original;
        }

        let gray = ImageProcessor::from_dynamic(self.image.clone()).weighted_luma();
        let threshold = otsu_threshold(&luma_histogram(&gray));
        debug!(threshold, "Otsu threshold computed");

        let mut white: u64 = 0;
        let mut output = GrayImage::new(width, height);
        for (x, y, pixel) in gray.enumerate_pixels() {
            let value = if pixel.0[0] > threshold {
                white += 1;
                255u8
            } else {
                0u8
            };
            output.put_pixel(x, y, Luma([value]));
        }

        let total = width as u64 * height as u64;
        let white_ratio = white as f64 / total as f64;
        let black_ratio = (total - white) as f64 / total as f64;
        if white_ratio > MAX_UNIFORM_RATIO || black_ratio > MAX_UNIFORM_RATIO {
            warn!(white_ratio, black_ratio, "Binarised region is near-uniform, using original");
            return Preprocessed::Original;
        }

        Preprocessed::Binarized {
            image: output,
            threshold,
        }
    }

    /// The image OCR should see first: the binarised crop if usable, otherwise
    /// the original.
    pub fn preprocess_for_ocr(&self) -> DynamicImage {
        match self.binarize_otsu() {
            Preprocessed::Binarized { image, .. } => DynamicImage::ImageLuma8(image),
            Preprocessed::Original => self.image.clone(),
        }
    }
}

/// 256-bin histogram of a luma image.
pub fn luma_histogram(gray: &GrayImage) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    histogram
}

/// Otsu threshold of a histogram: the level maximising the between-class
/// variance `wB * wF * (mB - mF)^2`. Ties keep the lowest level.
pub fn otsu_threshold(histogram: &[u64; 256]) -> u8 {
    let total_pixels: u64 = histogram.iter().sum();
    if total_pixels == 0 {
        return 128;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone(width: u32, height: u32, dark_rows: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |_, y| {
            if y < dark_rows { Luma([20]) } else { Luma([220]) }
        }))
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let mut histogram = [0u64; 256];
        histogram[20] = 1000;
        histogram[220] = 1000;
        let t = otsu_threshold(&histogram);
        assert!((20..220).contains(&t), "threshold {t} outside [20, 220)");
    }

    #[test]
    fn otsu_of_empty_histogram_is_midpoint() {
        assert_eq!(otsu_threshold(&[0u64; 256]), 128);
    }

    #[test]
    fn binarize_maps_tones_to_black_and_white() {
        let enhancer = ScanEnhancer::from_dynamic(two_tone(60, 60, 30));
        match enhancer.binarize_otsu() {
            Preprocessed::Binarized { image, threshold } => {
                // Weighted luma may land a level below the source tone.
                assert!((19..219).contains(&threshold), "threshold {threshold}");
                assert_eq!(image.get_pixel(0, 0).0[0], 0);
                assert_eq!(image.get_pixel(0, 59).0[0], 255);
            }
            Preprocessed::Original => panic!("expected binarised output"),
        }
    }

    #[test]
    fn small_regions_skip_preprocessing() {
        let enhancer = ScanEnhancer::from_dynamic(two_tone(49, 80, 40));
        assert!(matches!(enhancer.binarize_otsu(), Preprocessed::Original));
    }

    #[test]
    fn near_uniform_result_falls_back() {
        // One dark row in a hundred: 99% white after binarisation.
        let enhancer = ScanEnhancer::from_dynamic(two_tone(100, 100, 1));
        assert!(matches!(enhancer.binarize_otsu(), Preprocessed::Original));
        let out = enhancer.preprocess_for_ocr();
        assert_eq!(out.as_luma8().expect("luma").get_pixel(0, 50).0[0], 220);
        assert_eq!(enhancer.as_dynamic().width(), 100);
    }
}
