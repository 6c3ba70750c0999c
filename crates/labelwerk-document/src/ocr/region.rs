// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region OCR: crop a configured rectangle out of a label page, preprocess it,
// recognise it, and extract a structured field.

use image::DynamicImage;
use labelwerk_core::config::{AppConfig, OcrSettings};
use labelwerk_core::error::Result;
use labelwerk_core::types::{OcrRegion, RecognizedField};
use tracing::{debug, info, instrument, warn};

use super::fields::{extract_package_count, extract_tracking_number};
use super::{RecognitionRequest, TextRecognizer};
use crate::image::processor::ImageProcessor;
use crate::scan::enhance::ScanEnhancer;

/// Extracts tracking numbers and package counts from label pages.
pub struct RegionOcrExtractor<R> {
    recognizer: R,
    tracking_number_region: OcrRegion,
    package_count_region: OcrRegion,
    settings: OcrSettings,
}

impl<R: TextRecognizer> RegionOcrExtractor<R> {
    /// Build an extractor using the regions and OCR settings of `config`.
    pub fn new(recognizer: R, config: &AppConfig) -> Self {
        Self {
            recognizer,
            tracking_number_region: config.tracking_number_region,
            package_count_region: config.package_count_region,
            settings: config.ocr.clone(),
        }
    }

    pub fn set_tracking_number_region(&mut self, region: OcrRegion) {
        self.tracking_number_region = region;
    }

    pub fn set_package_count_region(&mut self, region: OcrRegion) {
        self.package_count_region = region;
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Recognise the text inside `region` of `image`.
    ///
    /// The binarised crop is tried first; if that yields nothing (or the
    /// engine fails) the raw crop is tried once more. Engine failures on the
    /// retry are logged and read as empty text. Only an unusable region is an
    /// error.
    #[instrument(skip(self, image), fields(language = request.language))]
    pub fn recognize_region(
        &self,
        image: &DynamicImage,
        region: &OcrRegion,
        request: &RecognitionRequest<'_>,
    ) -> Result<String> {
        let crop = ImageProcessor::from_dynamic(image.clone())
            .crop_region(region)?
            .into_dynamic();
        let enhancer = ScanEnhancer::from_dynamic(crop);

        let preprocessed = enhancer.preprocess_for_ocr();
        let first = match self.recognizer.recognize(&preprocessed, request) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Recognition of preprocessed crop failed, retrying raw");
                String::new()
            }
        };
        if !first.trim().is_empty() {
            debug!(text = %first.trim(), "Recognised from preprocessed crop");
            return Ok(first.trim().to_string());
        }

        match self.recognizer.recognize(enhancer.as_dynamic(), request) {
            Ok(text) => {
                debug!(text = %text.trim(), "Recognised from raw crop");
                Ok(text.trim().to_string())
            }
            Err(err) => {
                warn!(error = %err, "Recognition failed, treating as empty");
                Ok(String::new())
            }
        }
    }

    /// Read the tracking number from the configured region.
    #[instrument(skip_all)]
    pub fn recognize_tracking_number(&self, image: &DynamicImage) -> RecognizedField {
        let request = RecognitionRequest::new(&self.settings.tracking_language);
        self.recognize_field(
            image,
            &self.tracking_number_region,
            &request,
            extract_tracking_number,
        )
    }

    /// Read the package count from the configured region, normalised to
    /// `"<n>件"`.
    #[instrument(skip_all)]
    pub fn recognize_package_count(&self, image: &DynamicImage) -> RecognizedField {
        let request = RecognitionRequest::new(&self.settings.package_language)
            .with_whitelist(&self.settings.package_whitelist);
        self.recognize_field(
            image,
            &self.package_count_region,
            &request,
            extract_package_count,
        )
    }

    fn recognize_field(
        &self,
        image: &DynamicImage,
        region: &OcrRegion,
        request: &RecognitionRequest<'_>,
        extract: fn(&str) -> Option<String>,
    ) -> RecognizedField {
        if !region.is_usable() {
            warn!(?region, "Region too small, reconfigure it");
            return RecognizedField::invalid_region();
        }

        let text = match self.recognize_region(image, region, request) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Region could not be cropped");
                return RecognizedField::unrecognized(String::new());
            }
        };
        if text.is_empty() {
            return RecognizedField::unrecognized(text);
        }

        match extract(&text) {
            Some(value) => {
                info!(raw = %text, value = %value, "Field recognised");
                RecognizedField::value(text, value)
            }
            None => {
                debug!(raw = %text, "No field in recognised text");
                RecognizedField::unrecognized(text)
            }
        }
    }
}
