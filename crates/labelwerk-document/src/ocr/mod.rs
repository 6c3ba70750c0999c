// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Optical character recognition: the recogniser seam, region extraction, and
// the field cascades that turn raw text into tracking numbers and counts.

#[cfg(feature = "ocr")]
pub mod engine;
pub mod fields;
pub mod region;

use image::DynamicImage;
use labelwerk_core::error::Result;

#[cfg(feature = "ocr")]
pub use engine::{OcrConfig, OcrEngine};
pub use region::RegionOcrExtractor;

/// Per-call recognition parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionRequest<'a> {
    /// Language hint, e.g. `"eng"` or `"chi_sim+eng"`.
    pub language: &'a str,
    /// If set, only these characters may appear in the output.
    pub whitelist: Option<&'a str>,
}

impl<'a> RecognitionRequest<'a> {
    pub fn new(language: &'a str) -> Self {
        Self {
            language,
            whitelist: None,
        }
    }

    pub fn with_whitelist(mut self, whitelist: &'a str) -> Self {
        self.whitelist = Some(whitelist);
        self
    }
}

/// A text recognition backend.
pub trait TextRecognizer: Send + Sync {
    /// Recognise all text in `image`.
    fn recognize(&self, image: &DynamicImage, request: &RecognitionRequest<'_>) -> Result<String>;
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn recognize(&self, image: &DynamicImage, request: &RecognitionRequest<'_>) -> Result<String> {
        (**self).recognize(image, request)
    }
}

/// Drop every character not in `whitelist`, keeping whitespace so words stay
/// apart.
pub fn apply_whitelist(text: &str, whitelist: &str) -> String {
    text.chars()
        .filter(|c| c.is_whitespace() || whitelist.contains(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_filters_characters() {
        assert_eq!(apply_whitelist("第1包 (共3包)!", "0123456789件包共第（）/"), "第1包 共3包");
        assert_eq!(apply_whitelist("abc", ""), "");
    }
}
