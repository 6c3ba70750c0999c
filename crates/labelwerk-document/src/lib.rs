// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelwerk-document: Document processing for the Labelwerk label pipeline.
//
// Provides the page rendering seam, separator detection by multi-scale
// template matching, grouping of pages between separators, and region OCR
// with Otsu preprocessing and field extraction.

pub mod image;
pub mod ocr;
pub mod pdf;
pub mod render;
pub mod scan;

// Re-export the primary structs so callers can use `labelwerk_document::SeparatorDetector` etc.
pub use self::image::processor::ImageProcessor;
pub use ocr::{RecognitionRequest, RegionOcrExtractor, TextRecognizer};
pub use pdf::reader::PdfReader;
pub use render::{ImageDirRenderer, PageRenderer};
pub use scan::{DocumentGroup, DocumentGrouper, PrintState, ScanEnhancer, SeparatorDetector};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrEngine};
