// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelwerk label pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PrinterProfile;
use crate::error::{LabelwerkError, Result};

/// Unique identifier for a document group.
///
/// Identity is separate from content: two groups covering the same pages in
/// different scan sessions have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OCR regions
// ---------------------------------------------------------------------------

/// Smallest relative width/height accepted for a field region.
pub const MIN_REGION_EXTENT: f32 = 0.01;

/// A rectangle in relative page coordinates (each component in `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcrRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl OcrRegion {
    /// Default tracking-number region: bottom-left strip of the label.
    pub const TRACKING_NUMBER_DEFAULT: Self = Self {
        x: 0.05,
        y: 0.85,
        width: 0.5,
        height: 0.08,
    };

    /// Default package-count region: right-hand side, middle of the label.
    pub const PACKAGE_COUNT_DEFAULT: Self = Self {
        x: 0.7,
        y: 0.45,
        width: 0.25,
        height: 0.15,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the region is large enough to be worth recognising.
    pub fn is_usable(&self) -> bool {
        self.width >= MIN_REGION_EXTENT && self.height >= MIN_REGION_EXTENT
    }

    /// Check the region can be cropped: positive extent and an origin inside
    /// the page.
    pub fn validate(&self) -> Result<()> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(LabelwerkError::Validation(format!(
                "region width and height must be positive (got {}x{})",
                self.width, self.height
            )));
        }
        if !(0.0..1.0).contains(&self.x) || !(0.0..1.0).contains(&self.y) {
            return Err(LabelwerkError::Validation(format!(
                "region origin must lie in [0, 1) (got {}, {})",
                self.x, self.y
            )));
        }
        Ok(())
    }

    /// Convert to absolute pixel coordinates `(x, y, width, height)`, truncating
    /// towards zero. No clamping is applied.
    pub fn to_absolute(&self, image_width: u32, image_height: u32) -> (i64, i64, i64, i64) {
        (
            (self.x * image_width as f32) as i64,
            (self.y * image_height as f32) as i64,
            (self.width * image_width as f32) as i64,
            (self.height * image_height as f32) as i64,
        )
    }
}

// ---------------------------------------------------------------------------
// Recognition results
// ---------------------------------------------------------------------------

/// Outcome of extracting a structured field from OCR text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldOutcome {
    /// A value was extracted.
    Value(String),
    /// OCR produced nothing the extraction cascade accepted.
    Unrecognized,
    /// The configured region is too small to recognise.
    InvalidRegion,
    /// The recognition pipeline itself failed.
    Failed,
}

/// Raw OCR text together with the value extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedField {
    pub raw_text: String,
    pub outcome: FieldOutcome,
}

impl RecognizedField {
    pub fn value(raw_text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            outcome: FieldOutcome::Value(value.into()),
        }
    }

    pub fn unrecognized(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            outcome: FieldOutcome::Unrecognized,
        }
    }

    pub fn invalid_region() -> Self {
        Self {
            raw_text: String::new(),
            outcome: FieldOutcome::InvalidRegion,
        }
    }

    pub fn failed() -> Self {
        Self {
            raw_text: String::new(),
            outcome: FieldOutcome::Failed,
        }
    }

    /// The extracted value, if any.
    pub fn as_value(&self) -> Option<&str> {
        match &self.outcome {
            FieldOutcome::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Text shown to operators: the value or a sentinel.
    pub fn display_text(&self) -> &str {
        match &self.outcome {
            FieldOutcome::Value(v) => v,
            FieldOutcome::Unrecognized => "未识别",
            FieldOutcome::InvalidRegion => "区域无效",
            FieldOutcome::Failed => "识别失败",
        }
    }

    /// Leading integer of the value, e.g. `3` for `"3件"`.
    ///
    /// Used to auto-fill copy counts from a recognised package count.
    pub fn count(&self) -> Option<u32> {
        let value = self.as_value()?;
        let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Printers and paper
// ---------------------------------------------------------------------------

/// Operational status of an installed printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterStatus {
    Ready,
    Offline,
    Busy,
    Error,
}

/// An entry in the printer catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterInfo {
    pub name: String,
    pub is_default: bool,
    pub status: PrinterStatus,
}

/// Hundredths of an inch per millimetre, the spooler's native paper unit.
pub const HUNDREDTHS_INCH_PER_MM: f64 = 3.937;

/// Convert millimetres to hundredths of an inch, truncating.
pub fn mm_to_hundredths_inch(mm: u32) -> u32 {
    (mm as f64 * HUNDREDTHS_INCH_PER_MM) as u32
}

/// A paper size a printer driver advertises, in hundredths of an inch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSize {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl MediaSize {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    /// Build a media size from millimetre dimensions.
    pub fn from_mm(name: impl Into<String>, width_mm: u32, height_mm: u32) -> Self {
        Self::new(
            name,
            mm_to_hundredths_inch(width_mm),
            mm_to_hundredths_inch(height_mm),
        )
    }
}

/// The paper geometry actually sent with a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSelection {
    /// A size the driver already knows.
    Predefined(MediaSize),
    /// A synthesized size, in hundredths of an inch.
    Custom { width: u32, height: u32 },
}

impl PaperSelection {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Predefined(media) => (media.width, media.height),
            Self::Custom { width, height } => (*width, *height),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Predefined(media) => &media.name,
            Self::Custom { .. } => "Custom",
        }
    }
}

// ---------------------------------------------------------------------------
// Print jobs
// ---------------------------------------------------------------------------

/// An inclusive, 1-based run of pages within a document.
pub trait PageSpan {
    fn start_page(&self) -> u32;
    fn end_page(&self) -> u32;

    /// Page range string for a print job: `"start-end"`, or `"n"` for one page.
    fn page_range_spec(&self) -> String {
        let (start, end) = (self.start_page(), self.end_page());
        if start == end {
            start.to_string()
        } else {
            format!("{start}-{end}")
        }
    }
}

impl PageSpan for (u32, u32) {
    fn start_page(&self) -> u32 {
        self.0
    }

    fn end_page(&self) -> u32 {
        self.1
    }
}

/// What to print, where, and on what paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintOptions {
    pub file_path: PathBuf,
    pub printer_name: String,
    pub paper_width_mm: u32,
    pub paper_height_mm: u32,
    pub copies: u32,
    /// Free-form page range, e.g. `"1-3,5"`. `None` prints every page.
    pub page_range: Option<String>,
}

impl PrintOptions {
    /// Reject options that can never print. Runs before a batch starts.
    pub fn validate(&self) -> Result<()> {
        if self.paper_width_mm == 0 || self.paper_height_mm == 0 {
            return Err(LabelwerkError::Validation(format!(
                "invalid paper size {}x{}mm",
                self.paper_width_mm, self.paper_height_mm
            )));
        }
        if self.copies == 0 {
            return Err(LabelwerkError::Validation("copies must be at least 1".into()));
        }
        if self.printer_name.trim().is_empty() {
            return Err(LabelwerkError::Validation("no printer selected".into()));
        }
        if self.file_path.as_os_str().is_empty() {
            return Err(LabelwerkError::Validation("no file to print".into()));
        }
        Ok(())
    }
}

/// One unit of work for the batch printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintJob {
    pub options: PrintOptions,
    pub description: String,
}

impl PrintJob {
    fn with_profile(
        file_path: impl Into<PathBuf>,
        profile: &PrinterProfile,
        copies: u32,
        page_range: Option<String>,
        description: String,
    ) -> Self {
        Self {
            options: PrintOptions {
                file_path: file_path.into(),
                printer_name: profile.printer_name.clone(),
                paper_width_mm: profile.paper_width_mm,
                paper_height_mm: profile.paper_height_mm,
                copies,
                page_range,
            },
            description,
        }
    }

    /// Print a single page of a document.
    pub fn for_page(file_path: impl Into<PathBuf>, profile: &PrinterProfile, page: u32) -> Self {
        Self::with_profile(
            file_path,
            profile,
            1,
            Some(page.to_string()),
            format!("page {page}"),
        )
    }

    /// Print the pages of a group (or any other span) once.
    pub fn for_group(
        file_path: impl Into<PathBuf>,
        profile: &PrinterProfile,
        group: &impl PageSpan,
    ) -> Self {
        let spec = group.page_range_spec();
        Self::with_profile(
            file_path,
            profile,
            1,
            Some(spec.clone()),
            format!("pages {spec}"),
        )
    }

    /// Print a whole fixed document `copies` times (eco codes, UK/EU barcodes).
    pub fn copies_of(
        file_path: impl Into<PathBuf>,
        profile: &PrinterProfile,
        copies: u32,
        description: impl Into<String>,
    ) -> Self {
        Self::with_profile(file_path, profile, copies, None, description.into())
    }
}

/// A job that failed, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedJob {
    pub job: PrintJob,
    pub error: String,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_jobs: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_jobs: Vec<FailedJob>,
}

impl BatchResult {
    pub fn new(total_jobs: usize) -> Self {
        Self {
            total_jobs,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    pub fn record_failure(&mut self, job: PrintJob, error: impl Into<String>) {
        self.failed_count += 1;
        self.failed_jobs.push(FailedJob {
            job,
            error: error.into(),
        });
    }

    /// Jobs that reached the sink (successfully or not).
    pub fn attempted(&self) -> usize {
        self.success_count + self.failed_count
    }

    /// Whether every job ran and none failed.
    pub fn all_succeeded(&self) -> bool {
        self.failed_count == 0 && self.success_count == self.total_jobs
    }
}
