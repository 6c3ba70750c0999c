// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering seam. Detection and grouping only ever see a document
// through `PageRenderer`: a page count and a page-to-raster call.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use labelwerk_core::error::{LabelwerkError, Result};
use tracing::{debug, instrument, warn};

use crate::image::processor::ImageProcessor;

/// Turns a document on disk into page rasters.
pub trait PageRenderer: Send + Sync {
    /// Number of pages. Fails with `NotFound` if the document is unreadable.
    fn page_count(&self, path: &Path) -> Result<u32>;

    /// Render 1-based `page` at `dpi`. `Ok(None)` means the page could not be
    /// produced (out of range, blank render) without the document being
    /// broken.
    fn render_page(&self, path: &Path, page: u32, dpi: u32) -> Result<Option<DynamicImage>>;
}

/// Raster file extensions accepted as pages.
const PAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Renders pre-rasterised documents.
///
/// A document is either a single raster file (one page) or a directory of
/// raster files, one per page, ordered by file name. Pages are assumed to be
/// scanned at `source_dpi` and are resampled to the requested resolution.
#[derive(Debug, Clone)]
pub struct ImageDirRenderer {
    source_dpi: u32,
}

impl ImageDirRenderer {
    pub fn new(source_dpi: u32) -> Self {
        Self { source_dpi }
    }

    /// Page files of a document, in page order.
    pub fn page_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if !path.exists() {
            return Err(LabelwerkError::NotFound(path.display().to_string()));
        }
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_page_file(p))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl Default for ImageDirRenderer {
    fn default() -> Self {
        Self::new(300)
    }
}

fn is_page_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl PageRenderer for ImageDirRenderer {
    fn page_count(&self, path: &Path) -> Result<u32> {
        Ok(self.page_files(path)?.len() as u32)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn render_page(&self, path: &Path, page: u32, dpi: u32) -> Result<Option<DynamicImage>> {
        let files = self.page_files(path)?;
        let Some(file) = page.checked_sub(1).and_then(|i| files.get(i as usize)) else {
            warn!(page, pages = files.len(), "Page out of range");
            return Ok(None);
        };

        let image = ImageProcessor::open(file)?
            .resample_dpi(self.source_dpi, dpi)
            .into_dynamic();
        debug!(width = image.width(), height = image.height(), "Page rendered");
        Ok(Some(image))
    }
}

/// In-memory renderer for tests: the path is ignored, pages are returned as
/// stored. `None` entries simulate pages that fail to render. Every render
/// request is recorded as `(page, dpi)`.
#[cfg(test)]
pub(crate) struct MemoryRenderer {
    pub pages: Vec<Option<DynamicImage>>,
    requests: std::sync::Mutex<Vec<(u32, u32)>>,
}

#[cfg(test)]
impl MemoryRenderer {
    pub fn new(pages: Vec<Option<DynamicImage>>) -> Self {
        Self {
            pages,
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(u32, u32)> {
        self.requests.lock().expect("lock").clone()
    }
}

#[cfg(test)]
impl PageRenderer for MemoryRenderer {
    fn page_count(&self, _path: &Path) -> Result<u32> {
        Ok(self.pages.len() as u32)
    }

    fn render_page(&self, _path: &Path, page: u32, dpi: u32) -> Result<Option<DynamicImage>> {
        self.requests.lock().expect("lock").push((page, dpi));
        Ok(page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .cloned()
            .flatten())
    }
}
