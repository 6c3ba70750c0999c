// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer. Owns the loaded configuration and exposes the
// pipeline steps the CLI drives: separator scan and grouping, label OCR,
// order job assembly, and batch printing with progress.

use std::path::{Path, PathBuf};

use labelwerk_core::error::Result;
use labelwerk_core::types::{BatchResult, PrintJob, PrinterInfo};
use labelwerk_core::{AppConfig, CancelToken};
use labelwerk_document::{DocumentGroup, DocumentGrouper, ImageDirRenderer, SeparatorDetector};
use labelwerk_print::{BatchPrinter, ConfiguredCatalog, PrinterCatalog, RawTcpSink};
use tokio::sync::watch;
use tracing::info;

/// Result of scanning a rendered document for separators.
pub struct ScanOutcome {
    pub separators: Vec<u32>,
    pub grouper: DocumentGrouper,
}

/// Everything printed for one main-order page.
///
/// Copy counts of zero skip the corresponding job.
#[derive(Debug, Clone, Default)]
pub struct OrderPrint<'a> {
    pub main_pdf: Option<&'a Path>,
    pub page: u32,
    pub eco_code: Option<(&'a Path, u32)>,
    pub barcode_group: Option<(&'a Path, &'a DocumentGroup)>,
    pub uk_eu_barcode: Option<(&'a Path, u32)>,
}

/// Shared application services.
pub struct AppServices {
    data_dir: PathBuf,
    config: AppConfig,
    renderer: ImageDirRenderer,
}

impl AppServices {
    /// Load configuration from `data_dir`, or the platform data directory.
    pub fn init(data_dir: Option<PathBuf>) -> Self {
        let dir = data_dir.unwrap_or_else(labelwerk_core::config::data_dir);
        if let Err(err) = std::fs::create_dir_all(&dir) {
            tracing::warn!(path = %dir.display(), error = %err, "cannot create data directory");
        }
        info!(path = %dir.display(), "initialising app services");

        let config = AppConfig::load(&dir);
        Self {
            data_dir: dir,
            config,
            renderer: ImageDirRenderer::default(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    /// Persist the configuration. Out-of-range paper sizes are rejected and
    /// nothing is written.
    pub fn save_config(&self) -> Result<()> {
        self.config.printers.validate()?;
        self.config.save(&self.data_dir)
    }

    /// Resolution the page images on disk were scanned at.
    pub fn set_source_dpi(&mut self, dpi: u32) {
        self.renderer = ImageDirRenderer::new(dpi);
    }

    // -- Scanning ------------------------------------------------------------

    /// Find separator pages in `pages` and group the pages between them.
    pub fn scan_groups(
        &self,
        pages: &Path,
        template: &Path,
        threshold: Option<f64>,
        cancel: &CancelToken,
    ) -> Result<ScanOutcome> {
        let mut detector = SeparatorDetector::new(&self.config.scan);
        detector.load_template(template)?;

        let threshold = threshold.unwrap_or(self.config.scan.threshold);
        let separators = detector.scan_document(&self.renderer, pages, threshold, Some(cancel))?;

        let mut grouper = DocumentGrouper::new(self.config.scan.preview_dpi);
        grouper.create_groups(&self.renderer, pages, &separators)?;
        Ok(ScanOutcome {
            separators,
            grouper,
        })
    }

    // -- OCR -----------------------------------------------------------------

    /// Read the tracking number and package count from a label page image.
    /// If the engine or the page cannot be loaded, both fields are `Failed`.
    #[cfg(feature = "ocr")]
    pub fn recognize_label(
        &self,
        page_image: &Path,
    ) -> (
        labelwerk_core::types::RecognizedField,
        labelwerk_core::types::RecognizedField,
    ) {
        use labelwerk_core::types::RecognizedField;
        use labelwerk_document::{ImageProcessor, OcrConfig, OcrEngine, RegionOcrExtractor};

        let config = OcrConfig::from_settings(self.config.ocr.model_dir.as_deref());
        let loaded = OcrEngine::new(&config)
            .and_then(|engine| Ok((engine, ImageProcessor::open(page_image)?.into_dynamic())));
        let (engine, image) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                tracing::warn!(error = %err, path = %page_image.display(), "Label recognition failed");
                return (RecognizedField::failed(), RecognizedField::failed());
            }
        };

        let extractor = RegionOcrExtractor::new(engine, &self.config);
        (
            extractor.recognize_tracking_number(&image),
            extractor.recognize_package_count(&image),
        )
    }

    // -- Printing ------------------------------------------------------------

    /// Assemble the jobs for one order, in print order: main page, eco code,
    /// barcode group, UK/EU barcode.
    pub fn order_jobs(&self, order: &OrderPrint<'_>) -> Vec<PrintJob> {
        let printers = &self.config.printers;
        let mut jobs = Vec::new();

        if let Some(main) = order.main_pdf {
            jobs.push(PrintJob::for_page(main, &printers.main_order, order.page));
        }
        if let Some((eco, copies)) = order.eco_code
            && copies > 0
        {
            jobs.push(PrintJob::copies_of(eco, &printers.eco_code, copies, "eco code"));
        }
        if let Some((barcodes, group)) = order.barcode_group {
            let mut job = PrintJob::for_group(barcodes, &printers.barcode, group);
            job.description = format!("barcode group of {} pages", group.page_count);
            jobs.push(job);
        }
        if let Some((uk_eu, copies)) = order.uk_eu_barcode
            && copies > 0
        {
            jobs.push(PrintJob::copies_of(uk_eu, &printers.barcode, copies, "UK/EU barcode"));
        }
        jobs
    }

    fn batch_printer(&self) -> BatchPrinter<RawTcpSink, ConfiguredCatalog> {
        BatchPrinter::new(
            RawTcpSink::from_config(&self.config),
            ConfiguredCatalog::from_config(&self.config),
        )
    }

    pub async fn printers(&self) -> Result<Vec<PrinterInfo>> {
        ConfiguredCatalog::from_config(&self.config).printers().await
    }

    /// Print `jobs`, logging progress as each one completes.
    pub async fn run_batch(&self, jobs: &[PrintJob], cancel: &CancelToken) -> Result<BatchResult> {
        let (tx, mut rx) = watch::channel(0usize);
        let total = jobs.len();
        let reporter = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let done = *rx.borrow_and_update();
                info!(done, total, "print progress");
            }
        });

        let result = self
            .batch_printer()
            .print_batch(jobs, Some(&tx), Some(cancel))
            .await;
        drop(tx);
        reporter.await.ok();
        result
    }

    /// Print an order. When every job succeeded, its barcode group is marked
    /// printed in `grouper`.
    pub async fn print_order(
        &self,
        order: &OrderPrint<'_>,
        grouper: Option<&mut DocumentGrouper>,
        cancel: &CancelToken,
    ) -> Result<BatchResult> {
        let jobs = self.order_jobs(order);
        let result = self.run_batch(&jobs, cancel).await?;

        if result.all_succeeded()
            && let (Some(grouper), Some((_, group))) = (grouper, order.barcode_group)
        {
            grouper.mark_as_printed(group.id);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use labelwerk_core::config::PrinterProfile;

    fn services(dir: &Path) -> AppServices {
        let mut svc = AppServices::init(Some(dir.to_path_buf()));
        let printers = &mut svc.config_mut().printers;
        printers.main_order = PrinterProfile::new("Main", 100, 150);
        printers.barcode = PrinterProfile::new("Barcode", 60, 40);
        printers.eco_code = PrinterProfile::new("Eco", 50, 30);
        svc
    }

    fn mark() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, y| {
            let frame = x < 5 || y < 5 || x > 34 || y > 34;
            if frame || x == y { Luma([10]) } else { Luma([230]) }
        })
    }

    #[test]
    fn init_writes_default_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = AppServices::init(Some(dir.path().to_path_buf()));
        assert!(dir.path().join("config.json").exists());
        assert_eq!(svc.config(), &AppConfig::default());
    }

    #[test]
    fn save_rejects_out_of_range_paper() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut svc = services(dir.path());
        svc.save_config().expect("valid profiles save");

        svc.config_mut().printers.barcode.paper_width_mm = 800;
        let err = svc.save_config().expect_err("paper too wide");
        assert!(err.is_validation());

        let saved = AppConfig::load(dir.path());
        assert_eq!(saved.printers.barcode.paper_width_mm, 60);
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn unreadable_label_reads_as_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = services(dir.path());
        let (tracking, packages) = svc.recognize_label(&dir.path().join("missing.png"));
        assert_eq!(tracking.display_text(), "识别失败");
        assert_eq!(packages.display_text(), "识别失败");
        assert_eq!(packages.count(), None);
    }

    #[test]
    fn order_jobs_follow_print_order_and_skip_zero_copies() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = services(dir.path());
        let order = OrderPrint {
            main_pdf: Some(Path::new("orders.pdf")),
            page: 3,
            eco_code: Some((Path::new("eco.pdf"), 4)),
            barcode_group: None,
            uk_eu_barcode: Some((Path::new("uk_eu.pdf"), 0)),
        };

        let jobs = svc.order_jobs(&order);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].options.printer_name, "Main");
        assert_eq!(jobs[0].options.page_range.as_deref(), Some("3"));
        assert_eq!(jobs[1].options.printer_name, "Eco");
        assert_eq!(jobs[1].options.copies, 4);
        assert_eq!((jobs[1].options.paper_width_mm, jobs[1].options.paper_height_mm), (50, 30));
    }

    #[test]
    fn scan_finds_separator_and_groups_barcode_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut svc = services(dir.path());
        svc.set_source_dpi(svc.config().scan.scan_dpi);

        let template = dir.path().join("separator.png");
        mark().save(&template).expect("save template");

        let pages = dir.path().join("barcodes");
        std::fs::create_dir(&pages).expect("mkdir");
        let blank = GrayImage::from_pixel(120, 180, Luma([240]));
        let mut separator = blank.clone();
        image::imageops::overlay(&mut separator, &mark(), 30, 40);
        for (name, page) in [("p1.png", &blank), ("p2.png", &blank), ("p3.png", &separator), ("p4.png", &blank)] {
            page.save(pages.join(name)).expect("save page");
        }

        let outcome = svc
            .scan_groups(&pages, &template, None, &CancelToken::new())
            .expect("scan");
        assert_eq!(outcome.separators, vec![3]);
        let spans: Vec<(u32, u32)> = outcome
            .grouper
            .groups()
            .iter()
            .map(|g| (g.start_page, g.end_page))
            .collect();
        assert_eq!(spans, vec![(1, 2), (4, 4)]);

        let group = &outcome.grouper.groups()[0];
        let order = OrderPrint {
            barcode_group: Some((Path::new("barcodes.pdf"), group)),
            ..Default::default()
        };
        let jobs = svc.order_jobs(&order);
        assert_eq!(jobs[0].options.printer_name, "Barcode");
        assert_eq!(jobs[0].options.page_range.as_deref(), Some("1-2"));
        assert_eq!(jobs[0].description, "barcode group of 2 pages");
    }

    #[tokio::test]
    async fn failed_order_leaves_group_unprinted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = services(dir.path());
        let group = DocumentGroup {
            id: labelwerk_core::types::GroupId::new(),
            start_page: 1,
            end_page: 2,
            page_count: 2,
            preview: None,
        };
        let mut grouper = DocumentGrouper::new(100);
        let order = OrderPrint {
            barcode_group: Some((Path::new("barcodes.pdf"), &group)),
            ..Default::default()
        };

        // No endpoint is configured for "Barcode", so the job fails.
        let result = svc
            .print_order(&order, Some(&mut grouper), &CancelToken::new())
            .await
            .expect("batch");
        assert_eq!(result.failed_count, 1);
        assert!(result.failed_jobs[0].error.contains("unknown printer"));
        assert!(!grouper.is_printed(group.id));
    }
}
