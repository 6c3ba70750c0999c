// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Separator page detection by multi-scale template matching.
//
// The score is the zero-mean normalised cross-correlation between the
// template and every same-sized window of the page:
//
//   R(x, y) = Σ T'(i, j) · S(x+i, y+j) / sqrt(Σ T'² · (Σ S² − (Σ S)² / n))
//
// where T' is the template minus its mean. Window sums come from integral
// images, rows of the correlation surface are evaluated in parallel.
//
// With a working-template cap configured, large templates are first located
// on a shrunken copy of page and template; the reported score is still the
// full-resolution R at the best position found near those candidates, so it
// never exceeds the exact maximum.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use imageproc::integral_image::{integral_image, integral_squared_image};
use labelwerk_core::config::ScanConfig;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::CancelToken;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::render::PageRenderer;

/// Candidate positions carried from the reduced-resolution pass into the
/// full-resolution refinement.
const REFINE_CANDIDATES: usize = 8;

/// Windows with less variance than this are treated as flat (score 0).
const FLAT_VARIANCE: f64 = 1e-6;

/// Finds separator pages in a rendered document.
pub struct SeparatorDetector {
    template: Option<GrayImage>,
    scales: Vec<f64>,
    scan_dpi: u32,
    working_template_side: Option<u32>,
}

impl SeparatorDetector {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            template: None,
            scales: config.scales.clone(),
            scan_dpi: config.scan_dpi,
            working_template_side: config.working_template_side,
        }
    }

    // -- Template -------------------------------------------------------------

    /// Read and grayscale-convert the separator reference image.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_template(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LabelwerkError::NotFound(format!(
                "separator template {}",
                path.display()
            )));
        }
        let image = image::open(path).map_err(|err| {
            LabelwerkError::ImageError(format!(
                "failed to decode template {}: {}",
                path.display(),
                err
            ))
        })?;
        self.set_template(image.to_luma8());
        Ok(())
    }

    /// Install an already-decoded template.
    pub fn set_template(&mut self, template: GrayImage) {
        info!(
            width = template.width(),
            height = template.height(),
            "Separator template loaded"
        );
        self.template = Some(template);
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    // -- Matching -------------------------------------------------------------

    /// Highest correlation of the template against `image` over the scale
    /// ladder. Scales where the template does not fit are skipped; if none
    /// fit the score is 0.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn best_score(&self, image: &DynamicImage) -> Result<f64> {
        let template = self.template.as_ref().ok_or(LabelwerkError::TemplateNotLoaded)?;
        let source = image.to_luma8();

        let mut best = 0.0f64;
        for &scale in &self.scales {
            match score_at_scale(&source, template, scale, self.working_template_side) {
                Ok(Some(score)) => {
                    debug!(scale, score, "Scale evaluated");
                    best = best.max(score);
                }
                Ok(None) => debug!(scale, "Template does not fit at this scale"),
                Err(err) => warn!(scale, error = %err, "Scale skipped"),
            }
        }
        Ok(best)
    }

    /// Whether `image` contains the separator template with a score of at
    /// least `threshold`.
    pub fn matches_template(&self, image: &DynamicImage, threshold: f64) -> Result<bool> {
        Ok(self.best_score(image)? >= threshold)
    }

    /// Scan every page of a document and return the 1-based separator pages in
    /// ascending order.
    ///
    /// Pages that fail to render or match are logged and skipped. When `cancel`
    /// fires, the pages found so far are returned.
    #[instrument(skip_all, fields(path = %path.display(), threshold))]
    pub fn scan_document(
        &self,
        renderer: &dyn PageRenderer,
        path: &Path,
        threshold: f64,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<u32>> {
        if self.template.is_none() {
            return Err(LabelwerkError::TemplateNotLoaded);
        }

        let total = renderer.page_count(path)?;
        info!(total, "Scanning document for separators");

        let mut separators = Vec::new();
        for page in 1..=total {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                info!(page, found = separators.len(), "Scan cancelled");
                break;
            }

            let image = match renderer.render_page(path, page, self.scan_dpi) {
                Ok(Some(image)) => image,
                Ok(None) => {
                    warn!(page, "Page did not render, skipping");
                    continue;
                }
                Err(err) => {
                    warn!(page, error = %err, "Page render failed, skipping");
                    continue;
                }
            };

            match self.matches_template(&image, threshold) {
                Ok(true) => {
                    debug!(page, "Separator page");
                    separators.push(page);
                }
                Ok(false) => {}
                Err(err) => warn!(page, error = %err, "Matching failed, skipping"),
            }
        }

        info!(found = separators.len(), "Separator scan complete");
        Ok(separators)
    }
}

/// Resize `image` by `factor`, or `None` if either side would vanish.
fn scale_gray(image: &GrayImage, factor: f64) -> Option<GrayImage> {
    let width = (image.width() as f64 * factor).round() as u32;
    let height = (image.height() as f64 * factor).round() as u32;
    if width < 1 || height < 1 {
        return None;
    }
    if (width, height) == image.dimensions() {
        return Some(image.clone());
    }
    Some(image::imageops::resize(image, width, height, FilterType::Triangle))
}

/// Score of the template scaled by `scale`, or `None` if it does not fit.
fn score_at_scale(
    source: &GrayImage,
    template: &GrayImage,
    scale: f64,
    working_side: Option<u32>,
) -> Result<Option<f64>> {
    if !(scale.is_finite() && scale > 0.0) {
        return Err(LabelwerkError::Recognition(format!("invalid scale {scale}")));
    }
    let Some(scaled) = scale_gray(template, scale) else {
        return Ok(None);
    };
    let Some(exact) = Correlator::new(source, &scaled) else {
        return Ok(if fits(source, &scaled) { Some(0.0) } else { None });
    };

    let longest = scaled.width().max(scaled.height());
    match working_side {
        Some(side) if side > 0 && longest > side => {
            let factor = side as f64 / longest as f64;
            Ok(Some(coarse_to_fine(&exact, source, &scaled, factor)))
        }
        _ => Ok(Some(exact.best())),
    }
}

fn fits(source: &GrayImage, template: &GrayImage) -> bool {
    template.width() <= source.width() && template.height() <= source.height()
}

/// Locate candidates on copies shrunk by `factor`, then score exactly in a
/// small neighbourhood of each one.
fn coarse_to_fine(
    exact: &Correlator<'_>,
    source: &GrayImage,
    template: &GrayImage,
    factor: f64,
) -> f64 {
    let (Some(small_source), Some(small_template)) =
        (scale_gray(source, factor), scale_gray(template, factor))
    else {
        return exact.best();
    };
    let Some(coarse) = Correlator::new(&small_source, &small_template) else {
        return exact.best();
    };

    let radius = (1.0 / factor).ceil() as u32 + 1;
    let (max_x, max_y) = exact.last_position();
    coarse
        .candidates(REFINE_CANDIDATES)
        .into_iter()
        .map(|(x, y)| {
            let cx = (x as f64 / factor).round() as u32;
            let cy = (y as f64 / factor).round() as u32;
            let xs = cx.saturating_sub(radius)..=(cx + radius).min(max_x);
            let ys = cy.saturating_sub(radius)..=(cy + radius).min(max_y);
            ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
                .map(|(x, y)| exact.score(x, y))
                .fold(0.0f64, f64::max)
        })
        .fold(0.0f64, f64::max)
        .clamp(0.0, 1.0)
}

type SumTable = image::ImageBuffer<image::Luma<u64>, Vec<u64>>;

/// Zero-mean template and the page's window sums, ready to score positions.
struct Correlator<'a> {
    source: &'a GrayImage,
    tw: u32,
    th: u32,
    n: f64,
    t_zero: Vec<f64>,
    t_norm: f64,
    sum: SumTable,
    sum_sq: SumTable,
}

impl<'a> Correlator<'a> {
    /// `None` if the template is empty, does not fit, or is flat.
    fn new(source: &'a GrayImage, template: &GrayImage) -> Option<Self> {
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 || !fits(source, template) {
            return None;
        }
        let n = (tw * th) as f64;
        let t_mean = template.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
        let t_zero: Vec<f64> = template.pixels().map(|p| p.0[0] as f64 - t_mean).collect();
        let t_norm: f64 = t_zero.iter().map(|v| v * v).sum();
        if t_norm < FLAT_VARIANCE {
            return None;
        }
        Some(Self {
            source,
            tw,
            th,
            n,
            t_zero,
            t_norm,
            sum: integral_image::<_, u64>(source),
            sum_sq: integral_squared_image::<_, u64>(source),
        })
    }

    /// Largest valid top-left corner.
    fn last_position(&self) -> (u32, u32) {
        (self.source.width() - self.tw, self.source.height() - self.th)
    }

    fn window(&self, table: &SumTable, x: u32, y: u32) -> f64 {
        let (tw, th) = (self.tw, self.th);
        (table.get_pixel(x + tw, y + th).0[0] + table.get_pixel(x, y).0[0]) as f64
            - (table.get_pixel(x + tw, y).0[0] + table.get_pixel(x, y + th).0[0]) as f64
    }

    /// R at top-left corner `(x, y)`; 0 for flat windows.
    fn score(&self, x: u32, y: u32) -> f64 {
        let s = self.window(&self.sum, x, y);
        let variance = self.window(&self.sum_sq, x, y) - s * s / self.n;
        if variance < FLAT_VARIANCE {
            return 0.0;
        }

        let pixels = self.source.as_raw();
        let stride = self.source.width() as usize;
        let tw = self.tw as usize;
        let mut numerator = 0.0f64;
        for j in 0..self.th as usize {
            let row_start = (y as usize + j) * stride + x as usize;
            let src_row = &pixels[row_start..row_start + tw];
            let tpl_row = &self.t_zero[j * tw..(j + 1) * tw];
            numerator += src_row
                .iter()
                .zip(tpl_row)
                .map(|(&s, &t)| s as f64 * t)
                .sum::<f64>();
        }
        numerator / (self.t_norm * variance).sqrt()
    }

    /// Best score and its column for row `y`.
    fn row_best(&self, y: u32) -> (f64, u32) {
        let (max_x, _) = self.last_position();
        (0..=max_x)
            .map(|x| (self.score(x, y), x))
            .fold((0.0, 0), |best, cur| if cur.0 > best.0 { cur } else { best })
    }

    /// Maximum of R over every position, clamped to `[0, 1]`.
    fn best(&self) -> f64 {
        let (_, max_y) = self.last_position();
        (0..=max_y)
            .into_par_iter()
            .map(|y| self.row_best(y).0)
            .reduce(|| 0.0, f64::max)
            .clamp(0.0, 1.0)
    }

    /// Up to `count` positions with the highest scores, at most one per row.
    fn candidates(&self, count: usize) -> Vec<(u32, u32)> {
        let (_, max_y) = self.last_position();
        let mut rows: Vec<(f64, u32, u32)> = (0..=max_y)
            .into_par_iter()
            .map(|y| {
                let (score, x) = self.row_best(y);
                (score, x, y)
            })
            .collect();
        rows.sort_by(|a, b| b.0.total_cmp(&a.0));
        rows.into_iter()
            .take(count)
            .map(|(_, x, y)| (x, y))
            .collect()
    }
}

/// Maximum zero-mean normalised cross-correlation of `template` over every
/// position in `source`, clamped to `[0, 1]`. 0 if the template does not fit
/// or is flat.
pub fn max_ncc(source: &GrayImage, template: &GrayImage) -> f64 {
    Correlator::new(source, template).map_or(0.0, |c| c.best())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::MemoryRenderer;
    use image::Luma;

    /// A 20x20 mark: dark frame, light centre, dark diagonal.
    fn template() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, y| {
            let frame = x < 3 || y < 3 || x > 16 || y > 16;
            if frame || x == y { Luma([10]) } else { Luma([230]) }
        })
    }

    fn blank_page() -> GrayImage {
        GrayImage::from_pixel(120, 160, Luma([245]))
    }

    fn page_with_mark(scale: f64, at: (u32, u32)) -> DynamicImage {
        let mut page = blank_page();
        let mark = scale_gray(&template(), scale).expect("scaled mark");
        image::imageops::overlay(&mut page, &mark, at.0 as i64, at.1 as i64);
        DynamicImage::ImageLuma8(page)
    }

    fn detector() -> SeparatorDetector {
        let mut detector = SeparatorDetector::new(&ScanConfig::default());
        detector.set_template(template());
        detector
    }

    #[test]
    fn matching_without_template_fails() {
        let detector = SeparatorDetector::new(&ScanConfig::default());
        let err = detector
            .matches_template(&DynamicImage::ImageLuma8(blank_page()), 0.5)
            .expect_err("no template");
        assert!(matches!(err, LabelwerkError::TemplateNotLoaded));
    }

    #[test]
    fn load_template_missing_is_not_found() {
        let mut detector = SeparatorDetector::new(&ScanConfig::default());
        let err = detector
            .load_template("/nonexistent/separator.png")
            .expect_err("missing");
        assert!(matches!(err, LabelwerkError::NotFound(_)));
    }

    #[test]
    fn load_template_undecodable_is_image_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("separator.png");
        std::fs::write(&path, b"garbage").expect("write");
        let mut detector = SeparatorDetector::new(&ScanConfig::default());
        let err = detector.load_template(&path).expect_err("garbage");
        assert!(matches!(err, LabelwerkError::ImageError(_)));
        assert!(!detector.has_template());
    }

    #[test]
    fn exact_copy_scores_one() {
        let mut source = blank_page();
        image::imageops::overlay(&mut source, &template(), 30, 40);
        let score = max_ncc(&source, &template());
        assert!(score > 0.999, "score {score}");
    }

    #[test]
    fn mark_found_at_every_ladder_scale() {
        let detector = detector();
        for scale in [0.5, 0.75, 1.0, 1.25, 1.5, 2.0] {
            let page = page_with_mark(scale, (17, 23));
            let score = detector.best_score(&page).expect("score");
            assert!(score >= 0.9, "scale {scale} scored {score}");
            assert!(detector.matches_template(&page, 0.5).expect("match"));
        }
    }

    #[test]
    fn blank_page_does_not_match() {
        let page = DynamicImage::ImageLuma8(blank_page());
        assert_eq!(detector().best_score(&page).expect("score"), 0.0);
        assert!(!detector().matches_template(&page, 0.5).expect("match"));
    }

    #[test]
    fn oversized_scales_are_skipped() {
        // 30x30 page: only scales up to 1.5 fit the 20px template.
        let mut page = GrayImage::from_pixel(30, 30, Luma([245]));
        image::imageops::overlay(&mut page, &template(), 5, 5);
        let score = detector()
            .best_score(&DynamicImage::ImageLuma8(page))
            .expect("score");
        assert!(score > 0.999);
    }

    /// 96x96 mark: thin dark frame around a 1 px checkerboard.
    fn textured_mark() -> GrayImage {
        GrayImage::from_fn(96, 96, |x, y| {
            let frame = x < 3 || y < 3 || x > 92 || y > 92;
            if frame {
                Luma([10])
            } else if (x + y) % 2 == 0 {
                Luma([40])
            } else {
                Luma([220])
            }
        })
    }

    /// Same frame as `textured_mark`, but a flat interior of the same mean.
    fn untextured_mark() -> GrayImage {
        GrayImage::from_fn(96, 96, |x, y| {
            let frame = x < 3 || y < 3 || x > 92 || y > 92;
            if frame { Luma([10]) } else { Luma([130]) }
        })
    }

    fn page_holding(mark: &GrayImage) -> GrayImage {
        let mut page = GrayImage::from_pixel(160, 160, Luma([245]));
        image::imageops::overlay(&mut page, mark, 30, 30);
        page
    }

    fn textured_detector(working_template_side: Option<u32>) -> SeparatorDetector {
        let mut detector = SeparatorDetector::new(&ScanConfig {
            scales: vec![1.0],
            working_template_side,
            ..ScanConfig::default()
        });
        detector.set_template(textured_mark());
        detector
    }

    #[test]
    fn page_without_template_detail_is_not_a_separator() {
        let impostor = DynamicImage::ImageLuma8(page_holding(&untextured_mark()));
        let genuine = DynamicImage::ImageLuma8(page_holding(&textured_mark()));

        let detector = textured_detector(None);
        let impostor_score = detector.best_score(&impostor).expect("score");
        assert!(impostor_score < 0.5, "impostor scored {impostor_score}");
        assert!(!detector.matches_template(&impostor, 0.5).expect("match"));
        assert!(detector.best_score(&genuine).expect("score") > 0.999);
    }

    #[test]
    fn working_resolution_never_exceeds_exact_score() {
        let impostor = DynamicImage::ImageLuma8(page_holding(&untextured_mark()));
        let genuine = DynamicImage::ImageLuma8(page_holding(&textured_mark()));

        let exact = textured_detector(None);
        let capped = textured_detector(Some(48));
        let exact_impostor = exact.best_score(&impostor).expect("score");
        let capped_impostor = capped.best_score(&impostor).expect("score");
        assert!(capped_impostor <= exact_impostor + 1e-9);
        assert!(!capped.matches_template(&impostor, 0.5).expect("match"));

        // The refinement pass still lands on the genuine mark.
        assert!(capped.best_score(&genuine).expect("score") > 0.999);
    }

    #[test]
    fn large_mark_found_through_working_resolution() {
        let big = scale_gray(&template(), 4.0).expect("big");
        let mut page = GrayImage::from_pixel(300, 300, Luma([245]));
        image::imageops::overlay(&mut page, &big, 65, 71);
        let score = score_at_scale(&page, &big, 1.0, Some(48))
            .expect("score")
            .expect("fits");
        assert!(score > 0.999, "score {score}");
    }

    #[test]
    fn scan_skips_failed_pages_and_is_deterministic() {
        let renderer = MemoryRenderer::new(vec![
            Some(DynamicImage::ImageLuma8(blank_page())),
            Some(page_with_mark(1.0, (50, 50))),
            None,
            Some(DynamicImage::ImageLuma8(blank_page())),
            Some(page_with_mark(0.75, (10, 90))),
        ]);
        let detector = detector();
        let first = detector
            .scan_document(&renderer, Path::new("doc"), 0.5, None)
            .expect("scan");
        assert_eq!(first, vec![2, 5]);
        // Every page is rendered once, at the scan resolution.
        assert_eq!(
            renderer.requests(),
            (1..=5).map(|page| (page, 150)).collect::<Vec<_>>()
        );
        let second = detector
            .scan_document(&renderer, Path::new("doc"), 0.5, None)
            .expect("scan");
        assert_eq!(first, second);
    }

    #[test]
    fn cancelled_scan_returns_partial_result() {
        let renderer = MemoryRenderer::new(vec![Some(page_with_mark(1.0, (5, 5))); 3]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let found = detector()
            .scan_document(&renderer, Path::new("doc"), 0.5, Some(&cancel))
            .expect("scan");
        assert!(found.is_empty());
        assert!(renderer.requests().is_empty());
    }
}
