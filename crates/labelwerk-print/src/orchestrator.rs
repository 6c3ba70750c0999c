// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch printing: validate every job up front, then dispatch them one at a
// time, isolating failures and honouring cancellation between jobs.

use labelwerk_core::CancelToken;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{BatchResult, PrintJob};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::catalog::PrinterCatalog;
use crate::page_range::parse_page_range;
use crate::paper::resolve_paper;
use crate::sink::{PrintSink, ResolvedJob};

/// Receives the number of attempted jobs after each one finishes.
///
/// Called on the printing task; implementations must return promptly.
pub trait ProgressSink: Send + Sync {
    fn report(&self, attempted: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize) + Send + Sync,
{
    fn report(&self, attempted: usize) {
        self(attempted)
    }
}

impl ProgressSink for watch::Sender<usize> {
    fn report(&self, attempted: usize) {
        // Never blocks, and keeps the latest value even with no receivers.
        self.send_replace(attempted);
    }
}

/// Prints batches of jobs through a single sink.
pub struct BatchPrinter<S, C> {
    sink: S,
    catalog: C,
}

impl<S: PrintSink, C: PrinterCatalog> BatchPrinter<S, C> {
    pub fn new(sink: S, catalog: C) -> Self {
        Self { sink, catalog }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Print `jobs` in order.
    ///
    /// Only pre-flight validation fails the call; in that case nothing is
    /// printed. Individual job failures are collected in the result and the
    /// batch carries on. When `cancel` fires, the job in flight finishes and
    /// the partial result is returned.
    #[instrument(skip_all, fields(jobs = jobs.len()))]
    pub async fn print_batch(
        &self,
        jobs: &[PrintJob],
        progress: Option<&dyn ProgressSink>,
        cancel: Option<&CancelToken>,
    ) -> Result<BatchResult> {
        validate_jobs(jobs)?;

        let mut result = BatchResult::new(jobs.len());
        for job in jobs {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                info!(attempted = result.attempted(), "Batch cancelled");
                break;
            }

            match self.dispatch(job).await {
                Ok(()) => {
                    debug!(job = %job.description, "Job printed");
                    result.record_success();
                }
                Err(err) => {
                    warn!(job = %job.description, error = %err, "Job failed");
                    result.record_failure(job.clone(), err.to_string());
                }
            }

            if let Some(progress) = progress {
                progress.report(result.attempted());
            }
        }

        info!(
            total = result.total_jobs,
            succeeded = result.success_count,
            failed = result.failed_count,
            "Batch finished"
        );
        Ok(result)
    }

    async fn dispatch(&self, job: &PrintJob) -> Result<()> {
        let resolved = self.resolve(job).await?;
        self.sink.print(&resolved).await
    }

    /// Resolve paper and pages for `job`.
    ///
    /// If the catalog cannot list sizes for the printer, a custom size is
    /// used. A page range that selects nothing is an error rather than "all
    /// pages".
    pub async fn resolve(&self, job: &PrintJob) -> Result<ResolvedJob> {
        let options = &job.options;
        let sizes = match self.catalog.media_sizes(&options.printer_name).await {
            Ok(sizes) => sizes,
            Err(err) => {
                warn!(printer = %options.printer_name, error = %err, "Cannot list paper sizes, using custom size");
                Vec::new()
            }
        };
        let paper = resolve_paper(options.paper_width_mm, options.paper_height_mm, &sizes);

        let pages = match options.page_range.as_deref() {
            Some(spec) if !spec.trim().is_empty() => {
                let pages = parse_page_range(spec);
                if pages.is_empty() {
                    return Err(LabelwerkError::JobFailed(format!(
                        "page range \"{spec}\" selects no pages"
                    )));
                }
                pages
            }
            _ => Vec::new(),
        };

        Ok(ResolvedJob {
            job: job.clone(),
            paper,
            pages,
        })
    }
}

fn validate_jobs(jobs: &[PrintJob]) -> Result<()> {
    for (index, job) in jobs.iter().enumerate() {
        job.options.validate().map_err(|err| match err {
            LabelwerkError::Validation(msg) => LabelwerkError::Validation(format!(
                "job {} ({}): {}",
                index + 1,
                job.description,
                msg
            )),
            other => other,
        })?;
    }
    Ok(())
}
