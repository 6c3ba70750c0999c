// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The seam between batch orchestration and whatever actually puts ink on
// labels.

use async_trait::async_trait;
use labelwerk_core::error::Result;
use labelwerk_core::types::{PaperSelection, PrintJob};

/// A job ready for dispatch: paper resolved and page range parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
    pub job: PrintJob,
    pub paper: PaperSelection,
    /// 1-based pages to print, ascending. Empty means every page.
    pub pages: Vec<u32>,
}

impl ResolvedJob {
    pub fn printer_name(&self) -> &str {
        &self.job.options.printer_name
    }

    pub fn copies(&self) -> u32 {
        self.job.options.copies
    }
}

/// Something that can print a resolved job.
///
/// Implementations must not retry on their own; a failure is reported once
/// and recorded against the job.
#[async_trait]
pub trait PrintSink: Send + Sync {
    async fn print(&self, job: &ResolvedJob) -> Result<()>;
}
