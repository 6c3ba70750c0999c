// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk Print: batch orchestration, paper-size resolution, page range
// parsing, and raw TCP delivery to label printers. Bridges the job types in
// `labelwerk-core` to the printers on the network.

pub mod catalog;
pub mod orchestrator;
pub mod page_range;
pub mod paper;
pub mod raw_client;
pub mod sink;

pub use catalog::{ConfiguredCatalog, PrinterCatalog};
pub use orchestrator::{BatchPrinter, ProgressSink};
pub use page_range::{MAX_PAGE_NUMBER, parse_page_range};
pub use paper::resolve_paper;
pub use raw_client::RawTcpSink;
pub use sink::{PrintSink, ResolvedJob};
