// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline: separator detection, document grouping, and OCR
// preprocessing.

pub mod enhance;
pub mod group;
pub mod separator;

pub use enhance::ScanEnhancer;
pub use group::{DocumentGroup, DocumentGrouper, PrintState};
pub use separator::SeparatorDetector;
