// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelwerk.

use thiserror::Error;

/// Top-level error type for all Labelwerk operations.
#[derive(Debug, Error)]
pub enum LabelwerkError {
    // -- Lookup errors --
    #[error("not found: {0}")]
    NotFound(String),

    #[error("no separator template loaded")]
    TemplateNotLoaded,

    // -- Recognition errors (logged, treated as "no match" / empty text) --
    #[error("recognition failed: {0}")]
    Recognition(String),

    // -- Pre-flight validation --
    #[error("validation failed: {0}")]
    Validation(String),

    // -- Print errors --
    #[error("print job failed: {0}")]
    JobFailed(String),

    #[error("print transport error: {0}")]
    PrintTransport(String),

    #[error("unknown printer: {0}")]
    UnknownPrinter(String),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LabelwerkError {
    /// Whether this error is a pre-flight validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelwerkError>;
