// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP printing (JetDirect, port 9100).
//
// Open a socket and stream the document. Label printers on the shop network
// accept PDF directly this way; there is no job tracking or paper
// negotiation, so the resolved paper size is only logged.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use labelwerk_core::config::{AppConfig, PrinterEndpoint};
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_document::PdfReader;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use crate::sink::{PrintSink, ResolvedJob};

/// Default raw TCP port (HP JetDirect).
pub const RAW_PORT: u16 = 9100;

/// Timeout for connecting to a printer.
pub const RAW_TIMEOUT_SECS: u64 = 60;

const CHUNK_SIZE: usize = 8192;

/// Stream `document_bytes` to `host:port`.
pub async fn send_raw(host: &str, port: u16, document_bytes: &[u8], timeout: Duration) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    info!(addr = %addr, total = document_bytes.len(), "Connecting via raw TCP");

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| {
            LabelwerkError::PrintTransport(format!(
                "connection to {} timed out after {}s",
                addr,
                timeout.as_secs()
            ))
        })?
        .map_err(|err| LabelwerkError::PrintTransport(format!("connect to {}: {}", addr, err)))?;

    let mut sent = 0;
    for chunk in document_bytes.chunks(CHUNK_SIZE) {
        stream.write_all(chunk).await.map_err(|err| {
            LabelwerkError::PrintTransport(format!("send to {} failed at byte {}: {}", addr, sent, err))
        })?;
        sent += chunk.len();
        debug!(sent, total = document_bytes.len(), "Raw TCP progress");
    }

    stream
        .flush()
        .await
        .map_err(|err| LabelwerkError::PrintTransport(format!("flush to {}: {}", addr, err)))?;
    stream
        .shutdown()
        .await
        .map_err(|err| LabelwerkError::PrintTransport(format!("shutdown {}: {}", addr, err)))?;

    info!(addr = %addr, total = document_bytes.len(), "Raw TCP job sent");
    Ok(())
}

/// Prints to the endpoints listed in the configuration.
pub struct RawTcpSink {
    endpoints: Vec<PrinterEndpoint>,
    timeout: Duration,
}

impl RawTcpSink {
    pub fn new(endpoints: Vec<PrinterEndpoint>) -> Self {
        Self {
            endpoints,
            timeout: Duration::from_secs(RAW_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.endpoints.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, printer_name: &str) -> Result<&PrinterEndpoint> {
        self.endpoints
            .iter()
            .find(|e| e.name == printer_name)
            .ok_or_else(|| LabelwerkError::UnknownPrinter(printer_name.to_string()))
    }
}

/// Read the job's document, narrowed to `pages` when a range was given.
async fn load_document(path: &Path, pages: &[u32]) -> Result<Vec<u8>> {
    let data = tokio::fs::read(path).await.map_err(|err| {
        LabelwerkError::JobFailed(format!("cannot read {}: {}", path.display(), err))
    })?;
    if pages.is_empty() {
        return Ok(data);
    }
    PdfReader::from_bytes(&data)?.extract_pages(pages)
}

#[async_trait]
impl PrintSink for RawTcpSink {
    #[instrument(skip_all, fields(printer = %job.printer_name(), copies = job.copies()))]
    async fn print(&self, job: &ResolvedJob) -> Result<()> {
        let endpoint = self.endpoint(job.printer_name())?;
        let document = load_document(&job.job.options.file_path, &job.pages).await?;

        let (width, height) = job.paper.dimensions();
        debug!(paper = job.paper.name(), width, height, "Paper selected");

        for copy in 1..=job.copies() {
            debug!(copy, "Sending copy");
            send_raw(&endpoint.host, endpoint.port, &document, self.timeout).await?;
        }
        Ok(())
    }
}
