// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer catalog: which printers exist, whether they answer, and which
// paper sizes they advertise.

use std::time::Duration;

use async_trait::async_trait;
use labelwerk_core::config::{AppConfig, PrinterEndpoint};
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{MediaSize, PrinterInfo, PrinterStatus};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Source of printer listings and paper capabilities.
#[async_trait]
pub trait PrinterCatalog: Send + Sync {
    async fn printers(&self) -> Result<Vec<PrinterInfo>>;

    /// Predefined media sizes for `printer_name`, in catalog order.
    async fn media_sizes(&self, printer_name: &str) -> Result<Vec<MediaSize>>;
}

/// Probe timeout for the reachability check.
pub const PROBE_TIMEOUT_SECS: u64 = 3;

/// Catalog backed by the configured printer endpoints.
pub struct ConfiguredCatalog {
    endpoints: Vec<PrinterEndpoint>,
    probe_timeout: Duration,
}

impl ConfiguredCatalog {
    pub fn new(endpoints: Vec<PrinterEndpoint>) -> Self {
        Self {
            endpoints,
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.endpoints.clone())
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// `Ready` if the printer accepts a TCP connection in time, else `Offline`.
    async fn probe(&self, endpoint: &PrinterEndpoint) -> PrinterStatus {
        let addr = format!("{}:{}", endpoint.host, endpoint.port);
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => PrinterStatus::Ready,
            Ok(Err(err)) => {
                debug!(addr = %addr, error = %err, "Printer refused connection");
                PrinterStatus::Offline
            }
            Err(_) => {
                debug!(addr = %addr, "Printer probe timed out");
                PrinterStatus::Offline
            }
        }
    }
}

#[async_trait]
impl PrinterCatalog for ConfiguredCatalog {
    #[instrument(skip_all, fields(count = self.endpoints.len()))]
    async fn printers(&self) -> Result<Vec<PrinterInfo>> {
        let mut printers = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            printers.push(PrinterInfo {
                name: endpoint.name.clone(),
                is_default: endpoint.is_default,
                status: self.probe(endpoint).await,
            });
        }
        Ok(printers)
    }

    async fn media_sizes(&self, printer_name: &str) -> Result<Vec<MediaSize>> {
        self.endpoints
            .iter()
            .find(|e| e.name == printer_name)
            .map(|e| e.media_sizes.clone())
            .ok_or_else(|| LabelwerkError::UnknownPrinter(printer_name.to_string()))
    }
}
