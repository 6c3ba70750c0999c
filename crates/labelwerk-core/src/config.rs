// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration and its JSON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LabelwerkError, Result};
use crate::types::{MediaSize, OcrRegion};

/// File name of the persisted configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Sensible range for label paper, in millimetres.
pub const PAPER_MM_RANGE: std::ops::RangeInclusive<u32> = 10..=500;

/// Which printer and paper a category of document goes to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrinterProfile {
    pub printer_name: String,
    pub paper_width_mm: u32,
    pub paper_height_mm: u32,
}

impl PrinterProfile {
    pub fn new(printer_name: impl Into<String>, paper_width_mm: u32, paper_height_mm: u32) -> Self {
        Self {
            printer_name: printer_name.into(),
            paper_width_mm,
            paper_height_mm,
        }
    }

    pub fn has_valid_paper(&self) -> bool {
        PAPER_MM_RANGE.contains(&self.paper_width_mm)
            && PAPER_MM_RANGE.contains(&self.paper_height_mm)
    }
}

/// Printer profiles for the three document categories.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterProfiles {
    pub main_order: PrinterProfile,
    pub barcode: PrinterProfile,
    pub eco_code: PrinterProfile,
}

impl PrinterProfiles {
    /// Check every configured profile has a paper size in
    /// [`PAPER_MM_RANGE`]. Profiles without a printer name are not in use
    /// and are not checked.
    pub fn validate(&self) -> Result<()> {
        for (label, profile) in [
            ("main order", &self.main_order),
            ("barcode", &self.barcode),
            ("eco code", &self.eco_code),
        ] {
            if !profile.printer_name.is_empty() && !profile.has_valid_paper() {
                return Err(LabelwerkError::Validation(format!(
                    "{label} paper {}x{}mm outside {}-{}mm",
                    profile.paper_width_mm,
                    profile.paper_height_mm,
                    PAPER_MM_RANGE.start(),
                    PAPER_MM_RANGE.end()
                )));
            }
        }
        Ok(())
    }
}

fn default_raw_port() -> u16 {
    9100
}

/// A reachable printer: where to send jobs and what paper it knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterEndpoint {
    pub name: String,
    pub host: String,
    #[serde(default = "default_raw_port")]
    pub port: u16,
    #[serde(default)]
    pub is_default: bool,
    /// Predefined media sizes, in catalog order.
    #[serde(default)]
    pub media_sizes: Vec<MediaSize>,
}

/// Separator scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum normalised correlation for a separator match.
    pub threshold: f64,
    /// Resolution pages are rendered at for matching.
    pub scan_dpi: u32,
    /// Resolution of group preview thumbnails.
    pub preview_dpi: u32,
    /// Template scale factors tried against each page.
    pub scales: Vec<f64>,
    /// When set, scaled templates with a longer side above this many pixels
    /// are located at reduced resolution first and then scored exactly
    /// around the best candidates. `None` scores every position exactly.
    pub working_template_side: Option<u32>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            scan_dpi: 150,
            preview_dpi: 100,
            scales: vec![0.5, 0.75, 1.0, 1.25, 1.5, 2.0],
            working_template_side: None,
        }
    }
}

/// OCR engine and field-recognition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Directory holding `text-detection.rten` and `text-recognition.rten`.
    pub model_dir: Option<PathBuf>,
    pub tracking_language: String,
    pub package_language: String,
    /// Characters the package-count recogniser may emit.
    pub package_whitelist: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            tracking_language: "eng".into(),
            package_language: "chi_sim+eng".into(),
            package_whitelist: "0123456789件包共第（）/".into(),
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub printers: PrinterProfiles,
    pub endpoints: Vec<PrinterEndpoint>,
    pub tracking_number_region: OcrRegion,
    pub package_count_region: OcrRegion,
    pub scan: ScanConfig,
    pub ocr: OcrSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            printers: PrinterProfiles::default(),
            endpoints: Vec::new(),
            tracking_number_region: OcrRegion::TRACKING_NUMBER_DEFAULT,
            package_count_region: OcrRegion::PACKAGE_COUNT_DEFAULT,
            scan: ScanConfig::default(),
            ocr: OcrSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn reset_tracking_number_region(&mut self) {
        self.tracking_number_region = OcrRegion::TRACKING_NUMBER_DEFAULT;
    }

    pub fn reset_package_count_region(&mut self) {
        self.package_count_region = OcrRegion::PACKAGE_COUNT_DEFAULT;
    }

    // -- Persistence --------------------------------------------------------

    /// Load from `dir/config.json`.
    ///
    /// A missing file yields defaults, which are written out. An unreadable
    /// file falls back to `config.json.backup` (restoring it), then to
    /// defaults.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            let config = Self::default();
            if let Err(err) = config.save(dir) {
                warn!(error = %err, "could not write default config");
            }
            return config;
        }

        match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "config unreadable, trying backup");
                match read_config(&backup_path(&path)) {
                    Ok(config) => {
                        info!("restored config from backup");
                        if let Err(err) = config.save(dir) {
                            warn!(error = %err, "could not restore config file");
                        }
                        config
                    }
                    Err(_) => {
                        warn!("backup unusable, using defaults");
                        Self::default()
                    }
                }
            }
        }
    }

    /// Write `dir/config.json` as pretty JSON, copying any previous file to
    /// `config.json.backup` first.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(self)?;
        if path.exists() {
            std::fs::copy(&path, backup_path(&path))?;
        }
        std::fs::write(&path, json)?;
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

// ---------------------------------------------------------------------------
// Data directory
// ---------------------------------------------------------------------------

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = base_data_dir().join("labelwerk");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn base_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}
