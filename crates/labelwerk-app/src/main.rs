// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk: shipping-label separator detection, region OCR, and batch
// printing.
//
// Entry point. Initialises logging, loads configuration, and dispatches the
// command-line subcommands to the service layer.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use labelwerk_core::CancelToken;
use labelwerk_core::config::PrinterProfile;
use labelwerk_core::error::Result;
use labelwerk_core::types::{BatchResult, OcrRegion};

use services::app_services::{AppServices, OrderPrint};

#[derive(Parser)]
#[command(name = "labelwerk")]
#[command(about = "Separator detection, label OCR, and batch printing for shipping labels", long_about = None)]
struct Cli {
    /// Directory holding config.json (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find separator pages in a rendered document and list the groups
    Scan {
        /// Page image, or directory of page images in page order
        #[arg(short, long)]
        pages: PathBuf,

        /// Separator template image
        #[arg(short, long)]
        template: PathBuf,

        /// Match threshold (defaults to the configured value)
        #[arg(long)]
        threshold: Option<f64>,

        /// Resolution the page images were scanned at
        #[arg(long, default_value = "300")]
        source_dpi: u32,
    },

    /// Read the tracking number and package count from a label page
    Ocr {
        /// Rendered label page
        #[arg(short, long)]
        page_image: PathBuf,
    },

    /// Print one order: main page, eco codes, a barcode group, UK/EU barcodes
    Print {
        /// Main order PDF
        #[arg(long)]
        main: Option<PathBuf>,

        /// 1-based page of the main order PDF
        #[arg(long, default_value = "1")]
        page: u32,

        /// Eco-code PDF
        #[arg(long)]
        eco_code: Option<PathBuf>,

        /// Eco-code copies
        #[arg(long, default_value = "0")]
        eco_copies: u32,

        /// UK/EU barcode PDF
        #[arg(long)]
        uk_eu: Option<PathBuf>,

        /// UK/EU barcode copies
        #[arg(long, default_value = "0")]
        uk_eu_copies: u32,

        /// Take copy counts from the package count on this label page
        #[arg(long)]
        auto_copies_from: Option<PathBuf>,

        /// Barcode PDF to print a group from
        #[arg(long, requires_all = ["barcode_pages", "template", "group"])]
        barcodes: Option<PathBuf>,

        /// Rendered pages of the barcode PDF
        #[arg(long)]
        barcode_pages: Option<PathBuf>,

        /// Separator template image
        #[arg(long)]
        template: Option<PathBuf>,

        /// 1-based group number to print
        #[arg(long)]
        group: Option<usize>,

        /// Resolution the barcode page images were scanned at
        #[arg(long, default_value = "300")]
        source_dpi: u32,
    },

    /// List configured printers and whether they answer
    Printers,

    /// Show or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RegionField {
    TrackingNumber,
    PackageCount,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PrinterCategory {
    MainOrder,
    Barcode,
    EcoCode,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration as JSON
    Show,

    /// Choose the printer and paper size for a document category
    SetPrinter {
        #[arg(value_enum)]
        category: PrinterCategory,
        printer: String,
        width_mm: u32,
        height_mm: u32,
    },

    /// Set an OCR region in relative page coordinates
    SetRegion {
        #[arg(value_enum)]
        field: RegionField,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },

    /// Restore an OCR region to its default
    ResetRegion {
        #[arg(value_enum)]
        field: RegionField,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("Labelwerk starting");

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing current unit");
            on_interrupt.cancel();
        }
    });

    let mut services = AppServices::init(cli.data_dir);
    match run(cli.command, &mut services, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, services: &mut AppServices, cancel: &CancelToken) -> Result<()> {
    match command {
        Commands::Scan {
            pages,
            template,
            threshold,
            source_dpi,
        } => {
            services.set_source_dpi(source_dpi);
            let outcome = tokio::task::block_in_place(|| {
                services.scan_groups(&pages, &template, threshold, cancel)
            })?;

            println!("separator pages: {:?}", outcome.separators);
            for (index, (group, _)) in outcome.grouper.groups_with_state().enumerate() {
                println!(
                    "group {}: pages {}-{} ({} pages)",
                    index + 1,
                    group.start_page,
                    group.end_page,
                    group.page_count
                );
            }
            Ok(())
        }

        Commands::Ocr { page_image } => {
            let (tracking, packages) = recognize(services, &page_image)?;
            println!("tracking number: {tracking}");
            println!("package count:   {packages}");
            Ok(())
        }

        Commands::Print {
            main,
            page,
            eco_code,
            mut eco_copies,
            uk_eu,
            mut uk_eu_copies,
            auto_copies_from,
            barcodes,
            barcode_pages,
            template,
            group,
            source_dpi,
        } => {
            if let Some(label) = &auto_copies_from
                && let Some(count) = package_count(services, label)?.filter(|&n| n > 0)
            {
                tracing::info!(count, "copies taken from package count");
                eco_copies = count;
                if uk_eu.is_some() {
                    uk_eu_copies = count;
                }
            }

            services.set_source_dpi(source_dpi);
            let mut grouping = None;
            if let (Some(pages), Some(template)) = (&barcode_pages, &template) {
                let outcome = tokio::task::block_in_place(|| {
                    services.scan_groups(pages, template, None, cancel)
                })?;
                grouping = Some(outcome.grouper);
            }

            let selected = match (&grouping, group) {
                (Some(grouper), Some(number)) => Some(
                    grouper
                        .groups()
                        .get(number.wrapping_sub(1))
                        .cloned()
                        .ok_or_else(|| {
                            labelwerk_core::LabelwerkError::Validation(format!(
                                "no group {number} ({} groups found)",
                                grouper.groups().len()
                            ))
                        })?,
                ),
                _ => None,
            };

            let order = OrderPrint {
                main_pdf: main.as_deref(),
                page,
                eco_code: eco_code.as_deref().map(|p| (p, eco_copies)),
                barcode_group: barcodes.as_deref().zip(selected.as_ref()),
                uk_eu_barcode: uk_eu.as_deref().map(|p| (p, uk_eu_copies)),
            };
            let result = services.print_order(&order, grouping.as_mut(), cancel).await?;
            report(&result);

            if let (Some(grouper), Some(group)) = (&grouping, &selected)
                && grouper.is_printed(group.id)
            {
                println!("group {}-{} marked printed", group.start_page, group.end_page);
            }
            Ok(())
        }

        Commands::Printers => {
            for printer in services.printers().await? {
                println!(
                    "{}{}  {:?}",
                    printer.name,
                    if printer.is_default { " (default)" } else { "" },
                    printer.status
                );
            }
            Ok(())
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Show => {
                    println!("{}", serde_json::to_string_pretty(services.config())?);
                    return Ok(());
                }
                ConfigAction::SetPrinter {
                    category,
                    printer,
                    width_mm,
                    height_mm,
                } => {
                    let profile = PrinterProfile::new(printer, width_mm, height_mm);
                    let printers = &mut services.config_mut().printers;
                    match category {
                        PrinterCategory::MainOrder => printers.main_order = profile,
                        PrinterCategory::Barcode => printers.barcode = profile,
                        PrinterCategory::EcoCode => printers.eco_code = profile,
                    }
                }
                ConfigAction::SetRegion {
                    field,
                    x,
                    y,
                    width,
                    height,
                } => {
                    let region = OcrRegion::new(x, y, width, height);
                    region.validate()?;
                    let config = services.config_mut();
                    match field {
                        RegionField::TrackingNumber => config.tracking_number_region = region,
                        RegionField::PackageCount => config.package_count_region = region,
                    }
                }
                ConfigAction::ResetRegion { field } => {
                    let config = services.config_mut();
                    match field {
                        RegionField::TrackingNumber => config.reset_tracking_number_region(),
                        RegionField::PackageCount => config.reset_package_count_region(),
                    }
                }
            }
            services.save_config()?;
            println!("saved {}", services.data_dir().join("config.json").display());
            Ok(())
        }
    }
}

fn report(result: &BatchResult) {
    if result.failed_count == 0 && result.attempted() == result.total_jobs {
        println!("printed {} job(s)", result.success_count);
        return;
    }
    println!(
        "printed {} of {} job(s), {} failed",
        result.success_count, result.total_jobs, result.failed_count
    );
    for failed in &result.failed_jobs {
        println!("  - {}: {}", failed.job.description, failed.error);
    }
    if result.attempted() < result.total_jobs {
        println!("  cancelled after {} job(s)", result.attempted());
    }
}

#[cfg(feature = "ocr")]
fn recognize(services: &AppServices, page_image: &std::path::Path) -> Result<(String, String)> {
    let (tracking, packages) = services.recognize_label(page_image);
    Ok((
        tracking.display_text().to_string(),
        packages.display_text().to_string(),
    ))
}

#[cfg(not(feature = "ocr"))]
fn recognize(_services: &AppServices, _page_image: &std::path::Path) -> Result<(String, String)> {
    Err(ocr_unavailable())
}

#[cfg(feature = "ocr")]
fn package_count(services: &AppServices, page_image: &std::path::Path) -> Result<Option<u32>> {
    let (_, packages) = services.recognize_label(page_image);
    Ok(packages.count())
}

#[cfg(not(feature = "ocr"))]
fn package_count(_services: &AppServices, _page_image: &std::path::Path) -> Result<Option<u32>> {
    Err(ocr_unavailable())
}

#[cfg(not(feature = "ocr"))]
fn ocr_unavailable() -> labelwerk_core::LabelwerkError {
    labelwerk_core::LabelwerkError::Recognition(
        "built without OCR support; rebuild with `--features ocr`".into(),
    )
}
