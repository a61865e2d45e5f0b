// Entry point and high-level CLI flow.
//
// Every subcommand loads the input fresh, runs one analysis and writes its
// charts and exports into the output directory. A missing column is reported
// with the available columns and the analysis is skipped; other failures end
// the run with a non-zero exit code.
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use tracker_report::reports::{self, ReportContext};
use tracker_report::util::format_int;
use tracker_report::{Config, Result, TrackerError};

#[derive(Parser)]
#[command(name = "tracker-report")]
#[command(about = "Movement tracker analytics: counts, top-N rankings, forecasts, charts and a slide deck")]
#[command(version)]
struct Cli {
    /// TOML file overriding column names, labels and report parameters
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Movement tracker CSV
    #[arg(long, global = true)]
    movements: Option<PathBuf>,

    /// Invoice CSV
    #[arg(long, global = true)]
    invoices: Option<PathBuf>,

    /// Directory receiving charts and exports
    #[arg(short, long, global = true)]
    out_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Data preview, missing values, summary statistics and orders by status
    Status,
    /// Sent vs received orders, status and warehouse counts
    SentVsReceived,
    /// Top warehouses, status counts and per-direction monthly forecasts
    Warehouses,
    /// Top clients by inbound and outbound movements
    Clients,
    /// Monthly movement forecast up to the cutoff date, with client analysis
    Forecast,
    /// Daily cases with a linear trend projection
    DailyForecast,
    /// Invoice heat maps and per-item forecasts
    Invoices,
    /// Chart set plus the outbound analysis slide deck
    Presentation,
    /// Every movement analysis followed by summary.json
    All,
}

/// Missing columns and empty histories only skip the analysis that hit them.
fn skip_reportable(name: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_missing_column() || matches!(e, TrackerError::EmptyHistory) => {
            warn!("{}: {}", name, e);
            Ok(())
        }
        other => other,
    }
}

fn run(command: Commands, config: &Config) -> Result<()> {
    let ctx = ReportContext::new(config)?;
    if let Commands::Invoices = command {
        let invoices = reports::load_invoices(config)?;
        let report = ctx.invoice_report(&invoices)?;
        info!("Forecast {} invoice items", report.forecasts.len());
        return Ok(());
    }

    let table = reports::load_movements(config)?;
    println!(
        "Processing dataset... ({} rows loaded)\n",
        format_int(table.len())
    );
    match command {
        Commands::Status => {
            ctx.status_overview(&table)?;
        }
        Commands::SentVsReceived => {
            ctx.sent_vs_received(&table)?;
        }
        Commands::Warehouses => {
            ctx.warehouse_report(&table)?;
        }
        Commands::Clients => {
            ctx.client_movements(&table, None)?;
        }
        Commands::Forecast => {
            ctx.movement_forecast(&table)?;
        }
        Commands::DailyForecast => {
            ctx.daily_forecast(&table)?;
        }
        Commands::Presentation => {
            let report = ctx.presentation(&table)?;
            println!("Presentation saved to {}", report.deck_path.display());
        }
        Commands::All => {
            skip_reportable("status", ctx.status_overview(&table).map(|_| ()))?;
            skip_reportable("sent-vs-received", ctx.sent_vs_received(&table).map(|_| ()))?;
            skip_reportable("warehouses", ctx.warehouse_report(&table).map(|_| ()))?;
            skip_reportable("forecast", ctx.movement_forecast(&table).map(|_| ()))?;
            skip_reportable("daily-forecast", ctx.daily_forecast(&table).map(|_| ()))?;
            skip_reportable("presentation", ctx.presentation(&table).map(|_| ()))?;
            ctx.summary(&table)?;
        }
        // Handled before the tracker is loaded.
        Commands::Invoices => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(p) = cli.movements {
        config.movements_path = p;
    }
    if let Some(p) = cli.invoices {
        config.invoices_path = p;
    }
    if let Some(p) = cli.out_dir {
        config.output_dir = p;
    }

    match run(cli.command, &config) {
        Ok(()) => {
            let files = reports::written_files(&config.output_dir);
            println!(
                "Outputs saved to {} ({} files)",
                config.output_dir.display(),
                files.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) if e.is_missing_column() => {
            warn!("{}", e);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
