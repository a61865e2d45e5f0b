//! Report builders. Each public function corresponds to one analysis of the
//! movement tracker (or the invoice sheet): it aggregates, writes charts and
//! CSV exports into the output directory, prints a short console preview and
//! returns the computed figures.

use crate::chart::{self, Captions, Fill, ForecastLine};
use crate::config::Config;
use crate::deck::Deck;
use crate::error::{Result, TrackerError};
use crate::forecast::{forecast, Forecast, ForecastStrategy};
use crate::loader::Table;
use crate::output::{self, preview_table_rows};
use crate::pipeline::{
    crosstab, histogram, period_crosstab, period_series, value_counts, Aggregate, AggregateTable, CrossTab,
    Period, Predicate,
};
use crate::rank::{top_n, top_n_rows};
use crate::types::{CountRow, ForecastRow, SentReceived, SummaryStats};
use crate::util::{average, days_diff, format_int, format_number};
use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const STATUS_BAR: &str = "orders_by_status_bar_chart.svg";
const WAREHOUSE_BAR: &str = "top_warehouses_bar_chart.svg";
const WAREHOUSE_PIE: &str = "warehouse_distribution_pie_chart.svg";
const SENT_RECEIVED_BAR: &str = "sent_vs_received_bar_chart.svg";
const OUTBOUND_LINE: &str = "outbound_movements_over_time.svg";
const OUTBOUND_FORECAST: &str = "outbound_forecast.svg";
const INBOUND_FORECAST: &str = "inbound_forecast.svg";
const MOVEMENTS_FORECAST: &str = "movements_forecast.svg";
const OUTBOUND_HISTOGRAM: &str = "quantity_distribution_histogram.svg";
const INBOUND_HISTOGRAM: &str = "inbound_quantity_distribution_histogram.svg";
const CLIENTS_BAR: &str = "top_clients_movements_bar_chart.svg";
const CLIENTS_PIE: &str = "client_movement_distribution_pie_chart.svg";
const DIRECTION_PIE: &str = "inbound_vs_outbound_pie_chart.svg";
const DAILY_FORECAST: &str = "daily_cases_forecast.svg";
const INVOICE_MONTHLY_HEATMAP: &str = "invoice_monthly_heatmap.svg";
const INVOICE_WEEKLY_HEATMAP: &str = "invoice_weekly_heatmap.svg";
const INVOICE_PREDICTED_BAR: &str = "invoice_predicted_totals.svg";
const INVOICE_HISTOGRAM: &str = "invoice_quantity_histogram.svg";

/// Rows a branch covers. Cutoff outputs get their own file names so the
/// whole-tracker exports of the same chart survive an `all` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Full,
    Cutoff,
}

fn scoped_name(file: &str, scope: Scope) -> String {
    match scope {
        Scope::Full => file.to_string(),
        Scope::Cutoff => match file.rsplit_once('.') {
            Some((stem, ext)) => format!("{}_cutoff.{}", stem, ext),
            None => format!("{}_cutoff", file),
        },
    }
}

/// Shared state for one run: configuration and the resolved output directory.
pub struct ReportContext<'a> {
    pub config: &'a Config,
    pub out_dir: PathBuf,
}

/// Run a report branch. A missing column or an empty history is reported
/// and the branch is skipped; anything else aborts the report.
fn guarded<T>(branch: &str, r: Result<T>) -> Result<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(TrackerError::MissingColumn { name, available }) => {
            warn!(
                "{}: '{}' column not found, skipping. Available columns are: {}",
                branch,
                name,
                available.join(", ")
            );
            Ok(None)
        }
        Err(TrackerError::EmptyHistory) => {
            warn!("{}: no historical periods to forecast from, skipping", branch);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn print_counts(title: &str, agg: &AggregateTable, max_rows: usize) {
    println!("\n{}:", title);
    preview_table_rows(&CountRow::from_aggregate(agg), max_rows);
}

fn month_day_label(iso: &str) -> String {
    NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .map(|d| d.format("%b %d").to_string())
        .unwrap_or_else(|_| iso.to_string())
}

fn file_slug(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

/// Slug for `name` not yet in `used`. A colliding slug gets the item's
/// position appended, then a counter if that is taken too.
fn unique_slug(name: &str, index: usize, used: &mut HashSet<String>) -> String {
    let base = file_slug(name);
    let mut slug = base.clone();
    let mut n = index + 1;
    while used.contains(&slug) {
        slug = format!("{}_{}", base, n);
        n += 1;
    }
    used.insert(slug.clone());
    slug
}

/// Load the movement tracker and coerce its date and quantity columns.
/// Absent columns are left for the individual branches to report.
pub fn load_movements(config: &Config) -> Result<Table> {
    let (mut table, report) = Table::from_path(&config.movements_path)?;
    if report.ragged_rows > 0 {
        warn!("{} rows had an unexpected number of fields", report.ragged_rows);
    }
    let dropped = table.drop_empty_rows();
    if dropped > 0 {
        info!("Dropped {} empty rows", dropped);
    }
    let cols = &config.movement_columns;
    for name in [&cols.sending_date, &cols.receiving_date] {
        if table.has_column(name) {
            table.coerce_dates(name)?;
        }
    }
    if table.has_column(&cols.quantity) {
        table.coerce_numbers(&cols.quantity)?;
    }
    Ok(table)
}

pub fn load_invoices(config: &Config) -> Result<Table> {
    let (mut table, _) = Table::from_path(&config.invoices_path)?;
    table.drop_empty_rows();
    Ok(table)
}

#[derive(Debug, Clone)]
pub struct StatusOverview {
    pub rows: usize,
    pub outbound: Option<usize>,
    pub status_counts: Option<AggregateTable>,
}

#[derive(Debug, Clone)]
pub struct SentReceivedReport {
    pub totals: Option<SentReceived>,
    pub status_counts: Option<AggregateTable>,
    pub warehouse_counts: Option<AggregateTable>,
}

#[derive(Debug, Clone)]
pub struct WarehouseReport {
    pub top_warehouses: Option<AggregateTable>,
    pub status_counts: Option<AggregateTable>,
    pub outbound: Option<Forecast>,
    pub inbound: Option<Forecast>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientReport {
    pub top_clients: CrossTab,
    pub inbound_total: f64,
    pub outbound_total: f64,
}

#[derive(Debug, Clone)]
pub struct MovementForecastReport {
    pub outbound: Option<Forecast>,
    pub inbound: Option<Forecast>,
    pub clients: Option<ClientReport>,
}

#[derive(Debug, Clone)]
pub struct InvoiceReport {
    pub monthly: CrossTab,
    pub weekly: CrossTab,
    pub forecasts: Vec<(String, Forecast)>,
    pub predicted_totals: AggregateTable,
}

#[derive(Debug, Clone)]
pub struct PresentationReport {
    pub deck: Deck,
    pub deck_path: PathBuf,
}

impl<'a> ReportContext<'a> {
    pub fn new(config: &'a Config) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        Ok(ReportContext {
            config,
            out_dir: config.output_dir.clone(),
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.out_dir.join(file)
    }

    fn scoped_path(&self, file: &str, scope: Scope) -> PathBuf {
        self.out_dir.join(scoped_name(file, scope))
    }

    fn cutoff(&self, table: &Table) -> Result<Table> {
        let cols = &self.config.movement_columns;
        let kept = table.filter(&Predicate::on_or_before(&cols.sending_date, self.config.cutoff_date))?;
        info!(
            "Kept {} of {} rows sent on or before {}",
            kept.len(),
            table.len(),
            self.config.cutoff_date
        );
        Ok(kept)
    }

    fn direction(&self, table: &Table, label: &str) -> Result<Table> {
        table.filter(&Predicate::equals(&self.config.movement_columns.movement_type, label))
    }

    fn status_chart(&self, table: &Table, title: &str, scope: Scope) -> Result<(AggregateTable, PathBuf)> {
        let counts = value_counts(table, &self.config.movement_columns.status)?;
        let path = self.scoped_path(STATUS_BAR, scope);
        chart::bar_chart(
            &path,
            Captions { title, x: "Status", y: "Count" },
            &counts.labelled(),
            Fill::SkyBlue,
        )?;
        output::write_csv(
            &self.scoped_path("orders_by_status.csv", scope),
            &CountRow::from_aggregate(&counts),
        )?;
        Ok((counts, path))
    }

    fn warehouse_charts(&self, table: &Table, suffix: &str, scope: Scope) -> Result<(AggregateTable, PathBuf, PathBuf)> {
        let n = self.config.top_n;
        let counts = value_counts(table, &self.config.movement_columns.warehouse)?;
        let top = top_n(&counts, n);
        let bar = self.scoped_path(WAREHOUSE_BAR, scope);
        chart::bar_chart(
            &bar,
            Captions {
                title: &format!("Top {} Warehouses by Order Count{}", n, suffix),
                x: "Warehouse",
                y: "Count",
            },
            &top.labelled(),
            Fill::LightGreen,
        )?;
        let pie = self.scoped_path(WAREHOUSE_PIE, scope);
        chart::pie_chart(
            &pie,
            &format!("Distribution of Orders by Top {} Warehouses{}", n, suffix),
            &top.labelled(),
        )?;
        output::write_csv(&self.scoped_path("top_warehouses.csv", scope), &CountRow::from_aggregate(&top))?;
        Ok((top, bar, pie))
    }

    fn monthly_forecast(&self, table: &Table, label: &str, scope: Scope) -> Result<Forecast> {
        let rows = self.direction(table, label)?;
        let series = period_series(
            &rows,
            &self.config.movement_columns.sending_date,
            Period::Month,
            &Aggregate::Count,
        )?;
        let f = forecast(
            &series,
            ForecastStrategy::MovingAverage {
                window: self.config.moving_average_window,
            },
            self.config.forecast_periods,
        )?;
        output::write_csv(
            &self.scoped_path(&format!("{}_monthly_forecast.csv", file_slug(label)), scope),
            &ForecastRow::from_forecast(&f),
        )?;
        Ok(f)
    }

    fn quantity_histogram(&self, rows: &Table, file: &str, title: &str, fill: Fill) -> Result<Option<PathBuf>> {
        let values = rows.numbers(&self.config.movement_columns.quantity)?;
        if values.is_empty() {
            warn!(
                "Column '{}' contains no data, skipping histogram",
                self.config.movement_columns.quantity
            );
            return Ok(None);
        }
        let path = self.path(file);
        chart::histogram_chart(
            &path,
            Captions {
                title,
                x: "Quantity of Cases",
                y: "Frequency",
            },
            &histogram(&values, self.config.histogram_bins),
            fill,
        )?;
        Ok(Some(path))
    }

    /// Data preview, missing values, summary statistics and counts by status.
    pub fn status_overview(&self, table: &Table) -> Result<StatusOverview> {
        println!("Data Preview:");
        println!("{}\n", output::render_head(table, self.config.preview_rows));
        println!("Missing Values:");
        println!("{}\n", output::render_missing(&table.missing_counts()));
        println!("Summary Statistics:");
        println!("{}\n", output::render_describe(&table.describe()));

        let outbound = guarded(
            "Outbound movements",
            self.direction(table, &self.config.labels.outbound).map(|t| t.len()),
        )?;
        if let Some(n) = outbound {
            println!("Outbound Movements: {}", format_int(n));
        }

        let status_counts = guarded(
            "Orders by status",
            self.status_chart(table, "Count of Orders by Status", Scope::Full),
        )?
        .map(|(counts, _)| counts);
        if let Some(counts) = &status_counts {
            print_counts("Count of Orders by Status", counts, counts.len());
        }
        Ok(StatusOverview {
            rows: table.len(),
            outbound,
            status_counts,
        })
    }

    /// Sent against received counts plus the status and warehouse breakdowns.
    pub fn sent_vs_received(&self, table: &Table) -> Result<SentReceivedReport> {
        let labels = &self.config.labels;
        let totals = guarded("Sent vs received", sent_received(table, self))?;
        if let Some(t) = &totals {
            println!("\nTotal Sent Orders: {}", format_int(t.sent));
            println!("Total Received Orders: {}", format_int(t.received));
            println!("Difference between Sent and Received Orders: {}", t.difference);
            chart::bar_chart(
                &self.path(SENT_RECEIVED_BAR),
                Captions {
                    title: "Comparison of Sent vs. Received Orders",
                    x: "Order Status",
                    y: "Count",
                },
                &[
                    (labels.sent.clone(), t.sent as f64),
                    (labels.received.clone(), t.received as f64),
                ],
                Fill::SkyBlue,
            )?;
        }

        let status_counts = guarded(
            "Orders by status",
            value_counts(table, &self.config.movement_columns.status),
        )?;
        if let Some(counts) = &status_counts {
            print_counts("Count of Orders by Status", counts, counts.len());
        }

        let warehouse_counts = guarded(
            "Orders by warehouse",
            value_counts(table, &self.config.movement_columns.warehouse),
        )?;
        if let Some(counts) = &warehouse_counts {
            print_counts("Count of Orders by Warehouse", counts, counts.len());
            chart::bar_chart(
                &self.path("orders_by_warehouse_bar_chart.svg"),
                Captions {
                    title: "Count of Orders by Warehouse",
                    x: "Warehouse",
                    y: "Count",
                },
                &counts.labelled(),
                Fill::LightGreen,
            )?;
        }
        Ok(SentReceivedReport {
            totals,
            status_counts,
            warehouse_counts,
        })
    }

    /// Top warehouses, status counts and per-direction monthly forecasts.
    pub fn warehouse_report(&self, table: &Table) -> Result<WarehouseReport> {
        // Every branch below depends on the send date.
        table.column(&self.config.movement_columns.sending_date)?;

        let top_warehouses = guarded("Top warehouses", self.warehouse_charts(table, "", Scope::Full))?.map(|(top, _, _)| top);
        if let Some(top) = &top_warehouses {
            print_counts("Top Warehouses by Order Count", top, top.len());
        }

        let status_counts = guarded(
            "Orders by status",
            self.status_chart(table, "Count of Orders by Status", Scope::Full),
        )?
        .map(|(c, _)| c);

        let labels = &self.config.labels;
        let mut forecasts = Vec::new();
        for (label, file, hist_file, fill, hist_fill) in [
            (&labels.outbound, OUTBOUND_FORECAST, OUTBOUND_HISTOGRAM, Fill::Orange, Fill::LightCoral),
            (&labels.inbound, INBOUND_FORECAST, INBOUND_HISTOGRAM, Fill::Green, Fill::SkyBlue),
        ] {
            let f = guarded(&format!("{} forecast", label), self.monthly_forecast(table, label, Scope::Full))?;
            if let Some(f) = &f {
                chart::forecast_chart(
                    &self.path(file),
                    Captions {
                        title: &format!(
                            "{} Movements Forecast for Next {} Months",
                            label, self.config.forecast_periods
                        ),
                        x: "Date",
                        y: &format!("Count of {} Cases", label),
                    },
                    &[ForecastLine { label, forecast: f, color: fill }],
                    None,
                )?;
                preview_table_rows(&ForecastRow::from_forecast(f), usize::MAX);
            }
            guarded(
                &format!("{} quantity distribution", label),
                self.direction(table, label).and_then(|rows| {
                    self.quantity_histogram(
                        &rows,
                        hist_file,
                        &format!("Distribution of Quantities for {} Movements", label),
                        hist_fill,
                    )
                }),
            )?;
            forecasts.push(f);
        }
        let inbound = forecasts.pop().flatten();
        let outbound = forecasts.pop().flatten();
        Ok(WarehouseReport {
            top_warehouses,
            status_counts,
            outbound,
            inbound,
        })
    }

    /// Clients x direction counts, the top clients by total movements and
    /// the inbound/outbound split among them.
    pub fn client_movements(&self, table: &Table, until: Option<&str>) -> Result<ClientReport> {
        let suffix = until.map(|u| format!(" (Up to {})", u)).unwrap_or_default();
        let scope = if until.is_some() { Scope::Cutoff } else { Scope::Full };
        let cols = &self.config.movement_columns;
        let labels = &self.config.labels;
        let n = self.config.top_n;
        let counts = crosstab(table, &cols.client, &cols.movement_type, &Aggregate::Count)?
            .merge_rows(self.config.client_key_normalization);
        let top = top_n_rows(&counts, n);
        output::write_crosstab_csv(&self.scoped_path("top_clients_movements.csv", scope), &cols.client, &top)?;
        println!("\nTop {} Clients by Movements{}:", n, suffix);
        println!("{}\n", output::render_crosstab(&cols.client, &top));

        chart::stacked_bar_chart(
            &self.scoped_path(CLIENTS_BAR, scope),
            Captions {
                title: &format!("Top {} Clients: Inbound and Outbound Movements{}", n, suffix),
                x: "Clients",
                y: "Number of Movements",
            },
            &top,
        )?;
        chart::pie_chart(
            &self.scoped_path(CLIENTS_PIE, scope),
            &format!("Percentage of Total Movements for Top {} Clients{}", n, suffix),
            &top.row_totals().labelled(),
        )?;

        let inbound_total = top.column_total(&labels.inbound);
        let outbound_total = top.column_total(&labels.outbound);
        chart::pie_chart(
            &self.scoped_path(DIRECTION_PIE, scope),
            &match until {
                Some(u) => format!("Total Inbound vs Outbound Movements (Top Clients, Up to {})", u),
                None => "Total Inbound vs Outbound Movements (Top Clients)".to_string(),
            },
            &[
                ("Total Inbound".to_string(), inbound_total),
                ("Total Outbound".to_string(), outbound_total),
            ],
        )?;
        Ok(ClientReport {
            top_clients: top,
            inbound_total,
            outbound_total,
        })
    }

    /// Monthly outbound and inbound counts up to the cutoff with a flat
    /// moving-average forecast, the outbound quantity distribution and the
    /// client analysis over the same rows.
    pub fn movement_forecast(&self, table: &Table) -> Result<MovementForecastReport> {
        let rows = self.cutoff(table)?;
        let labels = &self.config.labels;
        let until = self.config.cutoff_date.format("%B %Y").to_string();

        let outbound = guarded("Outbound forecast", self.monthly_forecast(&rows, &labels.outbound, Scope::Cutoff))?;
        let inbound = guarded("Inbound forecast", self.monthly_forecast(&rows, &labels.inbound, Scope::Cutoff))?;
        let mut lines = Vec::new();
        if let Some(f) = &outbound {
            lines.push(ForecastLine { label: &labels.outbound, forecast: f, color: Fill::Blue });
        }
        if let Some(f) = &inbound {
            lines.push(ForecastLine { label: &labels.inbound, forecast: f, color: Fill::Green });
        }
        if !lines.is_empty() {
            let first_year = NaiveDate::from_ymd_opt(self.config.cutoff_date.year(), 1, 1);
            chart::forecast_chart(
                &self.path(MOVEMENTS_FORECAST),
                Captions {
                    title: &format!(
                        "Outbound and Inbound Movements Forecast for Next {} Months",
                        self.config.forecast_periods
                    ),
                    x: "Date",
                    y: "Count of Movements",
                },
                &lines,
                first_year,
            )?;
        }

        guarded(
            "Outbound quantity distribution",
            self.direction(&rows, &labels.outbound).and_then(|outbound_rows| {
                self.quantity_histogram(
                    &outbound_rows,
                    &scoped_name(OUTBOUND_HISTOGRAM, Scope::Cutoff),
                    &format!("Distribution of Quantities for Outbound Movements (Up to {})", until),
                    Fill::LightCoral,
                )
            }),
        )?;

        let clients = guarded("Client movements", self.client_movements(&rows, Some(&until)))?;
        Ok(MovementForecastReport {
            outbound,
            inbound,
            clients,
        })
    }

    /// Daily case totals with a least-squares trend projected forward.
    pub fn daily_forecast(&self, table: &Table) -> Result<Forecast> {
        let cols = &self.config.movement_columns;
        let series = period_series(
            table,
            &cols.sending_date,
            Period::Day,
            &Aggregate::Sum(cols.quantity.clone()),
        )?;
        let f = forecast(&series, ForecastStrategy::LinearTrend, self.config.daily_forecast_days)?;
        if let Some(fit) = f.fit {
            println!(
                "\nDaily cases trend: {} cases/day (intercept {})",
                format_number(fit.slope, 3),
                format_number(fit.intercept, 2)
            );
        }
        output::write_csv(&self.path("daily_cases_forecast.csv"), &ForecastRow::from_forecast(&f))?;
        let start = series
            .points
            .first()
            .and_then(|p| NaiveDate::from_ymd_opt(p.period.year(), 1, 1));
        chart::forecast_chart(
            &self.path(DAILY_FORECAST),
            Captions {
                title: &format!(
                    "Quantity of Cases Prediction for Next {} Days",
                    self.config.daily_forecast_days
                ),
                x: "Date",
                y: "Quantity of Cases",
            },
            &[ForecastLine { label: "Cases", forecast: &f, color: Fill::Orange }],
            start,
        )?;
        Ok(f)
    }

    /// Item x month and item x week heat maps, per-item monthly forecasts
    /// and the invoice quantity distribution.
    pub fn invoice_report(&self, invoices: &Table) -> Result<InvoiceReport> {
        let cols = &self.config.invoice_columns;
        let mut table = invoices.clone();
        table.coerce_dates(&cols.date)?;
        println!("Missing Values:");
        println!("{}\n", output::render_missing(&table.missing_counts()));
        table.coerce_numbers(&cols.quantity)?;
        let qty_col = table.column(&cols.quantity)?;
        let table = table.retain_rows(|r| !r[qty_col].is_missing());
        let sum = Aggregate::Sum(cols.quantity.clone());

        let monthly = period_crosstab(&table, &cols.item, &cols.date, Period::Month, &sum)?;
        let weekly = period_crosstab(&table, &cols.item, &cols.date, Period::Week, &sum)?;
        for (data, file, title, x) in [
            (&monthly, INVOICE_MONTHLY_HEATMAP, "Monthly Quantity Breakdown by Item", "Month and Day"),
            (&weekly, INVOICE_WEEKLY_HEATMAP, "Weekly Quantity Breakdown by Item", "Week"),
        ] {
            let column_labels: Vec<String> = data.columns.iter().map(|c| month_day_label(c)).collect();
            chart::heatmap(&self.path(file), Captions { title, x, y: &cols.item }, data, &column_labels)?;
        }
        output::write_crosstab_csv(&self.path("invoice_monthly_by_item.csv"), &cols.item, &monthly)?;
        output::write_crosstab_csv(&self.path("invoice_weekly_by_item.csv"), &cols.item, &weekly)?;

        let strategy = ForecastStrategy::MovingAverage {
            window: self.config.moving_average_window,
        };
        let mut forecasts = Vec::new();
        let mut predicted_totals = AggregateTable::new();
        let mut slugs = HashSet::new();
        for (i, item) in monthly.rows.iter().enumerate() {
            let slug = unique_slug(item, i, &mut slugs);
            let rows = table.filter(&Predicate::equals(&cols.item, item))?;
            let series = period_series(&rows, &cols.date, Period::Month, &sum)?.fill_gaps();
            let Some(f) = guarded(&format!("Forecast for {}", item), forecast(&series, strategy, self.config.forecast_periods))? else {
                continue;
            };
            chart::forecast_chart(
                &self.path(&format!("invoice_forecast_{}.svg", slug)),
                Captions {
                    title: &format!("Forecast for {}", item),
                    x: "Date",
                    y: "Quantity Sold",
                },
                &[ForecastLine { label: item, forecast: &f, color: Fill::Orange }],
                None,
            )?;
            predicted_totals.add(vec![item.clone()], f.predicted_total());
            forecasts.push((item.clone(), f));
        }

        print_counts("Total Predicted Quantities by Item", &predicted_totals, predicted_totals.len());
        chart::bar_chart(
            &self.path(INVOICE_PREDICTED_BAR),
            Captions {
                title: "Total Predicted Quantities by Item",
                x: &cols.item,
                y: "Total Predicted Quantity",
            },
            &predicted_totals.labelled(),
            Fill::SkyBlue,
        )?;
        output::write_csv(
            &self.path("invoice_predicted_totals.csv"),
            &CountRow::from_aggregate(&predicted_totals),
        )?;

        let quantities = table.numbers(&cols.quantity)?;
        if quantities.is_empty() {
            warn!("Column '{}' contains no data in the invoices", cols.quantity);
        } else {
            chart::histogram_chart(
                &self.path(INVOICE_HISTOGRAM),
                Captions {
                    title: "Distribution of Quantities for Invoices",
                    x: "Quantity of Cases",
                    y: "Frequency",
                },
                &histogram(&quantities, self.config.histogram_bins),
                Fill::LightCoral,
            )?;
        }

        Ok(InvoiceReport {
            monthly,
            weekly,
            forecasts,
            predicted_totals,
        })
    }

    fn outbound_line_chart(&self, outbound: &Table, suffix: &str) -> Result<PathBuf> {
        let series = period_series(
            outbound,
            &self.config.movement_columns.sending_date,
            Period::Month,
            &Aggregate::Count,
        )?;
        // Zero horizon: history only, no projection.
        let history = forecast(
            &series,
            ForecastStrategy::MovingAverage {
                window: self.config.moving_average_window,
            },
            0,
        )?;
        let path = self.scoped_path(OUTBOUND_LINE, Scope::Cutoff);
        chart::forecast_chart(
            &path,
            Captions {
                title: &format!("Outbound Movements Over Time{}", suffix),
                x: "Date",
                y: "Count of Outbound Cases",
            },
            &[ForecastLine {
                label: &self.config.labels.outbound,
                forecast: &history,
                color: Fill::Orange,
            }],
            None,
        )?;
        Ok(path)
    }

    /// Render the chart set for rows up to the cutoff and assemble the
    /// outbound analysis slide deck around it.
    pub fn presentation(&self, table: &Table) -> Result<PresentationReport> {
        let rows = self.cutoff(table)?;
        let labels = &self.config.labels;
        let n = self.config.top_n;
        let until = self.config.cutoff_date.format("%B %Y").to_string();
        let suffix = format!(" (Up to {})", until);

        let warehouses = guarded("Top warehouses", self.warehouse_charts(&rows, &suffix, Scope::Cutoff))?;
        let status = guarded(
            "Orders by status",
            self.status_chart(&rows, &format!("Count of Orders by Status{}", suffix), Scope::Cutoff),
        )?;

        let outbound_rows = guarded("Outbound movements", self.direction(&rows, &labels.outbound))?;
        let outbound_line = match &outbound_rows {
            None => None,
            Some(outbound) => guarded(
                "Outbound movements over time",
                self.outbound_line_chart(outbound, &suffix),
            )?,
        };
        let histogram_path = match &outbound_rows {
            None => None,
            Some(outbound) => guarded(
                "Outbound quantity distribution",
                self.quantity_histogram(
                    outbound,
                    &scoped_name(OUTBOUND_HISTOGRAM, Scope::Cutoff),
                    &format!("Distribution of Quantities for Outbound Movements{}", suffix),
                    Fill::LightCoral,
                ),
            )?
            .flatten(),
        };
        let clients = guarded("Client movements", self.client_movements(&rows, Some(&until)))?;

        let mut deck = Deck::new(
            "Analysis of Outbound Movements and Client Activity",
            &format!(
                "Insights from the Master Tracker {} Data\nRecords up to {}",
                self.config.cutoff_date.year(),
                self.config.cutoff_date
            ),
        );
        deck.add_text(
            "Introduction",
            &format!(
                "Objective: To analyze outbound movements and client activities using the Master Tracker data.\nData Source: {}",
                self.config.movements_path.display()
            ),
        );
        deck.add_text(
            "Data Cleaning and Preparation",
            &format!(
                "Steps Taken:\n- Loaded the CSV and normalized column names.\n- Filtered data to include records up to {}.",
                until
            ),
        );
        deck.add_text(
            "Outbound Movements Overview",
            &format!(
                "Total Records Analyzed: {}\nKey Metrics:\n- Number of outbound movements: {}.\n- Breakdown by status and warehouse.",
                format_int(rows.len()),
                format_int(outbound_rows.as_ref().map_or(0, |t| t.len()))
            ),
        );
        if let Some((_, bar, pie)) = &warehouses {
            deck.add_image(
                &format!("Top {} Warehouses by Order Count", n),
                &format!("Bar Chart: Top {} Warehouses by Order Count{}", n, suffix),
                bar,
            )?;
            deck.add_image(
                "Distribution of Orders by Top Warehouses",
                &format!("Pie Chart: Distribution of Orders by Top {} Warehouses{}", n, suffix),
                pie,
            )?;
        }
        if let Some((_, path)) = &status {
            deck.add_image(
                "Orders by Status",
                &format!("Bar Chart: Count of Orders by Status{}", suffix),
                path,
            )?;
        }
        if let Some(path) = &outbound_line {
            deck.add_image(
                "Outbound Movements Over Time",
                &format!("Line Chart: Outbound Movements Over Time{}", suffix),
                path,
            )?;
        }
        if let Some(path) = &histogram_path {
            deck.add_image(
                "Quantity Distribution for Outbound Movements",
                &format!("Histogram: Distribution of Quantities for Outbound Movements{}", suffix),
                path,
            )?;
        }
        deck.add_text(
            "Client Movement Analysis",
            "Top Clients Overview: Total inbound and outbound movements.",
        );
        if clients.is_some() {
            deck.add_image(
                "Inbound and Outbound Movements by Top Clients",
                &format!("Bar Chart: Top {} Clients: Inbound and Outbound Movements{}", n, suffix),
                &self.scoped_path(CLIENTS_BAR, Scope::Cutoff),
            )?;
            deck.add_image(
                "Total Inbound vs Outbound",
                &format!("Pie Chart: Total Inbound vs Outbound Movements (Top Clients, Up to {})", until),
                &self.scoped_path(DIRECTION_PIE, Scope::Cutoff),
            )?;
        }
        deck.add_text(
            "Suggestions for Further Analysis",
            "- Implement advanced forecasting methods (e.g., ARIMA, exponential smoothing).\n- Analyze seasonal trends and their impact on outbound movements.\n- Explore correlations between order status and client behavior.",
        );
        deck.add_text(
            "Potential Improvements",
            "- Automate data cleaning and visualization processes.\n- Integrate additional data sources for comprehensive analysis (e.g., client feedback, shipping delays).\n- Develop a dashboard for real-time monitoring of outbound movements.",
        );
        deck.add_text(
            "Conclusion",
            "Summary of key findings.\nImportance of continuous monitoring and analysis for operational efficiency.",
        );
        deck.add_text("Questions", "Open the floor for any questions or discussions.");

        let deck_path = self.path("Outbound_Movements_Analysis_Presentation.md");
        deck.write_markdown(&deck_path)?;
        deck.write_manifest(&self.path("Outbound_Movements_Analysis_Presentation.json"))?;
        Ok(PresentationReport { deck, deck_path })
    }

    /// Headline figures across the whole tracker, written to `summary.json`.
    pub fn summary(&self, table: &Table) -> Result<SummaryStats> {
        let stats = summarize(table, self.config);
        output::write_json(&self.path("summary.json"), &stats)?;
        println!("\nSummary Stats (summary.json):");
        println!("{}\n", serde_json::to_string_pretty(&stats)?);
        Ok(stats)
    }
}

fn sent_received(table: &Table, ctx: &ReportContext<'_>) -> Result<SentReceived> {
    let status = &ctx.config.movement_columns.status;
    let labels = &ctx.config.labels;
    let sent = table.filter(&Predicate::equals(status, &labels.sent))?.len();
    let received = table.filter(&Predicate::equals(status, &labels.received))?.len();
    Ok(SentReceived {
        sent,
        received,
        difference: sent as i64 - received as i64,
    })
}

fn distinct(table: &Table, column: &str) -> usize {
    match table.column(column) {
        Ok(c) => table
            .rows()
            .iter()
            .filter_map(|r| r[c].as_key())
            .collect::<HashSet<_>>()
            .len(),
        Err(_) => 0,
    }
}

/// Figures that do not depend on any single branch; absent columns count as
/// zero rather than failing the summary.
pub fn summarize(table: &Table, config: &Config) -> SummaryStats {
    let cols = &config.movement_columns;
    let labels = &config.labels;
    let count_of = |label: &str| {
        table
            .filter(&Predicate::equals(&cols.movement_type, label))
            .map(|t| t.len())
            .unwrap_or(0)
    };
    let total_cases = table.numbers(&cols.quantity).map(|v| v.iter().sum()).unwrap_or(0.0);

    let transit: Vec<f64> = match (table.column(&cols.sending_date), table.column(&cols.receiving_date)) {
        (Ok(s), Ok(r)) => table
            .rows()
            .iter()
            .filter_map(|row| Some(days_diff(row[s].as_date()?, row[r].as_date()?)))
            .collect(),
        _ => Vec::new(),
    };

    let next_period = |label: &str| {
        let rows = table.filter(&Predicate::equals(&cols.movement_type, label)).ok()?;
        let series = period_series(&rows, &cols.sending_date, Period::Month, &Aggregate::Count).ok()?;
        let f = forecast(
            &series,
            ForecastStrategy::MovingAverage {
                window: config.moving_average_window,
            },
            1,
        )
        .ok()?;
        f.start().map(|o| o.value)
    };

    SummaryStats {
        total_rows: table.len(),
        outbound_movements: count_of(&labels.outbound),
        inbound_movements: count_of(&labels.inbound),
        distinct_clients: distinct(table, &cols.client),
        distinct_warehouses: distinct(table, &cols.warehouse),
        total_cases,
        avg_transit_days: average(&transit),
        outbound_next_period_forecast: next_period(&labels.outbound),
        inbound_next_period_forecast: next_period(&labels.inbound),
    }
}

/// Output directory entries written so far, for the closing console message.
pub fn written_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_file_safe() {
        assert_eq!(file_slug("Coca-Cola 330ml"), "coca_cola_330ml");
        assert_eq!(file_slug("///"), "item");
        assert_eq!(file_slug("Outbound"), "outbound");
    }

    #[test]
    fn colliding_slugs_get_distinct_names() {
        let mut used = HashSet::new();
        let names: Vec<String> = ["A-B", "A B", "a_b", "Widget"]
            .iter()
            .enumerate()
            .map(|(i, n)| unique_slug(n, i, &mut used))
            .collect();
        assert_eq!(names, vec!["a_b", "a_b_2", "a_b_3", "widget"]);
    }

    #[test]
    fn cutoff_outputs_get_their_own_names() {
        assert_eq!(scoped_name("top_warehouses.csv", Scope::Full), "top_warehouses.csv");
        assert_eq!(scoped_name("top_warehouses.csv", Scope::Cutoff), "top_warehouses_cutoff.csv");
        assert_eq!(scoped_name("README", Scope::Cutoff), "README_cutoff");
    }

    #[test]
    fn heatmap_labels_show_month_and_day() {
        assert_eq!(month_day_label("2024-03-01"), "Mar 01");
        assert_eq!(month_day_label("odd"), "odd");
    }

    #[test]
    fn guarded_skips_only_reportable_conditions() {
        let missing: Result<()> = Err(TrackerError::MissingColumn {
            name: "x".into(),
            available: vec![],
        });
        assert!(guarded("b", missing).unwrap().is_none());
        assert!(guarded::<()>("b", Err(TrackerError::EmptyHistory)).unwrap().is_none());
        let fatal: Result<()> = Err(TrackerError::MissingImage(PathBuf::from("x")));
        assert!(guarded("b", fatal).is_err());
        assert_eq!(guarded("b", Ok(3)).unwrap(), Some(3));
    }
}
