use crate::error::{Result, TrackerError};
use crate::loader::{Cell, ColumnSummary, Table};
use crate::pipeline::CrossTab;
use crate::util::{format_int, format_number, format_total};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table as TextTable, Tabled};

fn wrap(path: &Path, r: std::result::Result<(), Box<dyn Error>>) -> Result<()> {
    r.map_err(|e| TrackerError::Write {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    wrap(path, write_csv_inner(path, rows))
}

fn write_csv_inner<T: Serialize>(path: &Path, rows: &[T]) -> std::result::Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Cross tab export: the row key header first, then one column per key.
pub fn write_crosstab_csv(path: &Path, row_header: &str, table: &CrossTab) -> Result<()> {
    wrap(path, write_crosstab_inner(path, row_header, table))
}

fn write_crosstab_inner(path: &Path, row_header: &str, table: &CrossTab) -> std::result::Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec![row_header.to_string()];
    header.extend(table.columns.iter().cloned());
    wtr.write_record(&header)?;
    for (key, vals) in table.rows.iter().zip(&table.values) {
        let mut record = vec![key.clone()];
        record.extend(vals.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = TextTable::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

fn cell_text(c: &Cell) -> String {
    match c {
        Cell::Text(s) => s.clone(),
        Cell::Number(n) => format_total(*n),
        Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        Cell::Missing => "NaN".to_string(),
    }
}

/// Markdown rendering of the first rows of a loaded table.
pub fn render_head(table: &Table, n: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(table.headers().iter().cloned());
    for row in table.head(n).rows() {
        builder.push_record(row.iter().map(cell_text));
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn render_missing(counts: &[(String, usize)]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Column".to_string(), "Missing".to_string()]);
    for (col, n) in counts {
        builder.push_record([col.clone(), format_int(*n)]);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn render_describe(summary: &[ColumnSummary]) -> String {
    let mut builder = Builder::default();
    builder.push_record(
        ["Column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"].map(String::from),
    );
    for s in summary {
        builder.push_record([
            s.column.clone(),
            format_int(s.count),
            format_number(s.mean, 2),
            s.std.map(|v| format_number(v, 2)).unwrap_or_else(|| "NaN".to_string()),
            format_number(s.min, 2),
            format_number(s.p25, 2),
            format_number(s.p50, 2),
            format_number(s.p75, 2),
            format_number(s.max, 2),
        ]);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn render_crosstab(row_header: &str, table: &CrossTab) -> String {
    let mut builder = Builder::default();
    let mut header = vec![row_header.to_string()];
    header.extend(table.columns.iter().cloned());
    builder.push_record(header);
    for (key, vals) in table.rows.iter().zip(&table.values) {
        let mut record = vec![key.clone()];
        record.extend(vals.iter().map(|v| format_total(*v)));
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}
