use crate::error::{Result, TrackerError};
use crate::util::{parse_date_safe, parse_f64_safe, quantile, std_dev};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::{debug, info};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// A single typed cell. Coercion failures become `Missing`, never a sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Missing,
}

impl Cell {
    fn from_raw(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Missing
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Text view of the cell, used for grouping keys and label predicates.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Cell::Missing => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_f64_safe(Some(s)),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => parse_date_safe(Some(s)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub total_rows: usize,
    pub ragged_rows: usize,
    pub renamed_headers: Vec<(String, String)>,
}

/// Trim header names and rename later duplicates so every column stays
/// addressable: `Qty`, `Qty_dup`, `Qty_dup2`, ...
pub fn normalize_headers<I, S>(raw: I) -> (Vec<String>, Vec<(String, String)>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::new();
    let mut renamed = Vec::new();
    for name in raw {
        let trimmed = name.as_ref().trim().to_string();
        let mut candidate = trimmed.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = if n == 1 {
                format!("{}_dup", trimmed)
            } else {
                format!("{}_dup{}", trimmed, n)
            };
            n += 1;
        }
        if candidate != trimmed {
            renamed.push((trimmed, candidate.clone()));
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }
    (headers, renamed)
}

/// Per-column summary statistics, computed only for numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Table { headers, rows }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<(Table, LoadReport)> {
        let path = path.as_ref();
        info!("Loading {}", path.display());
        let file = std::fs::File::open(path)?;
        Table::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<(Table, LoadReport)> {
        let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
        let (headers, renamed_headers) = normalize_headers(rdr.headers()?.iter());
        for (from, to) in &renamed_headers {
            debug!("Renamed duplicate column '{}' to '{}'", from, to);
        }

        let width = headers.len();
        let mut rows = Vec::new();
        let mut ragged_rows = 0usize;
        for record in rdr.records() {
            let record = record?;
            if record.len() != width {
                ragged_rows += 1;
            }
            let mut row: Vec<Cell> = record.iter().take(width).map(Cell::from_raw).collect();
            row.resize(width, Cell::Missing);
            rows.push(row);
        }

        let report = LoadReport {
            total_rows: rows.len(),
            ragged_rows,
            renamed_headers,
        };
        info!(
            "Loaded {} rows across {} columns",
            report.total_rows,
            headers.len()
        );
        Ok((Table { headers, rows }, report))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_ok()
    }

    /// Index of a column by its trimmed name.
    pub fn column(&self, name: &str) -> Result<usize> {
        let wanted = name.trim();
        self.headers
            .iter()
            .position(|h| h == wanted)
            .ok_or_else(|| TrackerError::MissingColumn {
                name: wanted.to_string(),
                available: self.headers.clone(),
            })
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    /// Convert every cell of `name` to a date; returns how many present
    /// cells failed to parse and became missing.
    pub fn coerce_dates(&mut self, name: &str) -> Result<usize> {
        let col = self.column(name)?;
        Ok(self.coerce_with(col, |c| c.as_date().map(Cell::Date)))
    }

    /// Convert every cell of `name` to a number; same contract as `coerce_dates`.
    pub fn coerce_numbers(&mut self, name: &str) -> Result<usize> {
        let col = self.column(name)?;
        Ok(self.coerce_with(col, |c| c.as_number().map(Cell::Number)))
    }

    fn coerce_with<F>(&mut self, col: usize, convert: F) -> usize
    where
        F: Fn(&Cell) -> Option<Cell>,
    {
        let mut failed = 0usize;
        for row in &mut self.rows {
            let cell = &mut row[col];
            if cell.is_missing() {
                continue;
            }
            *cell = match convert(cell) {
                Some(c) => c,
                None => {
                    failed += 1;
                    Cell::Missing
                }
            };
        }
        if failed > 0 {
            debug!(
                "{} values in '{}' could not be coerced and are treated as missing",
                failed, self.headers[col]
            );
        }
        failed
    }

    /// Drop rows in which every cell is missing; returns the number removed.
    pub fn drop_empty_rows(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| r.iter().any(|c| !c.is_missing()));
        before - self.rows.len()
    }

    /// Keep only rows for which `keep` returns true.
    pub fn retain_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Cell]) -> bool,
    {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let n = self.rows.iter().filter(|r| r[i].is_missing()).count();
                (h.clone(), n)
            })
            .collect()
    }

    /// Present values of a column as numbers, skipping missing cells and
    /// cells that do not parse.
    pub fn numbers(&self, name: &str) -> Result<Vec<f64>> {
        let col = self.column(name)?;
        Ok(self.rows.iter().filter_map(|r| r[col].as_number()).collect())
    }

    /// Summary statistics for every column whose present values are all numeric.
    pub fn describe(&self) -> Vec<ColumnSummary> {
        let mut out = Vec::new();
        for (i, h) in self.headers.iter().enumerate() {
            let present: Vec<&Cell> = self.rows.iter().map(|r| &r[i]).filter(|c| !c.is_missing()).collect();
            if present.is_empty() {
                continue;
            }
            let values: Option<Vec<f64>> = present.iter().map(|c| c.as_number()).collect();
            let Some(mut values) = values else { continue };
            values.sort_by(|a, b| a.total_cmp(b));
            let count = values.len();
            let mean = values.iter().sum::<f64>() / count as f64;
            out.push(ColumnSummary {
                column: h.clone(),
                count,
                mean,
                std: std_dev(&values),
                min: values[0],
                p25: quantile(&values, 0.25).unwrap_or(mean),
                p50: quantile(&values, 0.5).unwrap_or(mean),
                p75: quantile(&values, 0.75).unwrap_or(mean),
                max: values[count - 1],
            });
        }
        out
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> Table {
        Table::from_reader(csv.as_bytes()).unwrap().0
    }

    #[test]
    fn trims_headers_and_finds_by_trimmed_name() {
        let t = load("  SR Statues ,Clients\nSent,Acme\n");
        assert_eq!(t.headers(), &["SR Statues".to_string(), "Clients".to_string()]);
        assert_eq!(t.column("SR Statues").unwrap(), 0);
        assert_eq!(t.column(" SR Statues ").unwrap(), 0);
    }

    #[test]
    fn renames_duplicate_headers() {
        let (headers, renamed) = normalize_headers(["Qty", " Qty", "Qty ", "Date"]);
        assert_eq!(headers, vec!["Qty", "Qty_dup", "Qty_dup2", "Date"]);
        assert_eq!(renamed.len(), 2);
    }

    #[test]
    fn missing_column_lists_available() {
        let t = load("A,B\n1,2\n");
        match t.column("Sending Date") {
            Err(TrackerError::MissingColumn { name, available }) => {
                assert_eq!(name, "Sending Date");
                assert_eq!(available, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn coercion_turns_failures_into_missing() {
        let mut t = load("Qty,Date\n12,2024-01-05\nlots,not a date\n,\n");
        assert_eq!(t.coerce_numbers("Qty").unwrap(), 1);
        assert_eq!(t.coerce_dates("Date").unwrap(), 1);
        assert_eq!(t.cell(0, 0), &Cell::Number(12.0));
        assert!(t.cell(1, 0).is_missing());
        assert!(t.cell(1, 1).is_missing());
        assert_eq!(
            t.missing_counts(),
            vec![("Qty".to_string(), 2), ("Date".to_string(), 2)]
        );
    }

    #[test]
    fn ragged_rows_are_padded() {
        let (t, report) = Table::from_reader("A,B,C\n1\n1,2,3,4\n".as_bytes()).unwrap();
        assert_eq!(report.ragged_rows, 2);
        assert!(t.cell(0, 2).is_missing());
        assert_eq!(t.rows()[1].len(), 3);
    }

    #[test]
    fn drops_fully_empty_rows() {
        let mut t = load("A,B\n1,\n,\nx,y\n");
        assert_eq!(t.drop_empty_rows(), 1);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn describe_skips_text_columns() {
        let t = load("Qty,Name\n1,a\n2,b\n3,c\n4,d\n");
        let summary = t.describe();
        assert_eq!(summary.len(), 1);
        let s = &summary[0];
        assert_eq!(s.column, "Qty");
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.p50, 2.5);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
    }
}
