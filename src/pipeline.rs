//! Filter and group stage: row predicates, group-by aggregates, cross tabs
//! and period time series over a loaded [`Table`].

use crate::error::Result;
use crate::loader::{Cell, Table};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    Equals { column: String, value: String },
    OnOrBefore { column: String, date: NaiveDate },
    Between { column: String, from: NaiveDate, to: NaiveDate },
}

impl Predicate {
    pub fn equals(column: &str, value: &str) -> Self {
        Predicate::Equals {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn on_or_before(column: &str, date: NaiveDate) -> Self {
        Predicate::OnOrBefore {
            column: column.to_string(),
            date,
        }
    }
}

impl Table {
    /// Rows satisfying `predicate`. A missing cell never matches.
    pub fn filter(&self, predicate: &Predicate) -> Result<Table> {
        match predicate {
            Predicate::All => Ok(self.clone()),
            Predicate::Equals { column, value } => {
                let col = self.column(column)?;
                Ok(self.retain_rows(|r| r[col].as_key().as_deref() == Some(value.as_str())))
            }
            Predicate::OnOrBefore { column, date } => {
                let col = self.column(column)?;
                Ok(self.retain_rows(|r| r[col].as_date().is_some_and(|d| d <= *date)))
            }
            Predicate::Between { column, from, to } => {
                let col = self.column(column)?;
                Ok(self.retain_rows(|r| {
                    r[col]
                        .as_date()
                        .is_some_and(|d| d >= *from && d <= *to)
                }))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Count,
    Sum(String),
}

/// How near-duplicate keys are folded together in a second grouping pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyNormalization {
    /// Only byte-identical keys merge.
    Exact,
    /// Trim and collapse inner runs of whitespace.
    #[default]
    Whitespace,
    /// Whitespace folding plus case folding.
    CaseInsensitive,
}

impl KeyNormalization {
    pub fn apply(&self, key: &str) -> String {
        match self {
            KeyNormalization::Exact => key.to_string(),
            KeyNormalization::Whitespace => collapse_whitespace(key),
            KeyNormalization::CaseInsensitive => collapse_whitespace(key).to_lowercase(),
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Insertion-ordered group key -> total mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTable {
    entries: Vec<(Vec<String>, f64)>,
    index: HashMap<Vec<String>, usize>,
}

impl AggregateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: Vec<String>, value: f64) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &[String]) -> Option<f64> {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    /// Lookup for single-key tables.
    pub fn get_one(&self, key: &str) -> Option<f64> {
        self.get(&[key.to_string()])
    }

    pub fn entries(&self) -> &[(Vec<String>, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    /// Keys joined with " / " for display, paired with their totals.
    pub fn labelled(&self) -> Vec<(String, f64)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.join(" / "), *v))
            .collect()
    }

    /// Second grouping pass: keys equal after `norm` are summed into the
    /// first-seen spelling.
    pub fn merge_keys(&self, norm: KeyNormalization) -> AggregateTable {
        let mut canonical: HashMap<Vec<String>, Vec<String>> = HashMap::new();
        let mut out = AggregateTable::new();
        for (key, value) in &self.entries {
            let normalized: Vec<String> = key.iter().map(|k| norm.apply(k)).collect();
            let display = canonical
                .entry(normalized)
                .or_insert_with(|| match norm {
                    KeyNormalization::Exact => key.clone(),
                    _ => key.iter().map(|k| collapse_whitespace(k)).collect(),
                })
                .clone();
            out.add(display, *value);
        }
        out
    }

    pub(crate) fn from_entries(entries: Vec<(Vec<String>, f64)>) -> AggregateTable {
        let mut out = AggregateTable::new();
        for (k, v) in entries {
            out.add(k, v);
        }
        out
    }
}

fn keys_for(row: &[Cell], cols: &[usize]) -> Option<Vec<String>> {
    cols.iter().map(|&c| row[c].as_key()).collect()
}

/// Group rows by one or more key columns. Rows with any missing key are
/// excluded; for sums a missing value contributes zero to its group.
pub fn group_by(table: &Table, keys: &[&str], agg: &Aggregate) -> Result<AggregateTable> {
    let cols = keys
        .iter()
        .map(|k| table.column(k))
        .collect::<Result<Vec<_>>>()?;
    let value_col = match agg {
        Aggregate::Count => None,
        Aggregate::Sum(c) => Some(table.column(c)?),
    };
    let mut out = AggregateTable::new();
    for row in table.rows() {
        let Some(key) = keys_for(row, &cols) else {
            continue;
        };
        let value = match value_col {
            None => 1.0,
            Some(c) => row[c].as_number().unwrap_or(0.0),
        };
        out.add(key, value);
    }
    Ok(out)
}

/// Counts of every distinct value in a column, most frequent first.
pub fn value_counts(table: &Table, column: &str) -> Result<AggregateTable> {
    let counts = group_by(table, &[column], &Aggregate::Count)?;
    Ok(crate::rank::sort_descending(&counts))
}

/// Row keys x column keys matrix with zero fill.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossTab {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CrossTab {
    fn from_aggregate(pairs: &AggregateTable, sort_columns: bool) -> CrossTab {
        let mut rows: Vec<String> = Vec::new();
        let mut columns: Vec<String> = Vec::new();
        for (key, _) in pairs.entries() {
            if !rows.contains(&key[0]) {
                rows.push(key[0].clone());
            }
            if !columns.contains(&key[1]) {
                columns.push(key[1].clone());
            }
        }
        rows.sort();
        if sort_columns {
            columns.sort();
        }
        let mut values = vec![vec![0.0; columns.len()]; rows.len()];
        for (key, v) in pairs.entries() {
            let r = rows.iter().position(|x| *x == key[0]).unwrap_or_default();
            let c = columns.iter().position(|x| *x == key[1]).unwrap_or_default();
            values[r][c] += v;
        }
        CrossTab {
            rows,
            columns,
            values,
        }
    }

    pub fn row_totals(&self) -> AggregateTable {
        AggregateTable::from_entries(
            self.rows
                .iter()
                .zip(&self.values)
                .map(|(r, vals)| (vec![r.clone()], vals.iter().sum()))
                .collect(),
        )
    }

    pub fn column_total(&self, column: &str) -> f64 {
        match self.columns.iter().position(|c| c == column) {
            Some(i) => self.values.iter().map(|r| r[i]).sum(),
            None => 0.0,
        }
    }

    pub fn value(&self, row: &str, column: &str) -> f64 {
        let r = self.rows.iter().position(|x| x == row);
        let c = self.columns.iter().position(|x| x == column);
        match (r, c) {
            (Some(r), Some(c)) => self.values[r][c],
            _ => 0.0,
        }
    }

    /// Restrict to `keys`, in the order given. Unknown keys are skipped.
    pub fn select_rows(&self, keys: &[String]) -> CrossTab {
        let mut out = CrossTab {
            rows: Vec::new(),
            columns: self.columns.clone(),
            values: Vec::new(),
        };
        for k in keys {
            if let Some(i) = self.rows.iter().position(|r| r == k) {
                out.rows.push(k.clone());
                out.values.push(self.values[i].clone());
            }
        }
        out
    }

    /// Fold rows whose keys normalize equal, summing column by column.
    pub fn merge_rows(&self, norm: KeyNormalization) -> CrossTab {
        let mut merged: Vec<(String, String, Vec<f64>)> = Vec::new();
        for (key, vals) in self.rows.iter().zip(&self.values) {
            let normalized = norm.apply(key);
            match merged.iter_mut().find(|(n, _, _)| *n == normalized) {
                Some((_, _, acc)) => {
                    for (a, v) in acc.iter_mut().zip(vals) {
                        *a += v;
                    }
                }
                None => merged.push((normalized, collapse_whitespace(key), vals.clone())),
            }
        }
        CrossTab {
            rows: merged.iter().map(|(_, d, _)| d.clone()).collect(),
            columns: self.columns.clone(),
            values: merged.into_iter().map(|(_, _, v)| v).collect(),
        }
    }
}

/// Cross tabulate two categorical columns (rows and columns sorted).
pub fn crosstab(table: &Table, row_key: &str, column_key: &str, agg: &Aggregate) -> Result<CrossTab> {
    let pairs = group_by(table, &[row_key, column_key], agg)?;
    Ok(CrossTab::from_aggregate(&pairs, true))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Day,
    /// Weeks ending on Sunday, labelled by that Sunday.
    Week,
    /// Calendar months, labelled by their first day.
    Month,
}

impl Period {
    pub fn label(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => date,
            Period::Week => {
                let to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
                date + Duration::days(to_sunday)
            }
            Period::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// The period label following `label`.
    pub fn next(&self, label: NaiveDate) -> NaiveDate {
        match self {
            Period::Day => label + Duration::days(1),
            Period::Week => label + Duration::days(7),
            Period::Month => {
                let (y, m) = if label.month() == 12 {
                    (label.year() + 1, 1)
                } else {
                    (label.year(), label.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(label)
            }
        }
    }

    pub fn format(&self, label: NaiveDate) -> String {
        match self {
            Period::Day | Period::Week => label.format("%Y-%m-%d").to_string(),
            Period::Month => label.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub period: NaiveDate,
    pub value: f64,
}

/// Ascending series of one value per period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub period: Period,
    pub points: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(period: Period, points: Vec<Observation>) -> Self {
        TimeSeries { period, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Insert zero-valued observations for periods absent between the first
    /// and last observed periods.
    pub fn fill_gaps(&self) -> TimeSeries {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return self.clone();
        };
        let mut out = Vec::new();
        let mut idx = 0;
        let mut current = first.period;
        while current <= last.period {
            if idx < self.points.len() && self.points[idx].period == current {
                out.push(self.points[idx].clone());
                idx += 1;
            } else {
                out.push(Observation {
                    period: current,
                    value: 0.0,
                });
            }
            current = self.period.next(current);
        }
        TimeSeries::new(self.period, out)
    }
}

/// One total per distinct period of `date_column`; rows with a missing date
/// are excluded.
pub fn period_series(table: &Table, date_column: &str, period: Period, agg: &Aggregate) -> Result<TimeSeries> {
    let date_col = table.column(date_column)?;
    let value_col = match agg {
        Aggregate::Count => None,
        Aggregate::Sum(c) => Some(table.column(c)?),
    };
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in table.rows() {
        let Some(date) = row[date_col].as_date() else {
            continue;
        };
        let value = match value_col {
            None => 1.0,
            Some(c) => row[c].as_number().unwrap_or(0.0),
        };
        *buckets.entry(period.label(date)).or_insert(0.0) += value;
    }
    Ok(TimeSeries::new(
        period,
        buckets
            .into_iter()
            .map(|(period, value)| Observation { period, value })
            .collect(),
    ))
}

/// Series per distinct key, with periods as crosstab columns (ascending).
pub fn period_crosstab(
    table: &Table,
    key_column: &str,
    date_column: &str,
    period: Period,
    agg: &Aggregate,
) -> Result<CrossTab> {
    let key_col = table.column(key_column)?;
    let date_col = table.column(date_column)?;
    let value_col = match agg {
        Aggregate::Count => None,
        Aggregate::Sum(c) => Some(table.column(c)?),
    };
    let mut pairs = AggregateTable::new();
    for row in table.rows() {
        let (Some(key), Some(date)) = (row[key_col].as_key(), row[date_col].as_date()) else {
            continue;
        };
        let value = match value_col {
            None => 1.0,
            Some(c) => row[c].as_number().unwrap_or(0.0),
        };
        // ISO dates sort chronologically as strings.
        pairs.add(vec![key, period.label(date).format("%Y-%m-%d").to_string()], value);
    }
    Ok(CrossTab::from_aggregate(&pairs, true))
}

/// One equal-width bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width bins over `min..=max`; the last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let width = (hi - lo) / bins as f64;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            lower: lo + width * i as f64,
            upper: lo + width * (i + 1) as f64,
            count: 0,
        })
        .collect();
    for v in values {
        let i = (((v - lo) / width) as usize).min(bins - 1);
        out[i].count += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movements() -> Table {
        let csv = "Type Of Movement,Clients,Sending Date,Qty's cases\n\
                   Outbound,Acme,2024-01-03,10\n\
                   Outbound,Acme ,2024-01-20,5\n\
                   Inbound,Beta,2024-02-01,7\n\
                   Outbound,Beta,2024-03-15,x\n\
                   Inbound,Acme,2024-09-02,3\n\
                   ,Gamma,2024-02-11,4\n";
        Table::from_reader(csv.as_bytes()).unwrap().0
    }

    #[test]
    fn equality_filter_excludes_missing() {
        let t = movements();
        let outbound = t.filter(&Predicate::equals("Type Of Movement", "Outbound")).unwrap();
        assert_eq!(outbound.len(), 3);
        let counts = group_by(&t, &["Type Of Movement"], &Aggregate::Count).unwrap();
        assert_eq!(counts.get_one("Outbound"), Some(3.0));
        assert_eq!(counts.get_one("Inbound"), Some(2.0));
        assert_eq!(counts.total(), 5.0);
    }

    #[test]
    fn date_cutoff_filter() {
        let t = movements();
        let cutoff = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        let kept = t.filter(&Predicate::on_or_before("Sending Date", cutoff)).unwrap();
        assert_eq!(kept.len(), 5);
        let between = t
            .filter(&Predicate::Between {
                column: "Sending Date".into(),
                from: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            })
            .unwrap();
        assert_eq!(between.len(), 2);
    }

    #[test]
    fn sum_treats_unparseable_as_zero_but_keeps_group() {
        let t = movements();
        let sums = group_by(&t, &["Clients"], &Aggregate::Sum("Qty's cases".into())).unwrap();
        // "Acme " is trimmed on load, so both Acme rows share a key.
        assert_eq!(sums.get_one("Acme"), Some(18.0));
        assert_eq!(sums.get_one("Beta"), Some(7.0));
    }

    #[test]
    fn merge_keys_folds_near_duplicates() {
        let mut agg = AggregateTable::new();
        agg.add(vec!["ACME  Corp".into()], 2.0);
        agg.add(vec!["Beta".into()], 1.0);
        agg.add(vec!["ACME Corp".into()], 3.0);
        agg.add(vec!["acme corp".into()], 4.0);

        let ws = agg.merge_keys(KeyNormalization::Whitespace);
        assert_eq!(ws.get_one("ACME Corp"), Some(5.0));
        assert_eq!(ws.get_one("acme corp"), Some(4.0));

        let ci = agg.merge_keys(KeyNormalization::CaseInsensitive);
        assert_eq!(ci.len(), 2);
        assert_eq!(ci.get_one("ACME Corp"), Some(9.0));

        let exact = agg.merge_keys(KeyNormalization::Exact);
        assert_eq!(exact.len(), 4);
    }

    #[test]
    fn crosstab_fills_zero() {
        let t = movements();
        let ct = crosstab(&t, "Clients", "Type Of Movement", &Aggregate::Count).unwrap();
        assert_eq!(ct.rows, vec!["Acme", "Beta"]);
        assert_eq!(ct.columns, vec!["Inbound", "Outbound"]);
        assert_eq!(ct.value("Acme", "Outbound"), 2.0);
        assert_eq!(ct.value("Acme", "Inbound"), 1.0);
        assert_eq!(ct.column_total("Outbound"), 3.0);
        assert_eq!(ct.row_totals().get_one("Beta"), Some(2.0));
    }

    #[test]
    fn monthly_series_is_sorted_and_fills_gaps() {
        let t = movements();
        let outbound = t.filter(&Predicate::equals("Type Of Movement", "Outbound")).unwrap();
        let s = period_series(&outbound, "Sending Date", Period::Month, &Aggregate::Count).unwrap();
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mar = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(s.points, vec![
            Observation { period: jan, value: 2.0 },
            Observation { period: mar, value: 1.0 },
        ]);
        let filled = s.fill_gaps();
        assert_eq!(filled.values(), vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn week_labels_end_on_sunday() {
        let wed = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let sun = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(Period::Week.label(wed), sun);
        assert_eq!(Period::Week.label(sun), sun);
        let dec = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(Period::Month.next(dec), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn histogram_bins_cover_all_values() {
        let bins = histogram(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count + bins[1].count, 5);
        assert_eq!(bins[1].count, 3);
        let flat = histogram(&[3.0, 3.0], 30);
        assert_eq!(flat.iter().map(|b| b.count).sum::<usize>(), 2);
        assert!(histogram(&[], 30).is_empty());
    }
}
