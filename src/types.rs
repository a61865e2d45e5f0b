use crate::forecast::Forecast;
use crate::pipeline::{AggregateTable, Period};
use crate::util::{format_number, format_total};
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CountRow {
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: String,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share: String,
}

impl CountRow {
    pub fn from_aggregate(agg: &AggregateTable) -> Vec<CountRow> {
        let total = agg.total();
        agg.labelled()
            .into_iter()
            .map(|(key, v)| CountRow {
                key,
                total: format_total(v),
                share: if total > 0.0 {
                    format!("{}%", format_number(v / total * 100.0, 1))
                } else {
                    "-".to_string()
                },
            })
            .collect()
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ForecastRow {
    #[serde(rename = "Period")]
    #[tabled(rename = "Period")]
    pub period: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "Kind")]
    #[tabled(rename = "Kind")]
    pub kind: String,
}

impl ForecastRow {
    pub fn from_forecast(f: &Forecast) -> Vec<ForecastRow> {
        let period: Period = f.history.period;
        let historical = f.history.points.iter().map(|p| ForecastRow {
            period: period.format(p.period),
            value: format_total(p.value),
            kind: "historical".to_string(),
        });
        let predicted = f.predicted.iter().map(|p| ForecastRow {
            period: period.format(p.period),
            value: format_number(p.value, 2),
            kind: "forecast".to_string(),
        });
        historical.chain(predicted).collect()
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SentReceived {
    pub sent: usize,
    pub received: usize,
    pub difference: i64,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct SummaryStats {
    pub total_rows: usize,
    pub outbound_movements: usize,
    pub inbound_movements: usize,
    pub distinct_clients: usize,
    pub distinct_warehouses: usize,
    pub total_cases: f64,
    /// Mean days between sending and receiving, over rows with both dates.
    pub avg_transit_days: Option<f64>,
    pub outbound_next_period_forecast: Option<f64>,
    pub inbound_next_period_forecast: Option<f64>,
}
