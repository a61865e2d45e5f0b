//! Run configuration.
//!
//! Every field has a default matching the tracker spreadsheet as exported, so
//! an absent or partial TOML file is fine:
//!
//! ```toml
//! top_n = 5
//! cutoff_date = "2024-08-31"
//!
//! [movement_columns]
//! status = "SR Status"
//! ```

use crate::error::{Result, TrackerError};
use crate::pipeline::KeyNormalization;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MovementColumns {
    pub movement_type: String,
    pub client: String,
    pub warehouse: String,
    pub status: String,
    pub sending_date: String,
    pub receiving_date: String,
    pub quantity: String,
}

impl Default for MovementColumns {
    fn default() -> Self {
        MovementColumns {
            movement_type: "Type Of Movement".to_string(),
            client: "Clients".to_string(),
            warehouse: "Warehouse".to_string(),
            status: "SR Statues".to_string(),
            sending_date: "Sending Date".to_string(),
            receiving_date: "Receiving Date".to_string(),
            quantity: "Qty's cases".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvoiceColumns {
    pub date: String,
    pub item: String,
    pub quantity: String,
}

impl Default for InvoiceColumns {
    fn default() -> Self {
        InvoiceColumns {
            date: "Invoice Date".to_string(),
            item: "Item Name".to_string(),
            quantity: "Quantity".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub outbound: String,
    pub inbound: String,
    pub sent: String,
    pub received: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            outbound: "Outbound".to_string(),
            inbound: "Inbound".to_string(),
            sent: "Sent".to_string(),
            received: "Received".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub movements_path: PathBuf,
    pub invoices_path: PathBuf,
    pub output_dir: PathBuf,
    pub movement_columns: MovementColumns,
    pub invoice_columns: InvoiceColumns,
    pub labels: Labels,
    /// Rows sent after this date are left out of the cutoff-based reports.
    pub cutoff_date: NaiveDate,
    pub top_n: usize,
    pub forecast_periods: usize,
    pub daily_forecast_days: usize,
    pub moving_average_window: usize,
    pub histogram_bins: usize,
    pub client_key_normalization: KeyNormalization,
    pub preview_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            movements_path: PathBuf::from("Master Tracker 2024 krk(Movement).csv"),
            invoices_path: PathBuf::from("2024 invoices till July.csv"),
            output_dir: PathBuf::from("output"),
            movement_columns: MovementColumns::default(),
            invoice_columns: InvoiceColumns::default(),
            labels: Labels::default(),
            cutoff_date: NaiveDate::from_ymd_opt(2024, 8, 31).unwrap_or_default(),
            top_n: 10,
            forecast_periods: 4,
            daily_forecast_days: 120,
            moving_average_window: 4,
            histogram_bins: 30,
            client_key_normalization: KeyNormalization::Whitespace,
            preview_rows: 5,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Config> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parameters that size a window or a bin count must be positive.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("moving_average_window", self.moving_average_window),
            ("histogram_bins", self.histogram_bins),
        ] {
            if value == 0 {
                return Err(TrackerError::InvalidConfig(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }

    /// Load from `path` when given, otherwise use the defaults.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                Config::from_toml_str(&raw)
            }
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.top_n, 10);
        assert_eq!(cfg.movement_columns.status, "SR Statues");
        assert_eq!(cfg.cutoff_date, NaiveDate::from_ymd_opt(2024, 8, 31).unwrap());
        assert_eq!(cfg.client_key_normalization, KeyNormalization::Whitespace);
    }

    #[test]
    fn partial_override() {
        let cfg = Config::from_toml_str(
            r#"
            top_n = 3
            cutoff_date = "2024-06-30"
            client_key_normalization = "case_insensitive"

            [movement_columns]
            status = "SR Status"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.top_n, 3);
        assert_eq!(cfg.cutoff_date, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        assert_eq!(cfg.movement_columns.status, "SR Status");
        assert_eq!(cfg.movement_columns.client, "Clients");
        assert_eq!(cfg.client_key_normalization, KeyNormalization::CaseInsensitive);
    }

    #[test]
    fn zero_window_is_rejected() {
        match Config::from_toml_str("moving_average_window = 0") {
            Err(TrackerError::InvalidConfig(msg)) => assert!(msg.contains("moving_average_window")),
            other => panic!("expected an invalid config, got {:?}", other.map(|c| c.moving_average_window)),
        }
        assert!(Config::from_toml_str("histogram_bins = 0").is_err());
        assert!(Config::from_toml_str("moving_average_window = 1").is_ok());
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Config::from_toml_str("top_n = \"ten\"").is_err());
    }
}
