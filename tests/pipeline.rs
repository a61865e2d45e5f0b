use pretty_assertions::assert_eq;
use tracker_report::pipeline::{crosstab, period_series, value_counts};
use tracker_report::{forecast, group_by, top_n, Aggregate, ForecastStrategy, KeyNormalization, Period, Table};

fn table(csv: &str) -> Table {
    Table::from_reader(csv.as_bytes()).unwrap().0
}

#[test]
fn counts_cover_every_non_missing_row() {
    let t = table("Type Of Movement,Clients\nOutbound,A\nOutbound,B\nInbound,A\nOutbound,C\nInbound,B\n,D\n");
    let counts = group_by(&t, &["Type Of Movement"], &Aggregate::Count).unwrap();
    assert_eq!(counts.get_one("Outbound"), Some(3.0));
    assert_eq!(counts.get_one("Inbound"), Some(2.0));
    assert_eq!(counts.total(), 5.0);
    assert_eq!(counts.len(), 2);
}

#[test]
fn padded_header_is_found_by_trimmed_name() {
    let t = table(" SR Statues ,Warehouse\nSent,W1\nReceived,W1\nSent,W2\n");
    let counts = value_counts(&t, "SR Statues").unwrap();
    assert_eq!(counts.labelled(), vec![("Sent".to_string(), 2.0), ("Received".to_string(), 1.0)]);
    assert!(value_counts(&t, "  SR Statues").is_ok());
}

#[test]
fn ranking_then_merging_clients() {
    let t = table(
        "Clients,Type Of Movement\nAcme,Outbound\nACME,Inbound\nBeta,Outbound\nBeta,Outbound\nBeta,Inbound\nAcme,Outbound\n",
    );
    let ct = crosstab(&t, "Clients", "Type Of Movement", &Aggregate::Count).unwrap();
    assert_eq!(ct.rows, vec!["ACME", "Acme", "Beta"]);

    let merged = ct.merge_rows(KeyNormalization::CaseInsensitive);
    assert_eq!(merged.rows, vec!["ACME", "Beta"]);
    assert_eq!(merged.value("ACME", "Outbound"), 2.0);
    assert_eq!(merged.value("ACME", "Inbound"), 1.0);

    let exact = ct.merge_rows(KeyNormalization::Exact);
    assert_eq!(exact, ct);

    let top = top_n(&merged.row_totals(), 1);
    assert_eq!(top.labelled(), vec![("ACME".to_string(), 3.0)]);
}

#[test]
fn monthly_series_forecast_end_to_end() {
    let mut t = table(
        "Sending Date,Qty's cases\n2024-01-03,5\n2024-01-28,5\n2024-02-10,20\n03/05/2024,15\n2024-04-01,30\nnever,1\n",
    );
    assert_eq!(t.coerce_dates("Sending Date").unwrap(), 1);
    t.coerce_numbers("Qty's cases").unwrap();

    let series = period_series(
        &t,
        "Sending Date",
        Period::Month,
        &Aggregate::Sum("Qty's cases".into()),
    )
    .unwrap();
    assert_eq!(series.values(), vec![10.0, 20.0, 15.0, 30.0]);

    let f = forecast(&series, ForecastStrategy::MovingAverage { window: 4 }, 4).unwrap();
    assert!(f.predicted.iter().all(|p| p.value == 18.75));
    assert_eq!(f.predicted_total(), 75.0);
}
