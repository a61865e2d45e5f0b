use crate::pipeline::{AggregateTable, CrossTab};

/// All entries ordered by total, largest first. The sort is stable, so
/// equal totals keep their insertion order.
pub fn sort_descending(agg: &AggregateTable) -> AggregateTable {
    let mut entries = agg.entries().to_vec();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    AggregateTable::from_entries(entries)
}

/// The `n` entries with the largest totals, descending.
///
/// Returns everything when fewer than `n` keys exist and nothing for `n == 0`.
pub fn top_n(agg: &AggregateTable, n: usize) -> AggregateTable {
    let mut entries = sort_descending(agg).entries().to_vec();
    entries.truncate(n);
    AggregateTable::from_entries(entries)
}

/// Rows of a cross tab with the largest row totals, in descending order.
pub fn top_n_rows(ct: &CrossTab, n: usize) -> CrossTab {
    let keys: Vec<String> = top_n(&ct.row_totals(), n)
        .entries()
        .iter()
        .map(|(k, _)| k[0].clone())
        .collect();
    ct.select_rows(&keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AggregateTable {
        let mut agg = AggregateTable::new();
        for (k, v) in [("a", 3.0), ("b", 9.0), ("c", 3.0), ("d", 1.0), ("e", 9.0)] {
            agg.add(vec![k.to_string()], v);
        }
        agg
    }

    fn keys(agg: &AggregateTable) -> Vec<String> {
        agg.entries().iter().map(|(k, _)| k[0].clone()).collect()
    }

    #[test]
    fn top_n_is_descending_with_stable_ties() {
        let top = top_n(&sample(), 3);
        assert_eq!(keys(&top), vec!["b", "e", "a"]);
    }

    #[test]
    fn top_n_bounds() {
        assert_eq!(top_n(&sample(), 0).len(), 0);
        assert_eq!(top_n(&sample(), 10).len(), 5);
        assert!(top_n(&AggregateTable::new(), 3).is_empty());
    }

    #[test]
    fn returned_values_dominate_the_rest() {
        let all = sample();
        for n in 0..=5 {
            let top = top_n(&all, n);
            let min_kept = top.entries().iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
            for (k, v) in all.entries() {
                if top.get(k).is_none() {
                    assert!(*v <= min_kept);
                }
            }
        }
    }

    #[test]
    fn top_rows_of_crosstab() {
        let ct = CrossTab {
            rows: vec!["x".into(), "y".into(), "z".into()],
            columns: vec!["Inbound".into(), "Outbound".into()],
            values: vec![vec![1.0, 1.0], vec![5.0, 0.0], vec![0.0, 3.0]],
        };
        let top = top_n_rows(&ct, 2);
        assert_eq!(top.rows, vec!["y", "z"]);
        assert_eq!(top.values, vec![vec![5.0, 0.0], vec![0.0, 3.0]]);
    }
}
