//! Equal-frequency binning of numeric features
//!
//! Edges are the 0, 1/n, ..., 1 quantiles of the observed values with linear
//! interpolation between order statistics. Repeated edges are dropped; when
//! fewer than two distinct edges remain the values are grouped as they are.
//! Bins are right-closed except the first, which also includes its lower edge.

use std::cmp::Ordering;

/// Number of quantile bins attempted per numeric feature.
pub const DEFAULT_BINS: usize = 10;

/// Rows sharing one group label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueGroup {
    /// Display label of the group
    pub label: String,
    /// Row indices in the group, ascending
    pub rows: Vec<usize>,
}

/// Quantile bin edges fitted to a set of values.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileBins {
    edges: Vec<f64>,
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    }
}

/// Format a bin edge with three decimals, trailing zeros removed.
pub fn format_edge(x: f64) -> String {
    let s = format!("{x:.3}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

impl QuantileBins {
    /// Fit up to `n_bins` bins; `None` when binning is infeasible.
    pub fn fit(values: &[f64], n_bins: usize) -> Option<Self> {
        if n_bins == 0 || values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut edges: Vec<f64> = (0..=n_bins)
            .map(|i| quantile(&sorted, i as f64 / n_bins as f64))
            .collect();
        edges.dedup();

        (edges.len() >= 2).then_some(Self { edges })
    }

    /// Bin edges, ascending and distinct.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.edges.len() - 1
    }

    /// Whether there are no bins.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bin index of a value, `None` outside the fitted range.
    pub fn assign(&self, value: f64) -> Option<usize> {
        let first = self.edges[0];
        let last = self.edges[self.edges.len() - 1];
        if !(first..=last).contains(&value) {
            return None;
        }
        Some(self.edges[1..].partition_point(|edge| *edge < value))
    }

    /// Interval label of a bin.
    pub fn label(&self, bin: usize) -> String {
        let open = if bin == 0 { '[' } else { '(' };
        format!(
            "{open}{}, {}]",
            format_edge(self.edges[bin]),
            format_edge(self.edges[bin + 1])
        )
    }
}

/// Group values by quantile bin, or by raw value when binning is infeasible.
///
/// Only non-empty groups are returned, in ascending value order.
pub fn group_numeric(values: &[f64]) -> Vec<ValueGroup> {
    if let Some(bins) = QuantileBins::fit(values, DEFAULT_BINS) {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); bins.len()];
        let mut complete = true;
        for (row, value) in values.iter().enumerate() {
            match bins.assign(*value) {
                Some(bin) => members[bin].push(row),
                None => complete = false,
            }
        }
        if complete {
            return members
                .into_iter()
                .enumerate()
                .filter(|(_, rows)| !rows.is_empty())
                .map(|(bin, rows)| ValueGroup {
                    label: bins.label(bin),
                    rows,
                })
                .collect();
        }
    }
    group_raw(values)
}

fn group_raw(values: &[f64]) -> Vec<ValueGroup> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));

    let mut groups: Vec<ValueGroup> = Vec::new();
    let mut current: Option<f64> = None;
    for row in order {
        let value = values[row];
        let same = current.is_some_and(|prev| prev.total_cmp(&value) == Ordering::Equal);
        if same && let Some(group) = groups.last_mut() {
            group.rows.push(row);
            continue;
        }
        groups.push(ValueGroup {
            label: format!("{value}"),
            rows: vec![row],
        });
        current = Some(value);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(25.7, "25.7")]
    #[case(3.0, "3")]
    #[case(0.12345, "0.123")]
    #[case(-0.0001, "0")]
    #[case(100.0, "100")]
    fn test_format_edge(#[case] x: f64, #[case] expected: &str) {
        assert_eq!(format_edge(x), expected);
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile(&sorted, 0.5), 2.5);
        assert_relative_eq!(quantile(&sorted, 1.0), 4.0);
    }

    #[test]
    fn test_fit_even_sample() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let bins = QuantileBins::fit(&values, 10).unwrap();
        assert_eq!(bins.len(), 10);
        assert_relative_eq!(bins.edges()[0], 1.0);
        assert_relative_eq!(bins.edges()[10], 100.0);

        let groups = group_numeric(&values);
        assert_eq!(groups.len(), 10);
        assert!(groups.iter().all(|g| g.rows.len() == 10));
        assert_eq!(groups[0].label, "[1, 10.9]");
        assert_eq!(groups[1].label, "(10.9, 20.8]");
    }

    #[test]
    fn test_constant_values_fall_back_to_raw() {
        assert!(QuantileBins::fit(&[5.0, 5.0, 5.0], 10).is_none());
        let groups = group_numeric(&[5.0, 5.0, 5.0]);
        assert_eq!(
            groups,
            vec![ValueGroup {
                label: "5".to_string(),
                rows: vec![0, 1, 2]
            }]
        );
    }

    #[test]
    fn test_single_value_falls_back_to_raw() {
        let groups = group_numeric(&[25.7]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "25.7");
    }

    #[test]
    fn test_duplicate_edges_dropped() {
        let values = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0];
        let bins = QuantileBins::fit(&values, 10).unwrap();
        let edges = bins.edges();
        assert!(edges.windows(2).all(|w| w[0] < w[1]));

        let groups = group_numeric(&values);
        let covered: usize = groups.iter().map(|g| g.rows.len()).sum();
        assert_eq!(covered, values.len());
        assert!(groups[0].label.starts_with("[0, "));
    }

    #[test]
    fn test_every_row_lands_in_exactly_one_group() {
        let values = [3.2, 1.0, 7.5, 7.5, 2.2, 9.9, 0.1, 4.4, 4.4, 6.0, 8.1];
        let groups = group_numeric(&values);
        let mut rows: Vec<usize> = groups.iter().flat_map(|g| g.rows.clone()).collect();
        rows.sort_unstable();
        assert_eq!(rows, (0..values.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_assign_boundaries() {
        let bins = QuantileBins::fit(&[0.0, 10.0], 2).unwrap();
        assert_eq!(bins.edges(), &[0.0, 5.0, 10.0]);
        assert_eq!(bins.assign(0.0), Some(0));
        assert_eq!(bins.assign(5.0), Some(0));
        assert_eq!(bins.assign(5.1), Some(1));
        assert_eq!(bins.assign(10.0), Some(1));
        assert_eq!(bins.assign(10.1), None);
        assert_eq!(bins.label(1), "(5, 10]");
    }

    #[test]
    fn test_empty_input() {
        assert!(group_numeric(&[]).is_empty());
    }
}
