//! Cumulative completion table.

use crate::model::CategoryId;

/// Summed annotation areas of one finished tile, the analyzer's input row.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSample {
    pub presentation: usize,
    pub real: usize,
    /// Summed area per category, in category order
    pub areas: Vec<f64>,
}

/// One row of the completion table.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRow {
    pub presentation: usize,
    pub real: usize,
    /// Area per category on this tile
    pub areas: Vec<f64>,
    /// Running area per category up to and including this tile
    pub cumulative: Vec<f64>,
    /// Percentage of the reference cumulative area, one entry per measured
    /// category
    pub percentages: Vec<f64>,
    /// Rolling std of each percentage, `None` until the window is full
    pub rolling_std: Vec<Option<f64>>,
    /// Coefficient of error per measured category
    pub ce: Vec<Option<f64>>,
}

/// Per-row cumulative statistics, in presentation order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionTable {
    /// Measured categories, giving the column order of `percentages`,
    /// `rolling_std` and `ce`
    pub measured: Vec<CategoryId>,
    pub window: usize,
    pub rows: Vec<CompletionRow>,
}

impl CompletionTable {
    /// Build the table from finished tiles sorted by presentation index.
    ///
    /// `categories` is the total category count; index 0 is the reference.
    pub fn build(samples: &[TileSample], categories: usize, window: usize) -> Self {
        let measured: Vec<CategoryId> = (1..categories).map(CategoryId).collect();
        let mut running = vec![0.0; categories];
        let mut rows: Vec<CompletionRow> = Vec::with_capacity(samples.len());

        for sample in samples {
            for (sum, area) in running.iter_mut().zip(&sample.areas) {
                *sum += area;
            }
            let reference = running.first().copied().unwrap_or(0.0);
            let percentages: Vec<f64> = measured
                .iter()
                .map(|id| percentage(running[id.index()], reference))
                .collect();

            rows.push(CompletionRow {
                presentation: sample.presentation,
                real: sample.real,
                areas: sample.areas.clone(),
                cumulative: running.clone(),
                percentages,
                rolling_std: vec![None; measured.len()],
                ce: vec![None; measured.len()],
            });
        }

        for col in 0..measured.len() {
            let series: Vec<f64> = rows.iter().map(|r| r.percentages[col]).collect();
            for (i, std) in rolling_sample_std(&series, window).into_iter().enumerate() {
                let row = &mut rows[i];
                row.rolling_std[col] = std;
                row.ce[col] = std.and_then(|s| coefficient_of_error(s, row.percentages[col]));
            }
        }

        Self {
            measured,
            window,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn last(&self) -> Option<&CompletionRow> {
        self.rows.last()
    }

    /// Column of a measured category, `None` for the reference.
    pub fn column(&self, category: CategoryId) -> Option<usize> {
        self.measured.iter().position(|&c| c == category)
    }
}

/// Cumulative percentage of the reference area, rounded to two decimals.
pub fn percentage(cumulative: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    round2(100.0 * cumulative / reference)
}

/// Round half to even at two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// `std / percentage * 100`, undefined for a zero percentage.
pub fn coefficient_of_error(std: f64, percentage: f64) -> Option<f64> {
    if percentage == 0.0 || !std.is_finite() {
        return None;
    }
    Some(100.0 * std / percentage)
}

/// Trailing sample standard deviation (n - 1 denominator) over `window`
/// values. The first `window - 1` entries are `None`.
pub fn rolling_sample_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let mean = slice.iter().sum::<f64>() / window as f64;
            let ss: f64 = slice.iter().map(|v| (v - mean).powi(2)).sum();
            Some((ss / (window - 1) as f64).sqrt())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(presentation: usize, areas: &[f64]) -> TileSample {
        TileSample {
            presentation,
            real: presentation + 100,
            areas: areas.to_vec(),
        }
    }

    #[test]
    fn test_round2_ties_even() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.236), 1.24);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(33.333333), 33.33);
    }

    #[test]
    fn test_percentage_zero_reference() {
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(1.0, 3.0), 33.33);
    }

    #[test]
    fn test_rolling_std_matches_sample_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = rolling_sample_std(&values, 8);
        assert!(std[..7].iter().all(Option::is_none));
        // Sample variance of the classic example is 32 / 7
        assert!((std[7].unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);

        let std = rolling_sample_std(&[1.0, 3.0, 5.0], 2);
        assert_eq!(std[0], None);
        assert!((std[1].unwrap() - 2.0f64.sqrt()).abs() < 1e-12);
        assert!((std[2].unwrap() - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_series_has_zero_ce() {
        let samples: Vec<_> = (0..4).map(|i| sample(i, &[100.0, 10.0])).collect();
        let table = CompletionTable::build(&samples, 2, 3);
        assert_eq!(table.measured, vec![CategoryId(1)]);
        assert_eq!(table.rows[0].ce, vec![None]);
        assert_eq!(table.rows[1].ce, vec![None]);
        assert_eq!(table.rows[2].ce, vec![Some(0.0)]);
        assert_eq!(table.rows[3].percentages, vec![10.0]);
        assert_eq!(table.rows[3].cumulative, vec![400.0, 40.0]);
    }

    #[test]
    fn test_zero_percentage_has_no_ce() {
        let samples: Vec<_> = (0..3).map(|i| sample(i, &[100.0, 0.0])).collect();
        let table = CompletionTable::build(&samples, 2, 2);
        assert_eq!(table.rows[2].rolling_std, vec![Some(0.0)]);
        assert_eq!(table.rows[2].ce, vec![None]);
    }

    #[test]
    fn test_cumulative_percentages() {
        let samples = vec![sample(0, &[100.0, 10.0, 0.0]), sample(3, &[100.0, 30.0, 1.0])];
        let table = CompletionTable::build(&samples, 3, 2);
        assert_eq!(table.rows[0].percentages, vec![10.0, 0.0]);
        assert_eq!(table.rows[1].percentages, vec![20.0, 0.5]);
        let std = table.rows[1].rolling_std[0].unwrap();
        assert!((std - 50.0f64.sqrt()).abs() < 1e-12);
        let ce = table.rows[1].ce[0].unwrap();
        assert!((ce - 100.0 * 50.0f64.sqrt() / 20.0).abs() < 1e-9);
        assert_eq!(table.column(CategoryId(2)), Some(1));
        assert_eq!(table.column(CategoryId(0)), None);
    }
}
