//! Sampling stopping rule.
//!
//! The analyzer is a pure function of a store snapshot and the
//! [`CompletionConfig`]: it builds the cumulative [`CompletionTable`] over
//! finished tiles and decides whether enough tiles have been sampled.

mod table;

pub use table::{
    coefficient_of_error, percentage, rolling_sample_std, round2, CompletionRow,
    CompletionTable, TileSample,
};

use crate::config::CompletionConfig;
use crate::model::CategoryId;
use crate::store::CaseStore;

/// Where a case stands with respect to the stopping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not enough finished tiles to evaluate the rule
    InsufficientTiles,
    /// Evaluated, keep sampling
    Accumulating,
    /// Sampling may stop
    Done,
}

impl SessionState {
    pub fn is_done(self) -> bool {
        self == Self::Done
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::InsufficientTiles => "insufficient-tiles",
            Self::Accumulating => "accumulating",
            Self::Done => "done",
        }
    }
}

/// Outcome of a completion check.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub state: SessionState,
    /// Tiles marked completed anywhere in the case
    pub completed_tiles: usize,
    pub total_annotations: usize,
    /// Measured categories whose latest percentage exceeds the threshold
    pub qualifying: Vec<CategoryId>,
    /// Trailing rows that met the CE target
    pub passed_rows: usize,
    /// Trailing rows required to pass
    pub required_rows: usize,
    /// Whether the rare-category exemption decided the outcome
    pub exempt: bool,
    pub table: CompletionTable,
}

/// Evaluates the stopping rule with a fixed set of thresholds.
#[derive(Debug, Clone)]
pub struct CompletionAnalyzer {
    config: CompletionConfig,
}

impl CompletionAnalyzer {
    pub fn new(config: CompletionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Finished tiles that carry at least one annotation, in presentation
    /// order.
    pub fn samples(store: &CaseStore) -> Vec<TileSample> {
        let record = store.record();
        store
            .tile_areas()
            .into_iter()
            .enumerate()
            .filter(|(tile, (_, count))| record.tiles[*tile].completed && *count > 0)
            .map(|(tile, (areas, _))| TileSample {
                presentation: tile,
                real: record.tiles[tile].real,
                areas,
            })
            .collect()
    }

    /// Evaluate the stopping rule for a case.
    pub fn analyze(&self, store: &CaseStore) -> CompletionReport {
        let samples = Self::samples(store);
        let table = CompletionTable::build(
            &samples,
            store.categories().len(),
            self.config.rolling_window,
        );
        let report = self.evaluate(table, store.completed_count(), store.total_annotations());
        log::debug!(
            "Completion check: {} ({} rows, {}/{} passed, exempt: {})",
            report.state.name(),
            report.table.len(),
            report.passed_rows,
            report.required_rows,
            report.exempt
        );
        report
    }

    /// Apply the stopping rule to a built table.
    pub fn evaluate(
        &self,
        table: CompletionTable,
        completed_tiles: usize,
        total_annotations: usize,
    ) -> CompletionReport {
        let required = self.config.passed_tiles_req;
        let mut report = CompletionReport {
            state: SessionState::InsufficientTiles,
            completed_tiles,
            total_annotations,
            qualifying: Vec::new(),
            passed_rows: 0,
            required_rows: required,
            exempt: false,
            table,
        };

        let Some(latest) = report.table.last() else {
            return report;
        };
        if completed_tiles < self.config.min_finished_tiles {
            return report;
        }

        let qualifying_cols: Vec<usize> = latest
            .percentages
            .iter()
            .enumerate()
            .filter(|(_, p)| **p > self.config.min_perc)
            .map(|(col, _)| col)
            .collect();
        report.qualifying = qualifying_cols
            .iter()
            .map(|&col| report.table.measured[col])
            .collect();

        if !qualifying_cols.is_empty() {
            let start = report.table.len().saturating_sub(required);
            report.passed_rows = report.table.rows[start..]
                .iter()
                .filter(|row| {
                    qualifying_cols
                        .iter()
                        .all(|&col| matches!(row.ce[col], Some(ce) if ce < self.config.max_ce))
                })
                .count();
        }

        report.state = if qualifying_cols.is_empty()
            && total_annotations < self.config.max_annotations
        {
            report.exempt = true;
            SessionState::Done
        } else if report.passed_rows == required {
            SessionState::Done
        } else {
            SessionState::Accumulating
        };
        report
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use stereotile_geom::Point;
    use tempfile::TempDir;

    use super::*;
    use crate::grid::SlideGrid;
    use crate::model::{CategoryPoints, CategorySet};
    use crate::store::CaseInit;

    fn config(window: usize, required: usize, min_finished: usize) -> CompletionConfig {
        CompletionConfig {
            min_finished_tiles: min_finished,
            passed_tiles_req: required,
            rolling_window: window,
            ..CompletionConfig::default()
        }
    }

    fn samples(measured: &[f64]) -> Vec<TileSample> {
        measured
            .iter()
            .enumerate()
            .map(|(i, &m)| TileSample {
                presentation: i,
                real: i,
                areas: vec![100.0, m, 0.0],
            })
            .collect()
    }

    fn run(analyzer: &CompletionAnalyzer, measured: &[f64], annotations: usize) -> CompletionReport {
        let cfg = analyzer.config();
        let table = CompletionTable::build(&samples(measured), 3, cfg.rolling_window);
        analyzer.evaluate(table, measured.len(), annotations)
    }

    fn square(offset: f64, side: f64) -> Vec<Point> {
        vec![
            Point::new(offset, offset),
            Point::new(offset + side, offset),
            Point::new(offset + side, offset + side),
            Point::new(offset, offset + side),
        ]
    }

    fn annotate(store: &mut CaseStore, tile: usize, measured_side: f64) {
        let mut points = CategoryPoints::new();
        points.insert(CategoryId(0), square(0.0, 10.0));
        points.insert(CategoryId(1), square(5.0, measured_side));
        store.create(tile, &points, None).unwrap();
    }

    #[test]
    fn test_store_rows_follow_completion() {
        let tmp = TempDir::new().unwrap();
        let mut store = CaseStore::initialize(
            tmp.path(),
            CaseInit {
                slide_path: PathBuf::from("slide.svs"),
                grid: SlideGrid::new(3, 2, 1000, 100),
                categories: CategorySet::default(),
                seed: Some(3),
            },
        )
        .unwrap();

        annotate(&mut store, 0, 4.0);
        annotate(&mut store, 1, 9.0);
        annotate(&mut store, 2, 2.0);
        store.set_completed(0, true).unwrap();
        store.set_completed(2, true).unwrap();
        // Finished but empty
        store.set_completed(3, true).unwrap();

        let samples = CompletionAnalyzer::samples(&store);
        let presented: Vec<usize> = samples.iter().map(|s| s.presentation).collect();
        assert_eq!(presented, vec![0, 2]);
        assert_eq!(samples[1].real, store.randomization().resolve(2).unwrap());

        let analyzer = CompletionAnalyzer::new(config(2, 1, 3));
        let report = analyzer.analyze(&store);
        assert_eq!(report.completed_tiles, 3);
        assert_eq!(report.total_annotations, 3);
        assert_eq!(report.table.len(), 2);
        let last = report.table.last().unwrap();
        assert_eq!(last.cumulative[..2], [200.0, 20.0]);
        assert_eq!(last.percentages[0], 10.0);
        assert_eq!(report.qualifying, vec![CategoryId(1)]);
        assert_eq!(report.state, SessionState::Accumulating);

        // The empty tile is the third finished one
        let report = CompletionAnalyzer::new(config(2, 1, 4)).analyze(&store);
        assert_eq!(report.state, SessionState::InsufficientTiles);
        assert_eq!(report.table.len(), 2);
    }

    #[test]
    fn test_empty_dataset_is_insufficient() {
        let analyzer = CompletionAnalyzer::new(CompletionConfig::default());
        let report = analyzer.evaluate(CompletionTable::default(), 0, 0);
        assert_eq!(report.state, SessionState::InsufficientTiles);
        assert!(!report.state.is_done());
    }

    #[test]
    fn test_too_few_completed_tiles() {
        let analyzer = CompletionAnalyzer::new(CompletionConfig::default());
        let report = run(&analyzer, &[10.0; 19], 19);
        assert_eq!(report.state, SessionState::InsufficientTiles);

        // Completed tiles without annotations still count
        let table = CompletionTable::build(&samples(&[0.5; 5]), 3, 10);
        let report = analyzer.evaluate(table, 20, 5);
        assert_eq!(report.state, SessionState::Done);
    }

    #[test]
    fn test_rare_category_exemption() {
        let analyzer = CompletionAnalyzer::new(config(3, 3, 3));
        let report = run(&analyzer, &[1.0, 2.0, 1.0, 0.0], 40);
        assert!(report.qualifying.is_empty());
        assert_eq!(report.state, SessionState::Done);
        assert!(report.exempt);
        assert_eq!(report.passed_rows, 0);

        let report = run(&analyzer, &[1.0, 2.0, 1.0, 0.0], 3500);
        assert_eq!(report.state, SessionState::Accumulating);
        assert!(!report.exempt);
    }

    #[test]
    fn test_stable_percentages_finish() {
        let analyzer = CompletionAnalyzer::new(CompletionConfig::default());
        let report = run(&analyzer, &[10.0; 20], 20);
        assert_eq!(report.qualifying, vec![CategoryId(1)]);
        assert_eq!(report.passed_rows, 10);
        assert_eq!(report.state, SessionState::Done);
        assert!(!report.exempt);
    }

    #[test]
    fn test_unstable_last_row_keeps_accumulating() {
        let analyzer = CompletionAnalyzer::new(CompletionConfig::default());
        let mut measured = [10.0; 20];
        measured[19] = 60.0;
        let report = run(&analyzer, &measured, 20);
        assert_eq!(report.passed_rows, 9);
        assert_eq!(report.state, SessionState::Accumulating);
    }

    #[test]
    fn test_window_not_full_fails_rows() {
        let analyzer = CompletionAnalyzer::new(CompletionConfig::default());
        let report = run(&analyzer, &[10.0; 10], 20);
        let table = CompletionTable::build(&samples(&[10.0; 10]), 3, 10);
        let report_completed = analyzer.evaluate(table, 20, 10);
        assert_eq!(report.state, SessionState::InsufficientTiles);
        assert_eq!(report_completed.passed_rows, 1);
        assert_eq!(report_completed.state, SessionState::Accumulating);
    }

    #[test]
    fn test_small_window() {
        let analyzer = CompletionAnalyzer::new(config(3, 3, 3));
        let report = run(&analyzer, &[10.0; 5], 5);
        assert_eq!(report.state, SessionState::Done);

        // 10, 10, 12 percent: CE around 9.6
        let report = run(&analyzer, &[10.0, 10.0, 10.0, 10.0, 20.0], 5);
        assert_eq!(report.passed_rows, 2);
        assert_eq!(report.state, SessionState::Accumulating);
    }
}
