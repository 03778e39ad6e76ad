//! Tabular case exports.
//!
//! Exports are rendered in memory into an [`ExportResult`] (file name to
//! CSV content) and then written to a destination directory. Nothing is
//! written unless rendering succeeds; a write failure part way through can
//! still leave the earlier files in place.

mod csv;
mod tables;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::CompletionAnalyzer;
use crate::config::CompletionConfig;
use crate::error::Result;
use crate::model::CategoryId;
use crate::store::CaseStore;

/// Result of an export operation.
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    /// File name to file content, in name order.
    pub files: BTreeMap<String, String>,
    /// Files written by [`ExportResult::write_to`].
    pub files_created: Vec<PathBuf>,
    /// Number of annotations covered by the export.
    pub annotations_exported: usize,
    /// Number of point rows across all category files.
    pub points_exported: usize,
    /// Non-fatal issues found while rendering.
    pub warnings: Vec<String>,
}

impl ExportResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the export result.
    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.files.insert(name.into(), content.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Write every rendered file into `dir`, creating it if needed.
    ///
    /// Files are written one by one; on error, `files_created` lists the
    /// ones already on disk.
    pub fn write_to(&mut self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        for (name, content) in &self.files {
            let path = dir.join(name);
            fs::write(&path, content)?;
            log::debug!("Wrote {:?} ({} bytes)", path, content.len());
            self.files_created.push(path);
        }
        Ok(())
    }
}

/// Renders the CSV exports of a case.
#[derive(Debug, Clone)]
pub struct CaseExporter {
    analyzer: CompletionAnalyzer,
}

impl CaseExporter {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            analyzer: CompletionAnalyzer::new(config),
        }
    }

    /// Render all exports of `store` without touching the filesystem.
    pub fn render(&self, store: &CaseStore, case_name: &str) -> Result<ExportResult> {
        let mut result = ExportResult::new();
        let report = self.analyzer.analyze(store);
        let categories = store.categories();

        result.add_file(
            format!("{}-info.csv", case_name),
            tables::info(&report.table, categories),
        );
        result.add_file(
            format!("{}-counts.csv", case_name),
            tables::tile_counts(store),
        );

        let totals = store.category_counts();
        if totals.get(CategoryId::REFERENCE) == 0 && store.total_annotations() > 0 {
            result.add_warning(format!(
                "No annotation has a {} area; count percentages are reported as 0",
                categories.name(CategoryId::REFERENCE)
            ));
        }
        result.add_file(
            format!("{}-count-percentages.csv", case_name),
            tables::count_percentages(&totals, categories),
        );
        result.add_file(
            format!("{}-impacted-tags.csv", case_name),
            tables::impacted_tags(&store.impacted_tags()),
        );

        let annotations = store.annotations();
        for (id, category) in categories.iter() {
            let (content, rows) = tables::points(store, &annotations, id)?;
            result.points_exported += rows;
            result.add_file(format!("{}-{}-pts.csv", case_name, category.name), content);
        }
        result.annotations_exported = annotations.len();

        Ok(result)
    }

    /// Render and write all exports of `store` into `dest_dir`.
    pub fn export(&self, store: &CaseStore, dest_dir: &Path, case_name: &str) -> Result<ExportResult> {
        let mut result = self.render(store, case_name)?;
        result.write_to(dest_dir)?;
        log::info!(
            "Exported case {} to {:?}: {} files, {} annotations, {} points",
            case_name,
            dest_dir,
            result.files_created.len(),
            result.annotations_exported,
            result.points_exported
        );
        for warning in &result.warnings {
            log::warn!("{}", warning);
        }
        Ok(result)
    }
}
