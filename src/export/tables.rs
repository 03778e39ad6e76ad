//! Rendering of the individual export tables.

use stereotile_geom::Point;

use super::csv::{number, CsvBuilder};
use crate::analysis::{round2, CompletionTable};
use crate::error::Result;
use crate::model::{Annotation, CategoryId, CategorySet, Tag};
use crate::store::{CaseStore, CategoryCounts};

/// Completion table: one row per finished, annotated tile.
pub fn info(table: &CompletionTable, categories: &CategorySet) -> String {
    let mut header = vec![
        "presentation_index".to_string(),
        "real_index".to_string(),
        "completed".to_string(),
    ];
    header.extend(categories.iter().map(|(_, c)| format!("{}_area", c.name)));
    header.extend(categories.iter().map(|(_, c)| format!("{}_cumulative", c.name)));
    header.extend(table.measured.iter().map(|&id| format!("{}_perc", categories.name(id))));
    header.extend(table.measured.iter().map(|&id| format!("{}_ce", categories.name(id))));

    let mut csv = CsvBuilder::with_header(header);
    for row in &table.rows {
        let mut cells = vec![
            row.presentation.to_string(),
            row.real.to_string(),
            "1".to_string(),
        ];
        cells.extend(row.areas.iter().map(|&a| number(Some(a))));
        cells.extend(row.cumulative.iter().map(|&a| number(Some(a))));
        cells.extend(row.percentages.iter().map(|&p| number(Some(p))));
        cells.extend(row.ce.iter().map(|&ce| number(ce)));
        csv.row(cells);
    }
    csv.finish()
}

/// Per-tile annotation counts for tiles that carry annotations.
pub fn tile_counts(store: &CaseStore) -> String {
    let categories = store.categories();
    let mut header = vec!["presentation_index".to_string(), "real_index".to_string()];
    header.extend(categories.iter().map(|(_, c)| format!("{}_count", c.name)));
    header.push("impacted_count".to_string());

    let mut csv = CsvBuilder::with_header(header);
    let areas = store.tile_areas();
    for (tile, counts) in store.tile_counts().iter().enumerate() {
        if areas[tile].1 == 0 {
            continue;
        }
        let mut cells = vec![tile.to_string(), store.record().tiles[tile].real.to_string()];
        cells.extend(counts.per_category.iter().map(ToString::to_string));
        cells.push(counts.impacted.to_string());
        csv.row(cells);
    }
    csv.finish()
}

/// Case-wide counts and their share of the reference count.
pub fn count_percentages(totals: &CategoryCounts, categories: &CategorySet) -> String {
    let mut header: Vec<String> = categories
        .iter()
        .map(|(_, c)| format!("total_{}", c.name))
        .collect();
    header.push("total_impacted".to_string());
    header.extend(
        categories
            .measured_ids()
            .map(|id| format!("{}_count_perc", categories.name(id))),
    );
    header.push("impacted_count_perc".to_string());

    let reference = totals.get(CategoryId::REFERENCE);
    let share = |count: usize| {
        if reference == 0 {
            0.0
        } else {
            round2(count as f64 / reference as f64 * 100.0)
        }
    };

    let mut cells: Vec<String> = totals.per_category.iter().map(ToString::to_string).collect();
    cells.push(totals.impacted.to_string());
    cells.extend(
        categories
            .measured_ids()
            .map(|id| number(Some(share(totals.get(id))))),
    );
    cells.push(number(Some(share(totals.impacted))));

    let mut csv = CsvBuilder::with_header(header);
    csv.row(cells);
    csv.finish()
}

pub fn impacted_tags(tags: &[Tag]) -> String {
    let mut csv = CsvBuilder::with_header(["tag"]);
    for tag in tags {
        csv.row([tag.as_str()]);
    }
    csv.finish()
}

/// Polygon vertices of one category in tile-local and slide coordinates.
///
/// Returns the CSV content and the number of point rows.
pub fn points(
    store: &CaseStore,
    annotations: &[Annotation],
    category: CategoryId,
) -> Result<(String, usize)> {
    let grid = store.grid();
    let mut csv = CsvBuilder::with_header([
        "tag",
        "presentation_index",
        "real_index",
        "rel_x",
        "rel_y",
        "local_x",
        "local_y",
        "slide_x",
        "slide_y",
    ]);
    let mut rows = 0;

    for ann in annotations {
        let Some(shape) = ann.shape(category) else {
            continue;
        };
        if !shape.is_drawn() {
            continue;
        }
        let real = store.resolve(ann.tile)?;
        for &p in &shape.points {
            let local: Point = grid.to_tile_local(p);
            let slide = grid.to_slide(real, p)?;
            csv.row([
                ann.tag.to_string(),
                ann.tile.to_string(),
                real.to_string(),
                number(Some(p.x)),
                number(Some(p.y)),
                number(Some(local.x)),
                number(Some(local.y)),
                number(Some(slide.x)),
                number(Some(slide.y)),
            ]);
            rows += 1;
        }
    }
    Ok((csv.finish(), rows))
}
