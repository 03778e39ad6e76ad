//! stereotile CLI: drive a sampling case from the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stereotile::geom::{Bounds, Point};
use stereotile::{
    CaseConfig, CaseExporter, CaseInit, CaseStore, CompletionAnalyzer, ImageFileSource, LogLevel,
    SlideGrid, SlideSource, Tag, TileLoader,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "stereotile")]
#[command(about = "Blinded random tile sampling and completion checks for slide stereology")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config, then built-in defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace. RUST_LOG takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a case for a slide and draw its tile order.
    Init {
        /// Case directory.
        case: PathBuf,
        /// Slide image the case samples.
        #[arg(long)]
        slide: PathBuf,
        /// Tile columns; derived from the slide size when omitted.
        #[arg(long, requires = "tiles_y")]
        tiles_x: Option<u32>,
        /// Tile rows; derived from the slide size when omitted.
        #[arg(long, requires = "tiles_x")]
        tiles_y: Option<u32>,
        /// Seed for a reproducible tile order.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show a tile and its annotations.
    Tile {
        case: PathBuf,
        /// Presentation index.
        index: usize,
        /// Render the displayed tile to this image file.
        #[arg(long)]
        render: Option<PathBuf>,
    },

    /// Print the first tile that is not completed.
    Next { case: PathBuf },

    /// Store an annotation read from a JSON file of points per category name.
    Annotate {
        case: PathBuf,
        /// Presentation index.
        index: usize,
        /// JSON object mapping category names to `[[x, y], ...]` polygons.
        points: PathBuf,
        /// Tag to store the annotation under; generated when omitted.
        #[arg(long)]
        tag: Option<String>,
    },

    /// Delete an annotation and everything that references it.
    Delete { case: PathBuf, tag: String },

    /// Flag an annotation as impacted.
    Impacted {
        case: PathBuf,
        tag: String,
        /// Clear the flag instead.
        #[arg(long)]
        clear: bool,
    },

    /// Mark a tile as reviewed.
    Complete {
        case: PathBuf,
        /// Presentation index.
        index: usize,
        /// Mark the tile as not reviewed instead.
        #[arg(long)]
        undo: bool,
    },

    /// Evaluate the stopping rule.
    Status {
        case: PathBuf,
        /// Also print the completion table.
        #[arg(long)]
        table: bool,
    },

    /// Write the CSV exports of a case.
    Export {
        case: PathBuf,
        /// Destination directory.
        dest: PathBuf,
        /// File name prefix; defaults to the case directory name.
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let config = CaseConfig::resolve(cli.config.as_deref())?;
    init_logging(cli.log_level.as_deref(), &config)?;

    match cli.command {
        Commands::Init {
            case,
            slide,
            tiles_x,
            tiles_y,
            seed,
        } => run_init(&config, &case, &slide, tiles_x.zip(tiles_y), seed),
        Commands::Tile {
            case,
            index,
            render,
        } => run_tile(&case, index, render.as_deref()),
        Commands::Next { case } => run_next(&case),
        Commands::Annotate {
            case,
            index,
            points,
            tag,
        } => run_annotate(&case, index, &points, tag),
        Commands::Delete { case, tag } => run_delete(&case, &tag),
        Commands::Impacted { case, tag, clear } => run_impacted(&case, &tag, clear),
        Commands::Complete { case, index, undo } => run_complete(&case, index, undo),
        Commands::Status { case, table } => run_status(&config, &case, table),
        Commands::Export { case, dest, name } => run_export(&config, &case, &dest, name),
    }
}

fn init_logging(cli_level: Option<&str>, config: &CaseConfig) -> CliResult<()> {
    let level = match cli_level {
        Some(name) => LogLevel::from_name(name)
            .ok_or_else(|| format!("unknown log level '{}'", name))?,
        None => config.log_level,
    };
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .init();
    Ok(())
}

fn run_init(
    config: &CaseConfig,
    case: &Path,
    slide: &Path,
    tiles: Option<(u32, u32)>,
    seed: Option<u64>,
) -> CliResult<()> {
    let grid = match tiles {
        Some((tiles_x, tiles_y)) => SlideGrid::from_config(tiles_x, tiles_y, &config.grid),
        None => {
            let source = ImageFileSource::open(slide)?;
            let (width, height) = source.dimensions();
            SlideGrid::from_slide_dimensions(width, height, &config.grid)
        }
    };
    let slide_path = std::fs::canonicalize(slide).unwrap_or_else(|_| slide.to_path_buf());

    let store = CaseStore::initialize(
        case,
        CaseInit {
            slide_path,
            grid,
            categories: config.category_set(),
            seed,
        },
    )?;
    println!(
        "Initialized {} with {}x{} tiles ({} total)",
        store.dir().display(),
        grid.tiles_x,
        grid.tiles_y,
        store.tile_count()
    );
    Ok(())
}

fn run_tile(case: &Path, index: usize, render: Option<&Path>) -> CliResult<()> {
    let store = CaseStore::open(case)?;
    let status = store.tile_status(index)?;
    let rect = store.pixel_rect(index)?;

    println!("Tile {} of {}", index, store.tile_count());
    println!("  completed: {}", status.completed);
    println!(
        "  window:    {}x{} at ({}, {})",
        rect.width, rect.height, rect.x, rect.y
    );

    let categories = store.categories();
    for ann in store.annotations_for_tile(index)? {
        let flag = if ann.impacted { " [impacted]" } else { "" };
        println!("  annotation {}{}", ann.tag, flag);
        for shape in ann.shapes.iter().filter(|s| s.is_drawn()) {
            let bounds = Bounds::of(&shape.points);
            let extent = bounds.map_or_else(String::new, |b| {
                format!(" bounds {:.0}x{:.0}", b.width(), b.height())
            });
            println!(
                "    {:<12} {:>3} pts  area {:.1}{}",
                categories.name(shape.category),
                shape.points.len(),
                shape.area,
                extent
            );
        }
        if let Some(axis) = ann.reference_axis() {
            println!("    reference depth {:.1}", axis.distance);
        }
    }

    if let Some(out) = render {
        let loader = TileLoader::new(ImageFileSource::open(store.slide_path())?);
        let real = store.resolve(index)?;
        loader.load(store.grid(), real)?.save(out)?;
        println!("Rendered tile to {}", out.display());
    }
    Ok(())
}

fn run_next(case: &Path) -> CliResult<()> {
    let store = CaseStore::open(case)?;
    let next = store.first_incomplete()?;
    println!("{}", next);
    Ok(())
}

fn run_annotate(case: &Path, index: usize, points: &Path, tag: Option<String>) -> CliResult<()> {
    let json = std::fs::read_to_string(points)?;
    let raw: BTreeMap<String, Vec<(f64, f64)>> = serde_json::from_str(&json)?;
    let polygons: BTreeMap<String, Vec<Point>> = raw
        .into_iter()
        .map(|(name, pts)| (name, pts.into_iter().map(Point::from).collect()))
        .collect();

    let mut store = CaseStore::open(case)?;
    let ann = store.create_named(index, &polygons, tag.map(Tag::from))?;
    println!("{}", ann.tag);
    Ok(())
}

fn run_delete(case: &Path, tag: &str) -> CliResult<()> {
    let mut store = CaseStore::open(case)?;
    if store.delete(&Tag::from(tag))? {
        println!("Deleted {}", tag);
    } else {
        println!("No annotation {}", tag);
    }
    Ok(())
}

fn run_impacted(case: &Path, tag: &str, clear: bool) -> CliResult<()> {
    let mut store = CaseStore::open(case)?;
    let tag = Tag::from(tag);
    if clear {
        store.unmark_impacted(&tag)?;
    } else {
        store.mark_impacted(&tag)?;
    }
    println!("{} impacted: {}", tag, store.is_impacted(&tag));
    Ok(())
}

fn run_complete(case: &Path, index: usize, undo: bool) -> CliResult<()> {
    let mut store = CaseStore::open(case)?;
    store.set_completed(index, !undo)?;
    println!(
        "Tile {} completed: {} ({}/{} done)",
        index,
        !undo,
        store.completed_count(),
        store.tile_count()
    );
    Ok(())
}

fn run_status(config: &CaseConfig, case: &Path, show_table: bool) -> CliResult<()> {
    let store = CaseStore::open(case)?;
    let report = CompletionAnalyzer::new(config.completion.clone()).analyze(&store);
    let categories = store.categories();

    println!("State:             {}", report.state.name());
    println!(
        "Completed tiles:   {} (minimum {})",
        report.completed_tiles, config.completion.min_finished_tiles
    );
    println!("Annotations:       {}", report.total_annotations);
    println!(
        "Passed rows:       {}/{}",
        report.passed_rows, report.required_rows
    );
    let qualifying: Vec<String> = report.qualifying.iter().map(|&id| categories.name(id)).collect();
    println!("Qualifying:        {}", qualifying.join(", "));
    if report.exempt {
        println!("Rare-category exemption applied");
    }

    if let Some(latest) = report.table.last() {
        for (col, &id) in report.table.measured.iter().enumerate() {
            let ce = latest.ce[col].map_or_else(|| "-".to_string(), |ce| format!("{:.2}", ce));
            println!(
                "  {:<12} {:>7.2}%  CE {}",
                categories.name(id),
                latest.percentages[col],
                ce
            );
        }
    }

    if show_table {
        for row in &report.table.rows {
            let ces: Vec<String> = row
                .ce
                .iter()
                .map(|ce| ce.map_or_else(|| "-".to_string(), |ce| format!("{:.2}", ce)))
                .collect();
            let percs: Vec<String> = row.percentages.iter().map(|p| format!("{:.2}", p)).collect();
            println!(
                "{:>5} {:>6}  perc [{}]  ce [{}]",
                row.presentation,
                row.real,
                percs.join(", "),
                ces.join(", ")
            );
        }
    }
    Ok(())
}

fn run_export(config: &CaseConfig, case: &Path, dest: &Path, name: Option<String>) -> CliResult<()> {
    let store = CaseStore::open(case)?;
    let name = name
        .or_else(|| {
            case.file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "case".to_string());

    let result = CaseExporter::new(config.completion.clone()).export(&store, dest, &name)?;
    for path in &result.files_created {
        println!("{}", path.display());
    }
    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}
