use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::{cursor, terminal};
use directories::ProjectDirs;
use serde::Serialize;
use snipdoc_core::{HighlightRange, MatchResult, RenderImage, Viewer, ViewerConfig};
use snipdoc_render::PdfiumProvider;
use snipdoc_tty::{apply_highlights, format_status, write_status_line, DrawParams, KittyRenderer};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "snipdoc",
    version,
    about = "Jump to the page of a document that best matches a text snippet"
)]
struct Args {
    /// Document path or file:// URL
    url: String,

    /// Snippet to locate and highlight
    #[arg(short = 'q', long = "query")]
    query: Option<String>,

    /// Page to show before searching (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Config file (defaults to the platform config dir)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Draw the page with the kitty graphics protocol
    #[arg(long)]
    draw: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Repeat to log more to stderr
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    url: &'a str,
    current_page: Option<usize>,
    total_pages: usize,
    matched: Option<&'a MatchResult>,
    highlights: &'a [HighlightRange],
    highlighted_text: Vec<&'a str>,
    load_error: Option<String>,
    render_error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "snipdoc", "snipdoc")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs.data_local_dir().join("logs"), args.verbose)?;
    let config = load_config(args.config.as_deref(), &project_dirs)?;

    let provider = PdfiumProvider::new()?;
    let mut viewer = Viewer::new(Arc::new(provider), config);
    let outcome = run(&mut viewer, &args).await;
    viewer.teardown();
    outcome
}

async fn run(viewer: &mut Viewer, args: &Args) -> Result<()> {
    viewer
        .open(&args.url)
        .await
        .with_context(|| format!("failed to open {}", args.url))?;

    if let Some(page) = args.page {
        viewer.goto_page(page).await?;
    }
    viewer.wait_for_render().await;

    let matched = match args.query.as_deref() {
        Some(query) => {
            let matched = viewer.search_and_highlight(query).await?;
            if matched.is_none() {
                warn!(query, "no page matches the query");
            }
            matched
        }
        None => None,
    };

    let state = viewer.state();
    let layer = viewer.text_layer();
    if args.json {
        let report = Report {
            url: &args.url,
            current_page: state.current_page,
            total_pages: state.total_pages,
            matched: matched.as_ref(),
            highlights: layer.highlights(),
            highlighted_text: layer.highlighted_text(),
            load_error: state.load_error.as_ref().map(ToString::to_string),
            render_error: state.render_error.as_ref().map(ToString::to_string),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !args.draw {
        println!("{}", format_status(&state, matched.as_ref()));
    }

    if args.draw {
        let Some(frame) = viewer.frame() else {
            warn!("nothing rendered; skipping draw");
            return Ok(());
        };
        let mut image = frame.image;
        let config = viewer.config();
        apply_highlights(
            &mut image,
            &layer.highlight_rects(),
            config.highlight_color,
            config.highlight_alpha,
        );
        draw(&image, &format_status(&state, matched.as_ref()))?;
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>, project_dirs: &ProjectDirs) -> Result<ViewerConfig> {
    if let Some(path) = explicit {
        return ViewerConfig::load(path)
            .with_context(|| format!("failed to load config {:?}", path));
    }

    let default_path = project_dirs.config_dir().join("config.toml");
    if default_path.exists() {
        info!(path = %default_path.display(), "loading config");
        ViewerConfig::load(&default_path)
            .with_context(|| format!("failed to load config {:?}", default_path))
    } else {
        Ok(ViewerConfig::default())
    }
}

fn draw(image: &RenderImage, status: &str) -> Result<()> {
    let window = terminal::window_size()?;
    let total_cols = u32::from(window.columns).max(1);
    let total_rows = u32::from(window.rows).max(1);
    let image_rows = total_rows.saturating_sub(1).max(1);
    let (columns, rows) = fit_cells(
        image,
        total_cols,
        image_rows,
        u32::from(window.width),
        u32::from(window.height),
        total_rows,
    );

    let mut renderer = KittyRenderer::new(io::stdout());
    renderer.clear_all()?;
    renderer.draw(image, DrawParams::clamped(columns, rows))?;

    let writer = renderer.writer();
    crossterm::execute!(writer, cursor::MoveTo(0, image_rows as u16))?;
    write_status_line(writer, status)?;
    writeln!(writer)?;
    Ok(())
}

/// Largest cell box with the image's aspect ratio that fits the terminal.
/// Falls back to 2:1 cells when the terminal does not report pixel sizes.
fn fit_cells(
    image: &RenderImage,
    available_cols: u32,
    available_rows: u32,
    pixel_width: u32,
    pixel_height: u32,
    total_rows: u32,
) -> (u32, u32) {
    if image.width == 0 || image.height == 0 {
        return (available_cols.max(1), available_rows.max(1));
    }

    let (cell_width, cell_height) = if pixel_width > 0 && pixel_height > 0 {
        (
            pixel_width as f32 / available_cols.max(1) as f32,
            pixel_height as f32 / total_rows.max(1) as f32,
        )
    } else {
        (1.0, 2.0)
    };

    let width_cells = image.width as f32 / cell_width;
    let height_cells = image.height as f32 / cell_height;
    let ratio = (available_cols as f32 / width_cells).min(available_rows as f32 / height_cells);
    if !ratio.is_finite() || ratio <= 0.0 {
        return (available_cols.max(1), available_rows.max(1));
    }

    let columns = (width_cells * ratio).round().clamp(1.0, available_cols.max(1) as f32);
    let rows = (height_cells * ratio).round().clamp(1.0, available_rows.max(1) as f32);
    (columns as u32, rows as u32)
}

/// Everything at `SNIPDOC_LOG` (default `info`) goes to a daily log file;
/// stderr only carries warnings unless `-v` raises it.
fn init_logging(log_dir: &Path, verbosity: u8) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {:?}", log_dir))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "snipdoc.log"));
    let file_filter =
        EnvFilter::try_from_env("SNIPDOC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(file_filter);
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(console_level(verbosity));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

fn console_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> RenderImage {
        RenderImage {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    #[test]
    fn portrait_page_is_limited_by_rows() {
        // 10x20 pixel cells, 100x50 cell terminal.
        let (cols, rows) = fit_cells(&image(850, 1100), 100, 49, 1000, 1000, 50);
        assert_eq!(rows, 49);
        assert!(cols < 100);
    }

    #[test]
    fn landscape_page_is_limited_by_columns() {
        let (cols, rows) = fit_cells(&image(2000, 500), 80, 40, 0, 0, 41);
        assert_eq!(cols, 80);
        assert_eq!(rows, 10);
    }

    #[test]
    fn empty_image_fills_available_space() {
        assert_eq!(fit_cells(&image(0, 0), 80, 24, 0, 0, 25), (80, 24));
    }

    #[test]
    fn verbosity_raises_console_level() {
        let args = Args::try_parse_from(["snipdoc", "notes.pdf", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(console_level(0), LevelFilter::WARN);
        assert_eq!(console_level(args.verbose), LevelFilter::DEBUG);
        assert_eq!(console_level(9), LevelFilter::TRACE);
    }

    #[test]
    fn args_parse_query_and_flags() {
        let args =
            Args::try_parse_from(["snipdoc", "notes.pdf", "-q", "neural networks", "--json"])
                .unwrap();
        assert_eq!(args.url, "notes.pdf");
        assert_eq!(args.query.as_deref(), Some("neural networks"));
        assert!(args.json);
        assert!(!args.draw);
        assert_eq!(args.page, None);
    }
}
