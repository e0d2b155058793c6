use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_viewer_core::{DocumentSession, SessionState, ViewerConfig};
use pdf_viewer_render::{PdfEngine, PdfiumEngine};
use pdf_viewer_scheduler::WorkerPool;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "pdf-viewer")]
#[command(about = "PDF viewer rendering pipeline")]
pub struct Cli {
    /// Log pipeline progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render every page into the compressed cache and print load statistics.
    Load {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        options: RenderOptions,
    },
    /// Render one trimmed page to a PNG file.
    Page {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        options: RenderOptions,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Default, clap::Args)]
struct RenderOptions {
    /// Rendering resolution.
    #[arg(long)]
    dpi: Option<u32>,
    /// Number of render worker threads.
    #[arg(long)]
    workers: Option<usize>,
    /// Pages per background chunk.
    #[arg(long)]
    chunk_size: Option<u32>,
}

impl RenderOptions {
    /// Environment settings with command-line overrides on top
    fn config(&self) -> Result<ViewerConfig> {
        let mut config = ViewerConfig::from_env().context("invalid PDF_VIEWER_* environment")?;
        if let Some(dpi) = self.dpi {
            config = config.with_dpi(dpi);
        }
        if let Some(workers) = self.workers {
            config = config.with_worker_threads(workers);
        }
        if let Some(pages) = self.chunk_size {
            config = config.with_chunk_size(pages);
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
}

#[derive(Debug, Serialize, PartialEq)]
struct SizeOutput {
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct LoadOutput {
    path: String,
    state: String,
    page_count: u32,
    ready_pages: usize,
    failed_pages: usize,
    uncompressed_bytes: usize,
    compressed_bytes: usize,
    compression_percent: f64,
    elapsed_ms: u128,
    max_page_size: Option<SizeOutput>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Load { file, options } => run_load(&file, &options),
        Commands::Page { file, page, output, options } => {
            run_page(&file, page, output.as_deref(), &options)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    // Ignored when a logger is already installed
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn pdfium() -> Result<Arc<dyn PdfEngine>> {
    let engine = PdfiumEngine::new().context("failed to load PDFium")?;
    Ok(Arc::new(engine))
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let source = pdfium()?.open(file).context("failed to open PDF")?;
    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: source.page_count(),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_load(file: &Path, options: &RenderOptions) -> Result<()> {
    ensure_pdf_exists(file)?;

    let config = options.config()?;
    let payload = load_document(pdfium()?, file, config)?;
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_page(file: &Path, page: u32, output: Option<&Path>, options: &RenderOptions) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_page_output(file, page));

    let config = options.config()?;
    write_page_png(pdfium()?, file, page - 1, config, &output)?;
    println!("{}", output.display());
    Ok(())
}

/// Open `file` in a session and block until every page is processed
fn open_loaded(
    engine: Arc<dyn PdfEngine>,
    file: &Path,
    config: ViewerConfig,
) -> Result<DocumentSession> {
    let pool =
        WorkerPool::new(config.pool_config()).context("failed to start render workers")?;
    let pool = Arc::new(pool);
    let mut session = DocumentSession::new(engine, pool, config);

    session.open(file).map_err(|error| {
        let kind = error.kind();
        anyhow::Error::new(error).context(format!("{}: {}", kind, file.display()))
    })?;

    let state = session.wait_until_loaded(Duration::MAX);
    if state != SessionState::Loaded {
        log::warn!("Load of {} ended in {:?}", file.display(), state);
    }

    Ok(session)
}

fn load_document(
    engine: Arc<dyn PdfEngine>,
    file: &Path,
    config: ViewerConfig,
) -> Result<LoadOutput> {
    let session = open_loaded(engine, file, config)?;
    let state = session.state();
    let page_count = session.page_count();
    let max_page_size = session
        .max_page_size()
        .map(|(width, height)| SizeOutput { width, height });

    let Some(stats) = session.load_stats() else {
        anyhow::bail!("loading {} did not finish: {:?}", file.display(), state);
    };

    Ok(LoadOutput {
        path: file.display().to_string(),
        state: format!("{state:?}"),
        page_count,
        ready_pages: stats.ready_pages,
        failed_pages: stats.failed_pages,
        uncompressed_bytes: stats.uncompressed_bytes,
        compressed_bytes: stats.compressed_bytes,
        compression_percent: stats.compression_ratio() * 100.0,
        elapsed_ms: stats.elapsed.as_millis(),
        max_page_size,
    })
}

fn write_page_png(
    engine: Arc<dyn PdfEngine>,
    file: &Path,
    page_index: u32,
    config: ViewerConfig,
    output: &Path,
) -> Result<()> {
    let session = open_loaded(engine, file, config)?;

    if page_index >= session.page_count() {
        anyhow::bail!(
            "page {} out of range, document has {} pages",
            page_index + 1,
            session.page_count()
        );
    }

    let mut cache = session.decode_cache().context("no document open")?;
    let decoded = cache
        .get_decoded_page(page_index)
        .with_context(|| format!("failed to decode page {}", page_index + 1))?
        .with_context(|| format!("page {} could not be rendered", page_index + 1))?;

    let image = image::RgbaImage::from_raw(decoded.width, decoded.height, decoded.pixels.to_vec())
        .context("decoded page has an unexpected size")?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_page_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
