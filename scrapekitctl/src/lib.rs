use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use scrapekit_core::{load_scrape_config, ExtractionMetrics, RunReport, ScrapeConfig, Scraper};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod sink;

use sink::SinkKind;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] scrapekit_core::ConfigError),
    #[error("extraction error: {0}")]
    Extract(#[from] scrapekit_core::ExtractError),
    #[error("browser error: {0}")]
    Driver(#[from] scrapekit_core::DriverError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("table does not fit in a worksheet")]
    SheetTooLarge,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Configuration-driven web data extraction", long_about = None)]
pub struct Cli {
    /// Output format for command summaries
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    /// Log at debug level
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs an extraction and saves the result
    Run(RunArgs),
    /// Loads and checks a run file without launching a browser
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run file (.yaml, .yml or .toml)
    #[arg(long)]
    pub config: PathBuf,
    /// Directory receiving the data file and screenshot
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,
    /// Data file name; defaults to extracted_data.<ext>
    #[arg(long)]
    pub output: Option<String>,
    /// Show the browser window
    #[arg(long, default_value_t = false)]
    pub headed: bool,
    /// Delay before every browser interaction, in milliseconds
    #[arg(long)]
    pub slow_mo: Option<u64>,
    /// Capture the final page to this file (relative to the output dir)
    #[arg(long)]
    pub screenshot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Run file (.yaml, .yml or .toml)
    #[arg(long)]
    pub config: PathBuf,
}

/// Installs the fmt subscriber. `RUST_LOG` wins unless `verbose` is set.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => {
            let summary = run_extraction(args).await?;
            render(&summary, cli.format)?;
        }
        Commands::Validate(args) => {
            let report = validate(&args.config)?;
            render(&report, cli.format)?;
        }
    }
    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

/// A run file together with everything checked before launch.
struct RunPlan {
    scrape: ScrapeConfig,
    scraper: Scraper,
    strategy: String,
    sink: SinkKind,
}

impl RunPlan {
    fn new(mut scrape: ScrapeConfig) -> Result<Self> {
        let scraper = Scraper::new(scrape.browser.clone());
        let (extraction, strategy) = scraper.prepare(scrape.extraction)?;
        let sink = SinkKind::for_format(&extraction.output_format)?;
        let strategy = strategy.name().to_string();
        scrape.extraction = extraction;
        Ok(Self {
            scrape,
            scraper,
            strategy,
            sink,
        })
    }
}

async fn run_extraction(args: &RunArgs) -> Result<RunSummary> {
    let mut scrape = load_scrape_config(&args.config)?;
    if args.headed {
        scrape.browser.headless = false;
    }
    if let Some(slow_mo) = args.slow_mo {
        scrape.browser.slow_mo_millis = slow_mo;
    }
    let RunPlan {
        scrape,
        scraper,
        sink,
        ..
    } = RunPlan::new(scrape)?;

    std::fs::create_dir_all(&args.output_dir)?;
    let screenshot = args
        .screenshot
        .as_ref()
        .map(|file| args.output_dir.join(file));

    let report = scraper.run(scrape.extraction, screenshot).await?;

    let file_name = args
        .output
        .clone()
        .unwrap_or_else(|| sink.default_file_name());
    let output = sink::write_output(&args.output_dir, &file_name, sink, &report.output)?;
    Ok(RunSummary::new(report, output))
}

fn validate(path: &Path) -> Result<ValidationReport> {
    let plan = RunPlan::new(load_scrape_config(path)?)?;
    let extraction = &plan.scrape.extraction;
    let fields = extraction
        .item_selectors
        .as_ref()
        .filter(|fields| !fields.is_empty())
        .unwrap_or(&extraction.selectors)
        .len();
    Ok(ValidationReport {
        config: path.to_path_buf(),
        url: extraction.url.clone(),
        strategy: plan.strategy,
        output_format: extraction.output_format.clone(),
        sink: plan.sink.extension().to_string(),
        fields,
        headless: plan.scrape.browser.headless,
        custom_functions: plan.scraper.registry().names().map(str::to_string).collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub url: String,
    pub strategy: String,
    pub records: usize,
    pub output: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub metrics: ExtractionMetrics,
}

impl RunSummary {
    fn new(report: RunReport, output: PathBuf) -> Self {
        Self {
            url: report.url,
            strategy: report.strategy,
            records: report.records,
            output,
            screenshot: report.screenshot,
            started_at: report.started_at,
            finished_at: report.finished_at,
            metrics: report.metrics,
        }
    }
}

impl DisplayFallback for RunSummary {
    fn display(&self) -> String {
        let elapsed = self.finished_at - self.started_at;
        let mut lines = vec![
            format!("{} ({})", self.url, self.strategy),
            format!(
                "  records: {} in {:.1}s",
                self.records,
                elapsed.num_milliseconds() as f64 / 1000.0
            ),
            format!("  saved: {}", self.output.display()),
        ];
        if let Some(path) = &self.screenshot {
            lines.push(format!("  screenshot: {}", path.display()));
        }
        lines.push(format!(
            "  pages: {} | scrolls: {} | items: {}",
            self.metrics.pages_visited, self.metrics.scrolls_performed, self.metrics.items_extracted
        ));
        if self.metrics.field_failures > 0 {
            lines.push(format!(
                "  field failures: {} ({:.0}% ok)",
                self.metrics.field_failures,
                self.metrics.field_success_rate()
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub config: PathBuf,
    pub url: String,
    pub strategy: String,
    pub output_format: String,
    pub sink: String,
    pub fields: usize,
    pub headless: bool,
    pub custom_functions: Vec<String>,
}

impl DisplayFallback for ValidationReport {
    fn display(&self) -> String {
        [
            format!("{}: ok", self.config.display()),
            format!("  url: {}", self.url),
            format!("  strategy: {}", self.strategy),
            format!("  fields: {}", self.fields),
            format!("  output: {} -> .{}", self.output_format, self.sink),
            format!("  headless: {}", self.headless),
        ]
        .join("\n")
    }
}
