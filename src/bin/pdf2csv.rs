//! CLI binary for pdf2csv.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and writes the resulting CSV.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2csv::{
    extract, inspect, ExtractionConfig, ExtractionProgressCallback, FieldSpec, PageSelection,
    ProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page log
/// lines using [indicatif]. Pages are processed sequentially, so events
/// arrive in document order.
struct CliProgressCallback {
    /// The single progress bar anchored at the bottom of the terminal.
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    /// Count of pages that errored out.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically
    /// by `on_extraction_start` (called before any model call).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_extraction_start

        // Initial style: spinner only (no counter until we know the total).
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_calls: usize) {
        self.activate_bar(total_calls);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Submitting {total_calls} {} to the model…",
                if total_calls == 1 { "call" } else { "pages" }
            ))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, records: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        let detail = if records == 0 {
            dim("no usable data")
        } else {
            dim(&format!("{records:>3} records"))
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            green("✓"),
            page_num,
            total,
            detail,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.len() > 80 {
            let truncated: String = error.chars().take(79).collect();
            format!("{truncated}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_calls: usize, contributed: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} of {} pages contributed records",
                green("✔"),
                bold(&contributed.to_string()),
                total_calls,
            );
        } else {
            eprintln!(
                "{} {}/{} pages contributed records  ({} failed)",
                if failed == total_calls {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&contributed.to_string()),
                total_calls,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract three columns from an invoice
  pdf2csv invoice.pdf --fields "name,unit price,quantity"

  # Newline-separated field list from a file
  pdf2csv order_form.pdf --fields-file columns.txt -o orders.csv

  # One model call per page (long documents, failure isolation)
  pdf2csv --split-pages --fields "item,price" catalogue.pdf

  # Restrict to specific pages
  pdf2csv --split-pages --pages 2-10 --fields "item,price" catalogue.pdf

  # Extract from a URL, print CSV to stdout
  pdf2csv https://example.com/report.pdf --fields "date,total" --stdout

  # Inspect PDF metadata (no API key needed)
  pdf2csv --inspect-only document.pdf

  # Structured JSON output with per-page stats
  pdf2csv --json --split-pages --fields "a,b" doc.pdf > result.json

FIELD LISTS:
  Fields may be separated by commas, newlines, or both. Order defines the
  CSV column order. A value the model cannot find becomes an empty string.

OUTPUT:
  CSV is written UTF-8 with a leading byte-order mark so Excel detects the
  encoding. Default file name: extracted_data.csv.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY        Google Gemini API key
  GOOGLE_API_KEY        Fallback API key variable
  PDF2CSV_MODEL         Override model ID

SETUP:
  1. Set API key:   export GEMINI_API_KEY=...
  2. Extract:       pdf2csv document.pdf --fields "name,price"
"#;

/// Extract structured fields from PDF files and URLs into CSV.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2csv",
    version,
    about = "Extract structured fields from PDF files and URLs into CSV using generative AI",
    long_about = "Extract structured fields from PDF documents (local files or URLs) into CSV. \
You name the columns; the document is sent to a multimodal model (Google Gemini) and the \
reply is salvage-parsed into records, normalised onto your field list, and exported as a \
UTF-8-BOM CSV that opens cleanly in spreadsheet tools.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Fields to extract, comma- and/or newline-separated. Order = column order.
    #[arg(short, long, env = "PDF2CSV_FIELDS")]
    fields: Option<String>,

    /// Read the field list from a file instead.
    #[arg(long, conflicts_with = "fields")]
    fields_file: Option<PathBuf>,

    /// Write CSV to this file.
    #[arg(short, long, env = "PDF2CSV_OUTPUT", default_value = "extracted_data.csv")]
    output: PathBuf,

    /// Print CSV to stdout instead of writing a file.
    #[arg(long)]
    stdout: bool,

    /// Model ID (e.g. gemini-2.0-flash, gemini-2.5-pro).
    #[arg(long, env = "PDF2CSV_MODEL", default_value = "gemini-2.0-flash")]
    model: String,

    /// One model call per page instead of one for the whole document.
    #[arg(long, env = "PDF2CSV_SPLIT_PAGES")]
    split_pages: bool,

    /// Page selection in per-page mode: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "PDF2CSV_PAGES", default_value = "all")]
    pages: String,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "PDF2CSV_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max model output tokens per call.
    #[arg(long, env = "PDF2CSV_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "PDF2CSV_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per call on transient model failure.
    #[arg(long, env = "PDF2CSV_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Output structured JSON (ExtractionOutput) instead of CSV.
    #[arg(long, env = "PDF2CSV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2CSV_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2CSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "PDF2CSV_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            if let Some(ref s) = meta.subject {
                println!("Subject:      {}", s);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            println!("Encrypted:    {}", meta.is_encrypted);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if let Some(ref c) = meta.creator {
                println!("Creator:      {}", c);
            }
        }
        return Ok(());
    }

    // ── Field spec ───────────────────────────────────────────────────────
    let field_text = match (&cli.fields, &cli.fields_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read field list from {path:?}"))?,
        (None, None) => {
            anyhow::bail!("No fields given. Use --fields \"name,price\" or --fields-file.")
        }
    };
    let fields = FieldSpec::parse(&field_text).context("Invalid field list")?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&cli.input, &fields, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    if cli.stdout {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.csv.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure a trailing newline on stdout.
        if !output.csv.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    } else {
        // Atomic write: temp file + rename, so a failed run never leaves a
        // half-written CSV behind.
        let tmp_path = cli.output.with_extension("csv.tmp");
        tokio::fs::write(&tmp_path, &output.csv)
            .await
            .with_context(|| format!("Failed to write {}", cli.output.display()))?;
        tokio::fs::rename(&tmp_path, &cli.output)
            .await
            .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet {
        let destination = if cli.stdout {
            "stdout".to_string()
        } else {
            cli.output.display().to_string()
        };
        eprintln!(
            "{}  {} records  {} columns  {}ms  →  {}",
            if output.stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&output.stats.total_records.to_string()),
            fields.len(),
            output.stats.total_duration_ms,
            bold(&destination),
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let prompt_override = if let Some(ref path) = cli.prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {path:?}"))?,
        )
    } else {
        None
    };

    let pages = parse_pages(&cli.pages)?;

    let mut builder = ExtractionConfig::builder()
        .model(&cli.model)
        .split_pages(cli.split_pages)
        .pages(pages)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(prompt) = prompt_override {
        builder = builder.prompt_override(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--pages` string into `PageSelection`.
fn parse_pages(s: &str) -> Result<PageSelection> {
    let s = s.trim().to_lowercase();

    if s == "all" {
        return Ok(PageSelection::All);
    }

    // Range: "3-15"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start.trim().parse().context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }

        return Ok(PageSelection::Range(start, end));
    }

    // Set: "1,3,5,7"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &pages {
            if p < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
            }
        }

        return Ok(PageSelection::Set(pages));
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }

    Ok(PageSelection::Single(page))
}
