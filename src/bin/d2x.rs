//! CLI binary for d2x.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig`, drives conversions and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use d2x::config::DEFAULT_API_URL;
use d2x::{
    formats, ApiClient, ClientConfig, ConversionProgressCallback,
    ConversionRecord, ConversionStats, ConversionStatus, Converter, D2xError, DocumentType, FileStore,
    FormatCategory, MemoryStore, ProgressCallback, SessionStore, SharedStore,
};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
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

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One progress bar per file, stacked in a shared [`MultiProgress`].
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(multi: &MultiProgress, file_name: &str) -> Arc<Self> {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold:24}  [{bar:32.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        let bar = multi.add(ProgressBar::new(100));
        bar.set_style(style);
        bar.set_prefix(truncate(file_name, 24));
        bar.set_message("Waiting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_progress(&self, status: ConversionStatus, percentage: f64) {
        self.bar.set_position(percentage.round() as u64);
        self.bar.set_message(status.describe(percentage));
    }

    fn on_job_created(&self, job_id: &str) {
        self.bar.println(format!("  {} job {}", dim("•"), dim(job_id)));
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Create an account (stats are only kept while signed in)
  d2x register --email jane@example.com --password s3cret --name Jane

  # Convert a receipt, print the spreadsheet URL
  d2x convert receipt.pdf

  # Several HR documents at once, saving the spreadsheets locally
  d2x convert --type hr payslip-*.pdf --download-dir out/

  # Machine-readable results
  d2x convert --json scan.png > result.json

  # Dashboard
  d2x stats

  # Which formats are known, and which can be uploaded directly
  d2x formats --category image

ENVIRONMENT VARIABLES:
  D2X_API_URL             Base URL of the conversion API
  D2X_STATE_DIR           Where the session and stats are stored
  D2X_POLL_INTERVAL_MS    Delay between job status checks
  D2X_MAX_POLLS           Status checks before giving up
  RUST_LOG                Override log filtering (e.g. d2x=debug)

Without a session every request falls back to the guest endpoints, and
statistics start from zero on each run.
"#;

/// Convert documents to Excel spreadsheets through the d2x service.
#[derive(Parser, Debug)]
#[command(
    name = "d2x",
    version,
    about = "Convert PDFs, images and office documents to Excel spreadsheets",
    long_about = "Upload documents (PDF, JPG, PNG, WebP, BMP, TIFF, DOC, DOCX) to the d2x \
processing service, wait for AI extraction to finish and fetch the resulting spreadsheet. \
Works signed in or as a guest.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the conversion API.
    #[arg(long, global = true, env = "D2X_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Directory holding the session and statistics.
    #[arg(long, global = true, env = "D2X_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Keep session and statistics in memory only; nothing is written to disk.
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Milliseconds between job status checks.
    #[arg(long, global = true, env = "D2X_POLL_INTERVAL_MS", default_value_t = 3000)]
    poll_interval_ms: u64,

    /// Status checks before a job is reported as timed out.
    #[arg(long, global = true, env = "D2X_MAX_POLLS", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_polls: u32,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, global = true, env = "D2X_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "D2X_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "D2X_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "D2X_PASSWORD", hide_env_values = true)]
        password: String,
        /// Display name; defaults to the part of the email before '@'.
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign in with an existing account.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "D2X_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show who is signed in.
    Whoami,
    /// Convert one or more documents.
    Convert(ConvertArgs),
    /// Show conversion statistics.
    Stats {
        /// Clear the statistics (signed-in users only).
        #[arg(long)]
        reset: bool,
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
    /// List known source formats.
    Formats {
        /// Only this category (document, image, spreadsheet, …).
        #[arg(long)]
        category: Option<FormatCategory>,
        /// Filter by name or description.
        #[arg(long)]
        search: Option<String>,
        /// Output JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Files to convert.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Extraction type. Detected from the file extension when omitted.
    #[arg(long = "type", value_enum)]
    document_type: Option<DocumentTypeArg>,

    /// Save the resulting spreadsheets into this directory.
    #[arg(long, env = "D2X_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Conversions running at the same time.
    #[arg(short, long, env = "D2X_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=32))]
    concurrency: u16,

    /// Output one JSON document with all results.
    #[arg(long)]
    json: bool,

    /// Disable progress bars.
    #[arg(long, env = "D2X_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DocumentTypeArg {
    Expense,
    Hr,
}

impl From<DocumentTypeArg> for DocumentType {
    fn from(v: DocumentTypeArg) -> Self {
        match v {
            DocumentTypeArg::Expense => DocumentType::Expense,
            DocumentTypeArg::Hr => DocumentType::Hr,
        }
    }
}

/// Per-file result for `convert --json`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertOutcome {
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<ConversionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    saved_to: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ConvertOutcome {
    /// A finished conversion, plus the result of saving it when one was
    /// requested. A failed save makes the whole file count as failed.
    fn converted(
        file: PathBuf,
        record: ConversionRecord,
        saved: Option<std::result::Result<PathBuf, D2xError>>,
    ) -> Self {
        let (saved_to, error) = match saved {
            Some(Ok(p)) => (Some(p), None),
            Some(Err(e)) => (None, Some(format!("download failed: {e}"))),
            None => (None, None),
        };
        Self {
            file,
            record: Some(record),
            saved_to,
            error,
        }
    }

    /// Saved path when there is one, otherwise the remote URL.
    fn shown(&self) -> String {
        match (&self.saved_to, &self.record) {
            (Some(p), _) => p.display().to_string(),
            (None, Some(r)) => r.download_url.clone().unwrap_or_default(),
            (None, None) => String::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when progress bars are active;
    // the bars provide all the feedback that matters to the user.
    let show_progress = match &cli.command {
        Command::Convert(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build client ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let store = open_store(&cli, &config)?;
    let client = ApiClient::new(config, SessionStore::new(store))
        .context("Failed to create API client")?;

    match &cli.command {
        Command::Register {
            email,
            password,
            name,
        } => {
            client
                .register(email, password, name.as_deref())
                .await
                .context("Registration failed")?;
            let who = client
                .session()
                .user()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| email.clone());
            if !cli.quiet {
                eprintln!("{} Registered and signed in as {}", green("✔"), bold(&who));
            }
        }
        Command::Login { email, password } => {
            client
                .login(email, password)
                .await
                .context("Login failed")?;
            if !cli.quiet {
                eprintln!("{} Signed in as {}", green("✔"), bold(email));
            }
        }
        Command::Logout => {
            let was_signed_in = client.is_authenticated();
            client.logout().context("Failed to clear session")?;
            if !cli.quiet {
                if was_signed_in {
                    eprintln!("{} Signed out", green("✔"));
                } else {
                    eprintln!("{}", dim("Not signed in"));
                }
            }
        }
        Command::Whoami => match client.session().user() {
            Some(user) if client.is_authenticated() => {
                println!("{} <{}>", user.display_name(), user.email);
            }
            _ if client.is_authenticated() => println!("signed in (no profile stored)"),
            _ => println!("guest"),
        },
        Command::Convert(args) => {
            run_convert(&client, args, cli.quiet, show_progress).await?;
        }
        Command::Stats { reset, json } => {
            let converter = Converter::new(client);
            let stats = if *reset {
                converter.reset_stats().context("Failed to reset statistics")?
            } else {
                converter.stats()
            };
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
                );
            } else {
                print_dashboard(&converter, &stats);
            }
        }
        Command::Formats {
            category,
            search,
            json,
        } => {
            print_formats(client.config(), *category, search.as_deref(), *json)?;
        }
    }

    Ok(())
}

/// Map global CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .api_url(&cli.api_url)
        .poll_interval_ms(cli.poll_interval_ms)
        .max_polls(cli.max_polls)
        .request_timeout_secs(cli.timeout);
    if let Command::Convert(ref args) = cli.command {
        builder = builder.concurrency(args.concurrency as usize);
    }
    if let Some(ref dir) = cli.state_dir {
        builder = builder.state_dir(dir);
    }
    builder.build().context("Invalid configuration")
}

fn open_store(cli: &Cli, config: &ClientConfig) -> Result<SharedStore> {
    if cli.ephemeral {
        return Ok(MemoryStore::shared());
    }
    let dir = config.resolved_state_dir();
    FileStore::shared(&dir).with_context(|| format!("Failed to open state in {}", dir.display()))
}

// ── convert ──────────────────────────────────────────────────────────────

async fn run_convert(
    client: &ApiClient,
    args: &ConvertArgs,
    quiet: bool,
    show_progress: bool,
) -> Result<()> {
    let start = Instant::now();
    let converter = Converter::new(client.clone());
    let multi = MultiProgress::new();
    if !show_progress {
        multi.set_draw_target(ProgressDrawTarget::hidden());
    }

    if !quiet && !args.json {
        multi
            .println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!(
                    "Converting {} file(s){}",
                    args.files.len(),
                    if client.is_authenticated() { "" } else { " as guest" }
                ))
            ))
            .ok();
    }

    let concurrency = client.config().concurrency;
    let outcomes: Vec<ConvertOutcome> = stream::iter(args.files.iter().cloned().map(|path| {
        let converter = converter.clone();
        let multi = multi.clone();
        async move {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let document_type = args
                .document_type
                .map(DocumentType::from)
                .unwrap_or_else(|| formats::detect_document_type(&name));

            let cb = CliProgressCallback::new(&multi, &name);
            let progress: ProgressCallback = cb.clone();
            let result = converter
                .convert_path(&path, document_type, Some(progress))
                .await;
            cb.bar.finish_and_clear();
            multi.remove(&cb.bar);

            match result {
                Ok(record) => {
                    let saved = match args.download_dir {
                        Some(ref dir) => Some(converter.download(&record, dir).await),
                        None => None,
                    };
                    let outcome = ConvertOutcome::converted(path, record, saved);
                    match outcome.error {
                        Some(ref e) => {
                            report(&multi, quiet || args.json, &red("✗"), &name, &red(e))
                        }
                        None => report(
                            &multi,
                            quiet || args.json,
                            &green("✓"),
                            &name,
                            &outcome.shown(),
                        ),
                    }
                    outcome
                }
                Err(e) => {
                    report(&multi, quiet || args.json, &red("✗"), &name, &red(&e.to_string()));
                    ConvertOutcome {
                        file: path,
                        record: None,
                        saved_to: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        }
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    let total = outcomes.len();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcomes).context("Failed to serialise results")?
        );
    } else if quiet {
        // Results only, one URL per line.
        for o in &outcomes {
            if let Some(url) = o.record.as_ref().and_then(|r| r.download_url.as_deref()) {
                println!("{url}");
            }
        }
    } else {
        eprintln!(
            "{}  {}/{} converted  {:.1}s",
            if failed == 0 { green("✔") } else if failed == total { red("✘") } else { cyan("⚠") },
            bold(&(total - failed).to_string()),
            total,
            start.elapsed().as_secs_f64(),
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} conversions failed");
    }
    Ok(())
}

fn report(multi: &MultiProgress, silent: bool, mark: &str, name: &str, detail: &str) {
    if silent {
        return;
    }
    let line = format!("  {mark} {name}  {detail}");
    if multi.println(&line).is_err() {
        eprintln!("{line}");
    }
}

// ── stats ────────────────────────────────────────────────────────────────

fn print_dashboard(converter: &Converter, stats: &ConversionStats) {
    let who = match converter.client().session().user() {
        Some(user) if converter.client().is_authenticated() => user.display_name().to_string(),
        _ => "guest".to_string(),
    };
    println!("{}", bold(&format!("Statistics for {who}")));
    println!("  Total conversions:  {}", stats.total_conversions);
    println!("  Files processed:    {}", stats.files_processed);
    println!("  Successful:         {}", green(&stats.successful_conversions.to_string()));
    println!("  Failed:             {}", red(&stats.failed_conversions.to_string()));
    println!("  Success rate:       {}%", stats.success_rate);
    if !converter.client().is_authenticated() {
        println!("{}", dim("Sign in to keep statistics between runs."));
    }
}

// ── formats ──────────────────────────────────────────────────────────────

fn print_formats(
    config: &ClientConfig,
    category: Option<FormatCategory>,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut list = match search {
        Some(term) => formats::search(term),
        None => formats::all().iter().collect(),
    };
    if let Some(c) = category {
        list.retain(|f| f.category == c);
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&list).context("Failed to serialise formats")?
        );
        return Ok(());
    }

    if list.is_empty() {
        println!("{}", dim("No matching formats"));
        return Ok(());
    }

    for cat in FormatCategory::ALL {
        let in_cat: Vec<_> = list.iter().filter(|f| f.category == cat).collect();
        if in_cat.is_empty() {
            continue;
        }
        println!("{}", bold(cat.as_str()));
        for f in in_cat {
            let upload = if config.is_allowed_content_type(&f.content_type()) {
                green("upload")
            } else {
                dim("catalog only")
            };
            println!(
                "  {:<8} .{:<8} {:<32} {}",
                f.name,
                f.extension,
                f.description,
                upload
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use d2x::ConversionHistory;

    fn finished(name: &str) -> ConversionRecord {
        let history = ConversionHistory::new();
        let id = history.start(name);
        history.complete(&id, "http://files/a.xlsx").unwrap()
    }

    #[test]
    fn failed_save_counts_as_failure() {
        let err = D2xError::Storage {
            path: PathBuf::from("/readonly/a.xlsx"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let o = ConvertOutcome::converted(PathBuf::from("a.pdf"), finished("a.pdf"), Some(Err(err)));

        assert!(o.error.as_deref().unwrap().starts_with("download failed"));
        assert!(o.saved_to.is_none());
        let json = serde_json::to_value(&o).unwrap();
        assert!(json.get("error").is_some());
    }

    #[test]
    fn saved_path_is_shown_over_url() {
        let o = ConvertOutcome::converted(
            PathBuf::from("a.pdf"),
            finished("a.pdf"),
            Some(Ok(PathBuf::from("out/a.xlsx"))),
        );
        assert!(o.error.is_none());
        assert_eq!(o.shown(), PathBuf::from("out/a.xlsx").display().to_string());

        let o = ConvertOutcome::converted(PathBuf::from("a.pdf"), finished("a.pdf"), None);
        assert!(o.error.is_none());
        assert_eq!(o.shown(), "http://files/a.xlsx");
    }
}
