//! CLI binary for addrlens.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` / `ServerConfig` and prints results.

use addrlens::pipeline::encode;
use addrlens::pipeline::geocode::geocode_address;
use addrlens::{
    AddressRecord, CensusGeocoder, Orchestrator, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, ResponseEnvelope, ServerConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while the vision model reads the image, then a bar over the
/// geocoding lookups. Lookups may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Reading");
        bar.set_message("Sending image to vision model…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            degraded: AtomicUsize::new(0),
        })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, address_count: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} addresses  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(address_count as u64);
        self.bar.set_prefix("Geocoding");
        self.bar.println(format!(
            "{} {}",
            green("◆"),
            bold(&format!("Found {address_count} addresses"))
        ));
    }

    fn on_address_resolved(&self, index: usize, total: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3} matched",
            green("✓"),
            index + 1,
            total
        ));
        self.bar.inc(1);
    }

    fn on_address_degraded(&self, index: usize, total: usize, error: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3} {}",
            yellow("⚠"),
            index + 1,
            total,
            dim(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_pipeline_complete(&self, total: usize, resolved: usize) {
        self.bar.finish_and_clear();
        let degraded = self.degraded.load(Ordering::SeqCst);
        if degraded == 0 {
            eprintln!("{} {} addresses geocoded", green("✔"), bold(&resolved.to_string()));
        } else {
            eprintln!(
                "{} {}/{} addresses geocoded  ({} unmatched)",
                yellow("⚠"),
                bold(&resolved.to_string()),
                total,
                degraded
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP API on port 8080
  addrlens serve

  # Restrict browsers to one front-end origin
  addrlens serve --cors-origins https://dispatch.example.com

  # Extract and geocode addresses from a photo
  addrlens extract label.jpg

  # Same, as the JSON envelope the API returns
  addrlens extract --json label.jpg > addresses.json

  # Geocode one address
  addrlens geocode "1600 Pennsylvania Ave NW, Washington, DC 20500"

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PORT                    Listen port for `serve`
  CORS_ORIGINS            Comma-separated allowed origins (`*` or unset: any)
  RUST_LOG                Log filter, overrides --verbose / --quiet

A `.env` file in the working directory is loaded before flags are parsed.
"#;

/// Extract postal addresses from images and geocode them.
#[derive(Parser, Debug)]
#[command(
    name = "addrlens",
    version,
    about = "Extract postal addresses from images and geocode them",
    long_about = "Read delivery addresses off a photo with a Vision Language Model, then \
standardize and geocode each one with the US Census geocoder. Runs as an HTTP API or as a \
one-shot command.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vision model ID (e.g. gpt-4o, gpt-4o-mini).
    #[arg(long, global = true, env = "ADDRLENS_MODEL", default_value = addrlens::config::DEFAULT_MODEL)]
    model: String,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "ADDRLENS_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, global = true, env = "ADDRLENS_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Max tokens the vision model may generate.
    #[arg(long, global = true, env = "ADDRLENS_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: usize,

    /// Vision call timeout in seconds.
    #[arg(long, global = true, env = "ADDRLENS_VISION_TIMEOUT", default_value_t = 60)]
    vision_timeout: u64,

    /// Base URL of the Census geocoder.
    #[arg(long, global = true, env = "ADDRLENS_GEOCODER_URL",
          default_value = addrlens::config::DEFAULT_GEOCODER_URL)]
    geocoder_url: String,

    /// Census benchmark dataset.
    #[arg(long, global = true, env = "ADDRLENS_BENCHMARK",
          default_value = addrlens::config::DEFAULT_BENCHMARK)]
    benchmark: String,

    /// Per-lookup geocoding timeout in seconds.
    #[arg(long, global = true, env = "ADDRLENS_GEOCODE_TIMEOUT", default_value_t = 10)]
    geocode_timeout: u64,

    /// Concurrent geocoding lookups per image.
    #[arg(short, long, global = true, env = "ADDRLENS_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ADDRLENS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ADDRLENS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API.
    Serve {
        /// Listen address.
        #[arg(long, env = "ADDRLENS_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Listen port.
        #[arg(short, long, env = "PORT", default_value_t = 8080)]
        port: u16,

        /// Comma-separated allowed CORS origins; `*` or empty allows any.
        #[arg(long, env = "CORS_ORIGINS", default_value = "")]
        cors_origins: String,

        /// Largest accepted request body in MiB (1–1024).
        #[arg(long, env = "ADDRLENS_MAX_BODY_MB", default_value_t = 20,
              value_parser = clap::value_parser!(u32).range(1..=1024))]
        max_body_mb: u32,
    },

    /// Extract and geocode every address in a local image.
    Extract {
        /// Image file (JPEG, PNG, …).
        image_file: PathBuf,

        /// Print the JSON envelope instead of a table.
        #[arg(long)]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "ADDRLENS_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Standardize and geocode one address.
    Geocode {
        /// Free-text address.
        address: String,

        /// Print JSON instead of a single line.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during `extract`.
    let show_progress = match &cli.command {
        Command::Extract {
            json, no_progress, ..
        } => !cli.quiet && !*no_progress && !*json,
        _ => false,
    };
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    match cli.command {
        Command::Serve {
            host,
            port,
            cors_origins,
            max_body_mb,
        } => {
            let orchestrator = build_orchestrator(&config)?;
            let server = ServerConfig {
                host,
                port,
                cors_origins: ServerConfig::parse_origins(&cors_origins),
                max_body_bytes: (max_body_mb as usize) * 1024 * 1024,
            };
            addrlens::serve(orchestrator, &server)
                .await
                .with_context(|| format!("Server on {} failed", server.bind_addr()))?;
        }

        Command::Extract {
            image_file, json, ..
        } => {
            let orchestrator = build_orchestrator(&config)?;
            let bytes = tokio::fs::read(&image_file)
                .await
                .with_context(|| format!("Failed to read image {:?}", image_file))?;
            let image = encode::encode_bytes(&bytes);

            let output = orchestrator
                .run(&image)
                .await
                .context("Failed to extract addresses")?;

            if json {
                let envelope = ResponseEnvelope::success(output.addresses);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&envelope).context("Failed to serialise output")?
                );
            } else {
                for record in &output.addresses {
                    print_record(record);
                }
                if !cli.quiet {
                    eprintln!(
                        "   {} tokens in  /  {} tokens out  ·  {}ms total",
                        dim(&output.stats.input_tokens.to_string()),
                        dim(&output.stats.output_tokens.to_string()),
                        output.stats.total_ms,
                    );
                }
            }
        }

        Command::Geocode { address, json } => {
            // Geocoding alone needs no vision credential.
            let geocoder =
                CensusGeocoder::from_config(&config).context("Failed to initialise geocoder")?;
            let record = geocode_address(&geocoder, &address)
                .await
                .context("Failed to geocode address")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&record).context("Failed to serialise output")?
                );
            } else {
                print_record(&record);
            }
        }
    }

    Ok(())
}

fn build_orchestrator(config: &PipelineConfig) -> Result<Orchestrator> {
    Orchestrator::from_config(config).context("Failed to initialise pipeline")
}

fn print_record(record: &AddressRecord) {
    if record.is_degraded() {
        println!("{}  {}", yellow("unmatched"), record.original);
    } else {
        println!(
            "{:>10.6} {:>11.6}  {}",
            record.latitude, record.longitude, record.standardized
        );
    }
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .model(cli.model.clone())
        .max_tokens(cli.max_tokens)
        .vision_timeout_secs(cli.vision_timeout)
        .geocoder_url(cli.geocoder_url.clone())
        .benchmark(cli.benchmark.clone())
        .geocode_timeout_secs(cli.geocode_timeout)
        .resolve_concurrency(cli.concurrency);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name.clone());
    }
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn max_body_defaults_to_twenty_mib() {
        let cli = Cli::try_parse_from(["addrlens", "serve"]).unwrap();
        match cli.command {
            Command::Serve { max_body_mb, .. } => assert_eq!(max_body_mb, 20),
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn oversized_max_body_is_rejected() {
        for value in ["0", "1025", "18446744073709551615"] {
            let parsed = Cli::try_parse_from(["addrlens", "serve", "--max-body-mb", value]);
            assert!(parsed.is_err(), "--max-body-mb {value} should be rejected");
        }
    }

    #[test]
    fn geocode_subcommand_takes_free_text() {
        let cli = Cli::try_parse_from(["addrlens", "geocode", "1 Main St, Springfield, IL"]).unwrap();
        match cli.command {
            Command::Geocode { address, json } => {
                assert_eq!(address, "1 Main St, Springfield, IL");
                assert!(!json);
            }
            other => panic!("expected geocode, got {other:?}"),
        }
    }
}
