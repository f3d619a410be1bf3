//! event-mailer - send one monitoring event notification by email.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use event_mailer::cli::{Cli, LogFormat};
use event_mailer::config::{DefaultTemplateFetcher, RawSettings, Settings};
use event_mailer::{EmailNotifier, Event, Notifier};

/// Initialize the tracing subscriber with the specified log format.
///
/// Logs always go to stderr; stdout is reserved for `--validate` output.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    // One event, one SMTP session: no need for worker threads.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Err(e) = runtime.block_on(run(cli)) {
        error!(error = %format!("{:#}", e), "event-mailer failed");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let event = match (&cli.event_file, cli.validate) {
        (Some(path), _) => read_event_file(path).await?,
        // Validation without an event only checks the static configuration.
        (None, true) => Event::default(),
        (None, false) => read_event_stdin().await?,
    };

    let file_layer = match &cli.config {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            RawSettings::load(path)?
        }
        None => RawSettings::default(),
    };
    let raw = file_layer
        .overlay(cli.to_raw_settings())
        .overlay(RawSettings::from_annotations(&event)?);

    let fetcher = DefaultTemplateFetcher::new()?;
    let settings = Settings::validate(raw, &fetcher).await?;

    if cli.validate {
        print_summary(&settings);
        return Ok(());
    }

    let notifier = EmailNotifier::new(settings);
    notifier.send(&event).await?;
    info!(
        to = %notifier.settings().to_email(),
        entity = %event.entity.metadata.name,
        check = %event.check.metadata.name,
        "Email sent"
    );
    Ok(())
}

async fn read_event_file(path: &Path) -> Result<Event> {
    let input = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read event file {}", path.display()))?;
    Event::from_json(&input).with_context(|| format!("failed to parse event {}", path.display()))
}

async fn read_event_stdin() -> Result<Event> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read event from stdin")?;
    Event::from_json(&input).context("failed to parse event from stdin")
}

fn print_summary(settings: &Settings) {
    println!("Configuration is valid");
    println!("  SMTP server: {}", settings.smtp_address());
    println!("  Auth method: {}", settings.auth_method());
    println!(
        "  TLS verification: {}",
        if settings.tls_skip_verify() {
            "disabled"
        } else {
            "enabled"
        }
    );
    println!("  To: {}", settings.to_email());
    println!("  From: {}", settings.from_header());
    println!("  Body template: {}", settings.body_template_source());
}
