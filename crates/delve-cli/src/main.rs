//! delve - terminal client for a research chat server

mod commands;
mod config;
mod export;
mod line;
mod ui;

use chrono::Utc;
use clap::Parser;
use delve_api::{ChatBackend, ChatClient};
use delve_app::{Controller, ControllerConfig};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use config::{Config, Overrides, Settings};

/// delve - research assistant in the terminal
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat server URL (default: http://127.0.0.1:5000)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Ask a single question and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Wait for complete replies instead of streaming
    #[arg(long)]
    no_stream: bool,

    /// Disable TUI mode (use simple stdin/stdout)
    #[arg(long)]
    no_tui: bool,

    /// List past sessions and exit
    #[arg(long)]
    sessions: bool,

    /// Search past research and exit
    #[arg(long, value_name = "QUERY")]
    search: Option<String>,

    /// Show usage statistics and exit
    #[arg(long)]
    stats: bool,

    /// Check that the server is up and exit
    #[arg(long)]
    health: bool,

    /// Export a session as HTML
    #[arg(long, value_name = "SESSION_ID")]
    export: Option<String>,

    /// Where to write the export (default: stdout)
    #[arg(short, long, value_name = "FILE", requires = "export")]
    output: Option<PathBuf>,

    /// Verbose output (logs to a file in TUI mode)
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            no_stream: self.no_stream,
            no_tui: self.no_tui,
        }
    }

    /// Whether the run ends in the full-screen UI
    fn runs_tui(&self, settings: &Settings) -> bool {
        settings.tui
            && self.command.is_none()
            && !self.sessions
            && self.search.is_none()
            && !self.stats
            && !self.health
            && self.export.is_none()
    }
}

/// Install the tracing subscriber. In TUI mode logs go to a file so they
/// don't draw over the screen.
fn init_tracing(log_to_file: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("delve=debug,delve_api=debug,delve_app=debug"));

    if log_to_file {
        let dir = Config::data_dir();
        fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("delve.log"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Merge config with CLI args and environment (CLI takes precedence)
    let cfg = Config::load();
    let settings = cfg.resolve(&args.overrides(), std::env::var(config::BASE_URL_ENV).ok());
    let use_tui = args.runs_tui(&settings);

    if args.verbose {
        init_tracing(use_tui)?;
    }
    tracing::debug!("Using server {}", settings.base_url);

    let client = match settings.connect_timeout {
        Some(timeout) => ChatClient::with_connect_timeout(settings.base_url.clone(), timeout)?,
        None => ChatClient::new(settings.base_url.clone())?,
    };

    if args.health {
        return check_health(&client).await;
    }
    if args.sessions {
        return list_sessions(&client).await;
    }
    if let Some(query) = &args.search {
        return search(&client, query, settings.search_limit).await;
    }
    if args.stats {
        return show_stats(&client).await;
    }
    if let Some(session_id) = &args.export {
        return export_session(&client, session_id, args.output.as_deref()).await;
    }

    let backend: Arc<dyn ChatBackend> = Arc::new(client);
    let mut controller = Controller::new(
        backend,
        ControllerConfig {
            stream: settings.stream,
            search_limit: settings.search_limit,
        },
    );

    // Non-interactive mode
    if let Some(command) = &args.command {
        if !line::run_command(&mut controller, command).await? {
            std::process::exit(1);
        }
        return Ok(());
    }

    if use_tui {
        return ui::run_tui(&mut controller, &settings).await;
    }

    // Interactive mode (simple stdin/stdout)
    line::run_interactive(&mut controller, &settings.base_url).await
}

async fn check_health(client: &ChatClient) -> anyhow::Result<()> {
    match client.health().await {
        Ok(status) => {
            println!("{} is up", client.base_url());
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} is not reachable: {}", client.base_url(), e);
            std::process::exit(1);
        }
    }
}

async fn list_sessions(client: &ChatClient) -> anyhow::Result<()> {
    let sessions = client.history().await?;
    println!(
        "{}",
        commands::format_session_list(&sessions, None, Utc::now())
    );
    Ok(())
}

async fn search(client: &ChatClient, query: &str, limit: usize) -> anyhow::Result<()> {
    let results = client.search(query, limit).await?;
    println!(
        "{}",
        commands::format_search_results(query, &results, Utc::now())
    );
    Ok(())
}

async fn show_stats(client: &ChatClient) -> anyhow::Result<()> {
    let stats = client.stats().await?;
    println!("{}", commands::format_stats(&stats));
    Ok(())
}

async fn export_session(
    client: &ChatClient,
    session_id: &str,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let entries = client.session_history(session_id).await?;
    let html = export::render_transcript_html(session_id, &entries);
    match output {
        Some(path) => {
            fs::write(path, html)?;
            eprintln!(
                "Exported {} exchanges to {}",
                entries.len(),
                path.display()
            );
        }
        None => print!("{}", html),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "delve",
            "--base-url",
            "http://example:8000",
            "--no-stream",
            "-c",
            "hello",
        ])
        .unwrap();
        assert_eq!(args.base_url.as_deref(), Some("http://example:8000"));
        assert_eq!(args.command.as_deref(), Some("hello"));
        let overrides = args.overrides();
        assert!(overrides.no_stream);
        assert!(!overrides.no_tui);
    }

    #[test]
    fn test_output_requires_export() {
        assert!(Args::try_parse_from(["delve", "-o", "out.html"]).is_err());
        let args =
            Args::try_parse_from(["delve", "--export", "abc", "-o", "out.html"]).unwrap();
        assert_eq!(args.export.as_deref(), Some("abc"));
    }

    #[test]
    fn test_one_shot_modes_skip_tui() {
        let settings = Config::default().resolve(&Overrides::default(), None);
        let args = Args::try_parse_from(["delve"]).unwrap();
        assert!(args.runs_tui(&settings));
        let args = Args::try_parse_from(["delve", "--stats"]).unwrap();
        assert!(!args.runs_tui(&settings));
        let args = Args::try_parse_from(["delve", "--no-tui"]).unwrap();
        let settings = Config::default().resolve(&args.overrides(), None);
        assert!(!args.runs_tui(&settings));
    }
}
