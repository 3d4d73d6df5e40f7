//! Quill CLI - publish a post through a real browser session
//!
//! Usage:
//!   quill publish --content "Hello"      Publish text given inline
//!   quill publish --content-file post.md Publish the contents of a file
//!   echo "Hello" | quill publish         Publish text read from stdin
//!   quill init                           Write .quill/config.toml
//!   quill config                         Print the effective configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quill_browser::ChromeLauncher;
use quill_core::config::CredentialEnv;
use quill_core::{Credentials, QuillConfig};
use quill_workflow::{publish, Outcome, PublishReport, TracingSink};
use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Pause between whole-run attempts
const RERUN_DELAY: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "quill")]
#[command(author, version, about = "Publish text posts through browser automation")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and publish one post
    Publish {
        /// Post text
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,

        /// Read the post text from a file
        #[arg(long, value_name = "FILE")]
        content_file: Option<PathBuf>,

        /// Configuration file (defaults to .quill/config.toml)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Show the browser window
        #[arg(long, conflicts_with = "headless")]
        headful: bool,

        /// Run without a browser window
        #[arg(long)]
        headless: bool,

        /// Directory for failure screenshots
        #[arg(long, value_name = "DIR")]
        diagnostics_dir: Option<PathBuf>,

        /// Fresh-session runs to attempt before giving up
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        max_runs: u32,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Directory to initialise (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (defaults to .quill/config.toml)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging unavailable: {}", e);
    }

    let result = match cli.command {
        Commands::Publish {
            content,
            content_file,
            config,
            headful,
            headless,
            diagnostics_dir,
            max_runs,
            json,
        } => {
            let overrides = Overrides {
                headless: if headless {
                    Some(true)
                } else if headful {
                    Some(false)
                } else {
                    None
                },
                diagnostics_dir,
            };
            cmd_publish(content, content_file, config, overrides, max_runs, json).await
        }
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Config { config } => cmd_config(config.as_deref()),
    };

    // Anything that fails before a run starts is a usage or config error
    result.unwrap_or_else(|e| {
        eprintln!("error: {:#}", e);
        ExitCode::from(2)
    })
}

/// Command-line settings that take precedence over the config file
#[derive(Debug, Default)]
struct Overrides {
    headless: Option<bool>,
    diagnostics_dir: Option<PathBuf>,
}

impl Overrides {
    fn apply(self, config: &mut QuillConfig) {
        if let Some(headless) = self.headless {
            config.session.headless = headless;
        }
        if let Some(dir) = self.diagnostics_dir {
            config.diagnostics.dir = dir;
        }
    }
}

async fn cmd_publish(
    content: Option<String>,
    content_file: Option<PathBuf>,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    max_runs: u32,
    json: bool,
) -> Result<ExitCode> {
    let mut config = load_config(config_path.as_deref())?;
    overrides.apply(&mut config);

    let content = match (content, content_file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read content from {}", path.display()))?,
        (None, None) => {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                bail!("No content given: use --content, --content-file or pipe text on stdin");
            }
            let mut text = String::new();
            stdin
                .lock()
                .read_to_string(&mut text)
                .context("Failed to read content from stdin")?;
            text
        }
    };
    let content = validate_content(content)?;
    let credentials = resolve_credentials(&config.credentials, |name| std::env::var(name).ok())?;

    let launcher = ChromeLauncher::new();
    let sink = Arc::new(TracingSink);
    let mut run = 1;
    let report = loop {
        info!("Publication run {}/{}", run, max_runs);
        let report = publish(&launcher, &config, &content, &credentials, sink.clone()).await;
        if !should_rerun(&report.outcome, run, max_runs) {
            break report;
        }
        warn!(
            "Run {} failed at {}; starting a fresh session in {}s",
            run,
            report.outcome.failed_stage().map(|s| s.name()).unwrap_or("?"),
            RERUN_DELAY.as_secs()
        );
        tokio::time::sleep(RERUN_DELAY).await;
        run += 1;
    };

    let status = finish(
        &report,
        json,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    );
    Ok(ExitCode::from(status))
}

fn cmd_init(path: &Path, force: bool) -> Result<ExitCode> {
    let config_path = QuillConfig::default_path(path);
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    let written = QuillConfig::write_default(path)?;
    info!("Wrote default configuration to {}", written.display());
    println!("Created {}", written.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<QuillConfig> {
    let config = match path {
        Some(path) => QuillConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => QuillConfig::load_or_default(Path::new("."))?,
    };
    Ok(config)
}

fn validate_content(content: String) -> Result<String> {
    if content.trim().is_empty() {
        bail!("Content is empty");
    }
    Ok(content)
}

fn resolve_credentials(
    env: &CredentialEnv,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials> {
    let read = |name: &str| {
        lookup(name)
            .filter(|value| !value.is_empty())
            .with_context(|| format!("Missing credential: set {}", name))
    };
    Ok(Credentials::new(read(&env.identity_env)?, read(&env.secret_env)?))
}

/// A failed run is retried in a fresh session only while nothing can have
/// been submitted yet
fn should_rerun(outcome: &Outcome, run: u32, max_runs: u32) -> bool {
    match outcome.failed_stage() {
        Some(stage) => run < max_runs && !stage.may_have_published(),
        None => false,
    }
}

/// Exit status of a completed run
fn exit_status(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Succeeded => 0,
        Outcome::Failed { .. } => 1,
    }
}

/// Report a completed run. The exit status depends on the outcome only.
fn finish(report: &PublishReport, json: bool, out: &mut impl Write, err: &mut impl Write) -> u8 {
    if let Err(e) = print_report(report, json, out, err) {
        warn!("Failed to print the run report: {:#}", e);
    }
    exit_status(&report.outcome)
}

fn print_report(
    report: &PublishReport,
    json: bool,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report.summary())?)?;
    }

    match &report.outcome {
        Outcome::Succeeded => {
            if !json {
                writeln!(out, "Published (run {})", report.run_id)?;
                for note in &report.notes {
                    writeln!(out, "  {}", note)?;
                }
            }
        }
        Outcome::Failed { stage, reason } => {
            writeln!(err, "Publication failed at {}: {}", stage, reason)?;
            if let Some(diagnostics) = &report.diagnostics {
                writeln!(err, "  {}", diagnostics)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::QuillError;
    use quill_workflow::Stage;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Writer whose every write fails, like a closed pipe
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn report(outcome: Outcome) -> PublishReport {
        PublishReport {
            run_id: Uuid::nil(),
            outcome,
            notes: vec!["submit control clicked".to_string()],
            resolutions: Vec::new(),
            events: Vec::new(),
            diagnostics: None,
        }
    }

    fn failed_at(stage: Stage) -> Outcome {
        Outcome::Failed {
            stage,
            reason: QuillError::Other("boom".to_string()),
        }
    }

    #[test]
    fn test_credentials_read_from_configured_variables() {
        let vars: HashMap<&str, &str> = [
            ("LINKEDIN_EMAIL", "me@example.com"),
            ("LINKEDIN_PASSWORD", "hunter2"),
        ]
        .into_iter()
        .collect();

        let credentials = resolve_credentials(&CredentialEnv::default(), |name| {
            vars.get(name).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(credentials.identity, "me@example.com");
        assert_eq!(credentials.secret, "hunter2");
    }

    #[test]
    fn test_missing_or_empty_credential_names_the_variable() {
        let err = resolve_credentials(&CredentialEnv::default(), |name| match name {
            "LINKEDIN_EMAIL" => Some("me@example.com".to_string()),
            _ => Some(String::new()),
        })
        .unwrap_err();

        assert!(err.to_string().contains("LINKEDIN_PASSWORD"));
    }

    #[test]
    fn test_blank_content_rejected() {
        assert!(validate_content("  \n\t".to_string()).is_err());
        assert_eq!(validate_content(" hi ".to_string()).unwrap(), " hi ");
    }

    #[test]
    fn test_rerun_only_before_submission() {
        assert!(should_rerun(&failed_at(Stage::OpenComposer), 1, 3));
        assert!(!should_rerun(&failed_at(Stage::OpenComposer), 3, 3));
        assert!(!should_rerun(&failed_at(Stage::SubmitContent), 1, 3));
        assert!(!should_rerun(&failed_at(Stage::VerifySubmission), 1, 3));
        assert!(!should_rerun(&Outcome::Succeeded, 1, 3));
    }

    #[test]
    fn test_unprintable_report_keeps_run_status() {
        let succeeded = report(Outcome::Succeeded);
        assert_eq!(finish(&succeeded, false, &mut ClosedPipe, &mut ClosedPipe), 0);
        assert_eq!(finish(&succeeded, true, &mut ClosedPipe, &mut ClosedPipe), 0);

        let failed = report(failed_at(Stage::OpenComposer));
        assert_eq!(finish(&failed, false, &mut ClosedPipe, &mut ClosedPipe), 1);
    }

    #[test]
    fn test_failure_goes_to_error_stream() {
        let mut out = Vec::new();
        let mut err = Vec::new();

        let status = finish(&report(failed_at(Stage::InjectContent)), false, &mut out, &mut err);

        assert_eq!(status, 1);
        assert!(out.is_empty());
        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("Publication failed at InjectContent: boom"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = QuillConfig::default();
        Overrides {
            headless: Some(true),
            diagnostics_dir: Some(PathBuf::from("/tmp/shots")),
        }
        .apply(&mut config);

        assert!(config.session.headless);
        assert_eq!(config.diagnostics.dir, PathBuf::from("/tmp/shots"));
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp = TempDir::new().unwrap();

        cmd_init(temp.path(), false).unwrap();
        assert!(QuillConfig::default_path(temp.path()).exists());
        assert!(cmd_init(temp.path(), false).is_err());
        assert!(cmd_init(temp.path(), true).is_ok());
    }

    #[test]
    fn test_explicit_config_file_is_loaded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("quill.toml");
        std::fs::write(&path, "[session]\nheadless = true\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(config.session.headless);
        assert!(load_config(Some(&temp.path().join("missing.toml"))).is_err());
    }
}
