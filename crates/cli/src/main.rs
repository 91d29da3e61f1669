// sitemerge CLI - merge crawl, search and analytics exports and triage pages

mod exit_codes;
mod manifest;
mod run;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use sitemerge_triage::{KeyOptions, TriageError};

use exit_codes::{triage_exit_code, EXIT_RUNTIME_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "sitemerge")]
#[command(about = "Merge crawl, search and analytics exports into one record per page and rank the underperformers")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the configured exports and write the triage tables
    #[command(after_help = "\
Writes into the output directory:
  merged.csv          one row per page, all sources plus derived metrics
  anomalies.csv       pages below the cohort median CTR
  triage.csv          ranked opportunities with playbook and effort
  triage_public.csv   top rows without host, titles or descriptions
  run.json            inputs (with SHA-256), summary and warnings

Run identity: --run-id, then SITEMERGE_RUN_ID, then run_id in the config,
then a fresh UUID. --run-timestamp, then run_timestamp in the config, then now.

Examples:
  sitemerge run site.triage.toml
  sitemerge run site.triage.toml --out reports/2026-10
  sitemerge run site.triage.toml --json --run-id audit-42 --run-timestamp 1767225600
  sitemerge run site.triage.toml --strict -q
  SITEMERGE_RUN_ID=nightly sitemerge run site.triage.toml")]
    Run {
        /// Path to the .triage.toml config file
        config: PathBuf,

        /// Output directory (default: [output].dir, relative to the config)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Print run.json to stdout
        #[arg(long)]
        json: bool,

        /// Fixed run id (overrides the config; env SITEMERGE_RUN_ID)
        #[arg(long, env = "SITEMERGE_RUN_ID")]
        run_id: Option<String>,

        /// Fixed run timestamp, seconds since epoch (overrides the config)
        #[arg(long)]
        run_timestamp: Option<i64>,

        /// Exit 5 when the run produced data warnings
        #[arg(long)]
        strict: bool,

        /// Suppress the human summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Parse and validate a config without reading any export
    #[command(after_help = "\
Examples:
  sitemerge validate site.triage.toml")]
    Validate {
        /// Path to the .triage.toml config file
        config: PathBuf,
    },

    /// Print the join key for each URL, one per line
    #[command(after_help = "\
Examples:
  sitemerge normalize 'http://Example.com/blog/Roses/' /blog/Roses --base-host example.com
  sitemerge normalize 'https://example.com/a?utm_source=x&b=2&a=1'
  sitemerge normalize 'https://example.com/a?b=2' --strip-query")]
    Normalize {
        /// Raw page identifiers
        #[arg(required = true)]
        urls: Vec<String>,

        /// Host given to bare paths
        #[arg(long)]
        base_host: Option<String>,

        /// Drop every query parameter, not only tracking ones
        #[arg(long)]
        strip_query: bool,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            out,
            json,
            run_id,
            run_timestamp,
            strict,
            quiet,
        } => run::cmd_run(run::RunArgs {
            config,
            out,
            json,
            run_id,
            run_timestamp,
            strict,
            quiet,
        }),
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Normalize {
            urls,
            base_host,
            strip_query,
        } => cmd_normalize(urls, base_host, strip_query),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_RUNTIME_IO, message: msg.into(), hint: None }
    }

    /// Engine failure, prefixed with the stage that raised it.
    pub fn triage(err: TriageError) -> Self {
        let hint = match &err {
            TriageError::MissingIdentifierColumn { input, .. } => Some(format!(
                "map the page column explicitly: [sources.{input}.columns] url = \"<header>\""
            )),
            TriageError::UncoercibleColumn { input, .. } => Some(format!(
                "check the column mapping under [sources.{input}.columns]"
            )),
            TriageError::ConfigParse(_) | TriageError::ConfigValidation(_) => {
                Some("run `sitemerge validate <CONFIG>` after editing".to_string())
            }
            _ => None,
        };
        Self {
            code: triage_exit_code(&err),
            message: format!("[{}] {err}", err.stage()),
            hint,
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// normalize
// ============================================================================

fn cmd_normalize(
    urls: Vec<String>,
    base_host: Option<String>,
    strip_query: bool,
) -> Result<(), CliError> {
    if urls.iter().all(|u| u.trim().is_empty()) {
        return Err(CliError::args("no non-empty URL given")
            .with_hint("sitemerge normalize https://example.com/page"));
    }

    let keys = KeyOptions::new(base_host.as_deref(), strip_query);
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for url in &urls {
        writeln!(handle, "{}", keys.normalize(url)).map_err(|e| CliError::io(e.to_string()))?;
    }

    Ok(())
}
