//! `sitemerge run` / `sitemerge validate` : config-driven merge and triage.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{debug, info};

use sitemerge_triage::export::{anomaly_table, merged_table, public_table, triage_table, write_csv, Table};
use sitemerge_triage::{load_csv_rows, RunContext, TriageConfig, TriageInput, TriageResult};

use crate::exit_codes::{EXIT_ERROR, EXIT_RUNTIME_IO, EXIT_STRICT_WARNINGS};
use crate::manifest::{InputManifest, RunManifest};
use crate::CliError;

pub const MERGED_FILE: &str = "merged.csv";
pub const ANOMALIES_FILE: &str = "anomalies.csv";
pub const TRIAGE_FILE: &str = "triage.csv";
pub const PUBLIC_FILE: &str = "triage_public.csv";
pub const MANIFEST_FILE: &str = "run.json";

pub struct RunArgs {
    pub config: PathBuf,
    pub out: Option<PathBuf>,
    pub json: bool,
    pub run_id: Option<String>,
    pub run_timestamp: Option<i64>,
    pub strict: bool,
    pub quiet: bool,
}

fn runtime_err(msg: impl Into<String>) -> CliError {
    CliError {
        code: EXIT_RUNTIME_IO,
        message: msg.into(),
        hint: None,
    }
}

/// Read and validate a config file.
fn load_config(path: &Path) -> Result<TriageConfig, CliError> {
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        runtime_err(format!("cannot read config {}: {e}", path.display()))
            .with_hint("pass the path to a .triage.toml file")
    })?;
    TriageConfig::from_toml(&config_str).map_err(CliError::triage)
}

/// Directory that relative paths in the config resolve against.
fn config_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let sources: Vec<&str> = config.sources.iter().map(|(s, _)| s.as_str()).collect();
    eprintln!(
        "config ok: '{}' ({} source{}: {})",
        config.name,
        sources.len(),
        if sources.len() == 1 { "" } else { "s" },
        sources.join(", ")
    );
    Ok(())
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let base_dir = config_dir(&args.config);

    let mut input = TriageInput::default();
    let mut inputs = Vec::new();
    for (source, source_config) in config.sources.iter() {
        let csv_path = base_dir.join(&source_config.file);
        let bytes = std::fs::read(&csv_path).map_err(|e| {
            runtime_err(format!("[{source}] cannot read {}: {e}", csv_path.display()))
                .with_hint("file paths are resolved relative to the config file")
        })?;
        let csv_data = String::from_utf8(bytes).map_err(|e| {
            runtime_err(format!("[{source}] {} is not UTF-8: {e}", csv_path.display()))
        })?;
        let table = load_csv_rows(source, &csv_data, source_config).map_err(CliError::triage)?;
        debug!("{source}: {} rows from {}", table.len(), csv_path.display());

        inputs.push(InputManifest::new(
            source,
            source_config.file.clone(),
            table.len(),
            csv_data.as_bytes(),
        ));
        input = input.with(table);
    }

    // Flags override the config, which overrides fresh values.
    let ctx = RunContext::resolve(
        args.run_id.as_deref().or(config.run_id.as_deref()),
        args.run_timestamp.or(config.run_timestamp),
    );

    let result = sitemerge_triage::run(&config, &input, ctx).map_err(CliError::triage)?;

    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| base_dir.join(&config.output.dir));
    let outputs = write_outputs(&result, &out_dir)?;

    let manifest = RunManifest::new(&result, inputs, outputs);
    let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: format!("JSON serialization error: {e}"),
        hint: None,
    })?;
    let manifest_path = out_dir.join(MANIFEST_FILE);
    std::fs::write(&manifest_path, &manifest_json).map_err(|e| {
        runtime_err(format!("cannot write {}: {e}", manifest_path.display()))
    })?;
    info!("wrote {}", manifest_path.display());

    if args.json {
        println!("{manifest_json}");
    }

    if !args.quiet {
        print_summary(&result, &out_dir);
    }

    if args.strict && !result.warnings.is_empty() {
        return Err(CliError {
            code: EXIT_STRICT_WARNINGS,
            message: format!("{} data warning(s) under --strict", result.warnings.len()),
            hint: Some(format!("see warnings in {}", manifest_path.display())),
        });
    }

    Ok(())
}

/// Write the four tables and return their file names in write order.
fn write_outputs(result: &TriageResult, out_dir: &Path) -> Result<Vec<String>, CliError> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| runtime_err(format!("cannot create {}: {e}", out_dir.display())))?;

    let tables: [(&str, Table); 4] = [
        (MERGED_FILE, merged_table(&result.dataset)),
        (ANOMALIES_FILE, anomaly_table(&result.anomalies)),
        (TRIAGE_FILE, triage_table(&result.triage)),
        (PUBLIC_FILE, public_table(&result.public)),
    ];

    let mut written = Vec::with_capacity(tables.len() + 1);
    for (name, table) in &tables {
        let path = out_dir.join(name);
        let file = File::create(&path)
            .map_err(|e| runtime_err(format!("cannot create {}: {e}", path.display())))?;
        write_csv(table, BufWriter::new(file)).map_err(CliError::triage)?;
        debug!("wrote {} ({} rows)", path.display(), table.len());
        written.push(name.to_string());
    }
    written.push(MANIFEST_FILE.to_string());
    Ok(written)
}

fn print_summary(result: &TriageResult, out_dir: &Path) {
    let s = &result.summary;
    eprintln!(
        "merged {} pages (frog {}, gsc {}, ga4 {}; {} in all three)",
        s.pages, s.from_frog, s.from_gsc, s.from_ga4, s.in_all_sources,
    );
    match s.median_ctr {
        Some(median) => eprintln!(
            "cohort: {} pages at position <= {}, median ctr {:.4}; {} anomalies, {} missed clicks",
            s.cohort_size,
            result.anomalies.position_threshold,
            median,
            s.anomalies,
            s.total_missed_clicks,
        ),
        None => eprintln!(
            "cohort: no pages at position <= {}; nothing to triage",
            result.anomalies.position_threshold
        ),
    }
    if s.warnings > 0 {
        eprintln!("{} data warning(s), listed in {MANIFEST_FILE}", s.warnings);
    }
    eprintln!("wrote {}", out_dir.display());
}
