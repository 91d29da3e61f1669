use log::{debug, info, warn};

use crate::adapter::RawTable;
use crate::anomaly::score_anomalies;
use crate::config::TriageConfig;
use crate::derived::derive;
use crate::error::{DataWarning, TriageError};
use crate::merge::merge;
use crate::model::{RunContext, RunMeta, TriageResult};
use crate::rank::{public_view, rank};
use crate::source::SourceKind;
use crate::summary::compute_summary;

/// Pre-loaded source tables. `None` means the source was not configured.
#[derive(Debug, Clone, Default)]
pub struct TriageInput {
    pub frog: Option<RawTable>,
    pub gsc: Option<RawTable>,
    pub ga4: Option<RawTable>,
}

impl TriageInput {
    pub fn with(mut self, table: RawTable) -> Self {
        match table.source {
            SourceKind::Frog => self.frog = Some(table),
            SourceKind::Gsc => self.gsc = Some(table),
            SourceKind::Ga4 => self.ga4 = Some(table),
        }
        self
    }

    pub fn get(&self, source: SourceKind) -> Option<&RawTable> {
        match source {
            SourceKind::Frog => self.frog.as_ref(),
            SourceKind::Gsc => self.gsc.as_ref(),
            SourceKind::Ga4 => self.ga4.as_ref(),
        }
    }
}

/// Run the full pipeline: merge, derive, score, rank.
pub fn run(
    config: &TriageConfig,
    input: &TriageInput,
    run: RunContext,
) -> Result<TriageResult, TriageError> {
    let mut warnings: Vec<DataWarning> = Vec::new();

    let empty: Vec<RawTable> = SourceKind::ALL.into_iter().map(RawTable::empty).collect();
    let mut tables: Vec<&RawTable> = Vec::with_capacity(3);
    for (source, fallback) in SourceKind::ALL.into_iter().zip(&empty) {
        match input.get(source) {
            Some(table) => {
                warnings.extend(table.warnings.iter().cloned());
                tables.push(table);
            }
            None => {
                let w = DataWarning::SourceMissing { source };
                warn!("{w}");
                warnings.push(w);
                tables.push(fallback);
            }
        }
    }

    let merged = merge(tables[0], tables[1], tables[2], &config.key_options(), &run)?;
    warnings.extend(merged.warnings);

    let dataset = derive(merged.dataset);
    let anomalies = score_anomalies(&dataset, config.eligible_position_threshold);
    let triage = rank(&anomalies.records, &config.triage);
    let public = public_view(&triage, config.triage.public_top_n);

    let summary = compute_summary(&dataset, &anomalies, &triage, warnings.len());
    debug!("{summary:?}");
    info!(
        "run {}: {} pages, {} anomalies, {} warnings",
        run.run_id,
        summary.pages,
        summary.anomalies,
        warnings.len()
    );

    Ok(TriageResult {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: run.run_id,
            run_timestamp: run.run_timestamp,
        },
        summary,
        dataset,
        anomalies,
        triage,
        public,
        warnings,
    })
}
