//! Tabular views of a run, ready for a CSV writer.
//!
//! Absent values become empty cells, never `0`.

use std::io::Write;

use crate::error::TriageError;
use crate::model::{AnomalyReport, MergedDataset, PublicTriageRow, TriageRecord};

pub const MERGED_HEADER: &[&str] = &[
    "key",
    "url",
    "source_frog",
    "source_gsc",
    "source_ga4",
    "status_code",
    "title",
    "meta_description",
    "word_count",
    "inlinks",
    "schema_types",
    "clicks",
    "impressions",
    "ctr",
    "position",
    "users",
    "sessions",
    "engaged_sessions",
    "avg_engagement_time",
    "ctr_pct",
    "engagement_rate",
    "engagement_rate_pct",
    "click_share",
    "run_id",
    "run_timestamp",
];

pub const ANOMALY_HEADER: &[&str] = &[
    "key",
    "url",
    "clicks",
    "impressions",
    "ctr",
    "ctr_pct",
    "position",
    "median_ctr",
    "missed_clicks",
    "is_anomaly",
    "run_id",
    "run_timestamp",
];

pub const TRIAGE_HEADER: &[&str] = &[
    "priority_rank",
    "key",
    "url",
    "playbook",
    "effort_hint",
    "missed_clicks",
    "median_ctr",
    "clicks",
    "impressions",
    "ctr",
    "ctr_pct",
    "position",
    "status_code",
    "title",
    "meta_description",
    "word_count",
    "schema_types",
    "intent_note",
    "run_id",
    "run_timestamp",
];

pub const PUBLIC_HEADER: &[&str] = &[
    "priority_rank",
    "path",
    "playbook",
    "effort_hint",
    "clicks",
    "impressions",
    "ctr_pct",
    "position",
    "missed_clicks",
    "word_count",
    "has_structured_data",
    "run_id",
];

/// Header plus string rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str]) -> Self {
        Self {
            columns: header.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell by row index and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx).map(String::as_str)
    }
}

fn num(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn int<T: ToString>(v: Option<T>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn text(v: Option<&str>) -> String {
    v.unwrap_or_default().to_string()
}

pub fn merged_table(dataset: &MergedDataset) -> Table {
    let mut table = Table::new(MERGED_HEADER);
    for page in &dataset.pages {
        let crawl = page.crawl.as_ref();
        let analytics = page.analytics.as_ref();
        table.rows.push(vec![
            page.key.to_string(),
            page.url.clone(),
            page.source_frog().to_string(),
            page.source_gsc().to_string(),
            page.source_ga4().to_string(),
            int(crawl.and_then(|c| c.status_code)),
            text(crawl.and_then(|c| c.title.as_deref())),
            text(crawl.and_then(|c| c.meta_description.as_deref())),
            int(crawl.and_then(|c| c.word_count)),
            int(crawl.and_then(|c| c.inlinks)),
            text(crawl.and_then(|c| c.schema_types.as_deref())),
            num(page.clicks()),
            num(page.impressions()),
            num(page.ctr()),
            num(page.position()),
            num(analytics.and_then(|a| a.users)),
            num(analytics.and_then(|a| a.sessions)),
            num(analytics.and_then(|a| a.engaged_sessions)),
            num(analytics.and_then(|a| a.avg_engagement_time)),
            num(page.derived.ctr_pct),
            num(page.derived.engagement_rate),
            num(page.derived.engagement_rate_pct),
            num(page.derived.click_share),
            page.run_id.clone(),
            page.run_timestamp.to_string(),
        ]);
    }
    table
}

/// Only records flagged as anomalies.
pub fn anomaly_table(report: &AnomalyReport) -> Table {
    let mut table = Table::new(ANOMALY_HEADER);
    for record in report.anomalies() {
        let page = &record.page;
        table.rows.push(vec![
            page.key.to_string(),
            page.url.clone(),
            num(page.clicks()),
            num(page.impressions()),
            num(page.ctr()),
            num(page.derived.ctr_pct),
            num(page.position()),
            record.median_ctr.to_string(),
            record.missed_clicks.to_string(),
            record.is_anomaly.to_string(),
            page.run_id.clone(),
            page.run_timestamp.to_string(),
        ]);
    }
    table
}

pub fn triage_table(triage: &[TriageRecord]) -> Table {
    let mut table = Table::new(TRIAGE_HEADER);
    for t in triage {
        table.rows.push(vec![
            t.priority_rank.to_string(),
            t.key.to_string(),
            t.url.clone(),
            t.playbook.to_string(),
            t.effort_hint.to_string(),
            t.missed_clicks.to_string(),
            t.median_ctr.to_string(),
            num(t.clicks),
            num(t.impressions),
            num(t.ctr),
            num(t.ctr_pct),
            num(t.position),
            int(t.status_code),
            text(t.title.as_deref()),
            text(t.meta_description.as_deref()),
            int(t.word_count),
            text(t.schema_types.as_deref()),
            t.intent_note.clone(),
            t.run_id.clone(),
            t.run_timestamp.to_string(),
        ]);
    }
    table
}

pub fn public_table(public: &[PublicTriageRow]) -> Table {
    let mut table = Table::new(PUBLIC_HEADER);
    for p in public {
        table.rows.push(vec![
            p.priority_rank.to_string(),
            p.path.clone(),
            p.playbook.to_string(),
            p.effort_hint.to_string(),
            num(p.clicks),
            num(p.impressions),
            num(p.ctr_pct),
            num(p.position),
            p.missed_clicks.to_string(),
            int(p.word_count),
            p.has_structured_data.to_string(),
            p.run_id.clone(),
        ]);
    }
    table
}

/// Write `table` as CSV with `\n` line endings.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), TriageError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(&table.columns)
        .map_err(|e| TriageError::Io(format!("CSV write error: {e}")))?;
    for row in &table.rows {
        csv.write_record(row)
            .map_err(|e| TriageError::Io(format!("CSV write error: {e}")))?;
    }
    csv.flush()
        .map_err(|e| TriageError::Io(format!("CSV flush error: {e}")))?;
    Ok(())
}
