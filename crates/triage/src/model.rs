use serde::Serialize;

use crate::error::DataWarning;
use crate::normalize::CanonicalKey;

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run-scoped identity, captured once and copied onto every output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    pub run_id: String,
    /// Seconds since epoch.
    pub run_timestamp: i64,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, run_timestamp: i64) -> Self {
        Self {
            run_id: run_id.into(),
            run_timestamp,
        }
    }

    /// Use the overrides where given, otherwise a fresh id and the current time.
    pub fn resolve(run_id: Option<&str>, run_timestamp: Option<i64>) -> Self {
        Self {
            run_id: run_id
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            run_timestamp: run_timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp()),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-source field sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlFields {
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub word_count: Option<u64>,
    pub inlinks: Option<u64>,
    pub schema_types: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchFields {
    pub clicks: Option<f64>,
    pub impressions: Option<f64>,
    /// Fraction, not percent.
    pub ctr: Option<f64>,
    pub position: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsFields {
    pub users: Option<f64>,
    pub sessions: Option<f64>,
    pub engaged_sessions: Option<f64>,
    /// Seconds.
    pub avg_engagement_time: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedFields {
    pub ctr_pct: Option<f64>,
    pub engagement_rate: Option<f64>,
    pub engagement_rate_pct: Option<f64>,
    pub click_share: Option<f64>,
}

// ---------------------------------------------------------------------------
// Merged dataset
// ---------------------------------------------------------------------------

/// One page after the three-way join. A `None` field set means that source
/// had no row for this key; that is distinct from a row with zero values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPage {
    pub key: CanonicalKey,
    /// First raw identifier seen for the key, in join order.
    pub url: String,
    pub crawl: Option<CrawlFields>,
    pub search: Option<SearchFields>,
    pub analytics: Option<AnalyticsFields>,
    pub derived: DerivedFields,
    pub run_id: String,
    pub run_timestamp: i64,
}

impl CanonicalPage {
    pub fn source_frog(&self) -> bool {
        self.crawl.is_some()
    }

    pub fn source_gsc(&self) -> bool {
        self.search.is_some()
    }

    pub fn source_ga4(&self) -> bool {
        self.analytics.is_some()
    }

    pub fn clicks(&self) -> Option<f64> {
        self.search.as_ref().and_then(|s| s.clicks)
    }

    pub fn impressions(&self) -> Option<f64> {
        self.search.as_ref().and_then(|s| s.impressions)
    }

    pub fn ctr(&self) -> Option<f64> {
        self.search.as_ref().and_then(|s| s.ctr)
    }

    pub fn position(&self) -> Option<f64> {
        self.search.as_ref().and_then(|s| s.position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedDataset {
    pub run: RunContext,
    /// Sorted by key.
    pub pages: Vec<CanonicalPage>,
}

impl MergedDataset {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CanonicalPage> {
        self.pages
            .binary_search_by(|p| p.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.pages[i])
    }
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

/// Cohort comparison for one eligible page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub page: CanonicalPage,
    pub median_ctr: f64,
    pub missed_clicks: f64,
    pub is_anomaly: bool,
}

/// Output of the anomaly scorer. An empty cohort has no median and no records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub position_threshold: f64,
    pub cohort_size: usize,
    pub median_ctr: Option<f64>,
    pub records: Vec<AnomalyRecord>,
}

impl AnomalyReport {
    pub fn is_empty_cohort(&self) -> bool {
        self.cohort_size == 0
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyRecord> {
        self.records.iter().filter(|r| r.is_anomaly)
    }
}

// ---------------------------------------------------------------------------
// Triage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Playbook {
    AuditCrawl,
    FixStatus,
    WriteTitle,
    WriteMetaDescription,
    AddStructuredData,
    ExpandContent,
    RewriteSnippet,
}

impl Playbook {
    pub fn label(&self) -> &'static str {
        match self {
            Self::AuditCrawl => "audit crawl coverage",
            Self::FixStatus => "fix status code",
            Self::WriteTitle => "write title tag",
            Self::WriteMetaDescription => "write meta description",
            Self::AddStructuredData => "add structured data",
            Self::ExpandContent => "expand content",
            Self::RewriteSnippet => "rewrite title and meta for ctr",
        }
    }
}

impl std::fmt::Display for Playbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortHint {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for EffortHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Ranked opportunity. Owns copies of everything it shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageRecord {
    pub priority_rank: usize,
    pub key: CanonicalKey,
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub status_code: Option<u16>,
    pub word_count: Option<u64>,
    pub schema_types: Option<String>,
    pub clicks: Option<f64>,
    pub impressions: Option<f64>,
    pub ctr: Option<f64>,
    pub ctr_pct: Option<f64>,
    pub position: Option<f64>,
    pub median_ctr: f64,
    pub missed_clicks: f64,
    pub playbook: Playbook,
    pub effort_hint: EffortHint,
    /// Left blank for analysts.
    pub intent_note: String,
    pub run_id: String,
    pub run_timestamp: i64,
}

/// Shareable view of a triage row: no host, title, description or note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicTriageRow {
    pub priority_rank: usize,
    pub path: String,
    pub playbook: Playbook,
    pub effort_hint: EffortHint,
    pub clicks: Option<f64>,
    pub impressions: Option<f64>,
    pub ctr_pct: Option<f64>,
    pub position: Option<f64>,
    pub missed_clicks: f64,
    pub word_count: Option<u64>,
    pub has_structured_data: bool,
    pub run_id: String,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub pages: usize,
    pub from_frog: usize,
    pub from_gsc: usize,
    pub from_ga4: usize,
    pub in_all_sources: usize,
    pub cohort_size: usize,
    pub median_ctr: Option<f64>,
    pub anomalies: usize,
    pub triaged: usize,
    pub total_missed_clicks: f64,
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_id: String,
    pub run_timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriageResult {
    pub meta: RunMeta,
    pub summary: RunSummary,
    pub dataset: MergedDataset,
    pub anomalies: AnomalyReport,
    pub triage: Vec<TriageRecord>,
    pub public: Vec<PublicTriageRow>,
    pub warnings: Vec<DataWarning>,
}
