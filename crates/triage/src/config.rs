use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::TriageError;
use crate::normalize::KeyOptions;
use crate::source::SourceKind;

pub const DEFAULT_POSITION_THRESHOLD: f64 = 5.0;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriageConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Host given to bare-path identifiers (`/blog/roses`).
    #[serde(default)]
    pub base_host: Option<String>,
    #[serde(default)]
    pub strip_all_query_params: bool,
    /// Pages ranking at or above this position form the anomaly cohort.
    #[serde(default = "default_threshold")]
    pub eligible_position_threshold: f64,
    /// Fixed run identity, for reproducible runs.
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub run_timestamp: Option<i64>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub triage: TriageSettings,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "site triage".into()
}

fn default_threshold() -> f64 {
    DEFAULT_POSITION_THRESHOLD
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_host: None,
            strip_all_query_params: false,
            eligible_position_threshold: DEFAULT_POSITION_THRESHOLD,
            run_id: None,
            run_timestamp: None,
            sources: SourcesConfig::default(),
            triage: TriageSettings::default(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(default)]
    pub frog: Option<SourceConfig>,
    #[serde(default)]
    pub gsc: Option<SourceConfig>,
    #[serde(default)]
    pub ga4: Option<SourceConfig>,
}

impl SourcesConfig {
    pub fn get(&self, source: SourceKind) -> Option<&SourceConfig> {
        match source {
            SourceKind::Frog => self.frog.as_ref(),
            SourceKind::Gsc => self.gsc.as_ref(),
            SourceKind::Ga4 => self.ga4.as_ref(),
        }
    }

    /// Configured sources in join order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceKind, &SourceConfig)> {
        SourceKind::ALL
            .into_iter()
            .filter_map(move |s| self.get(s).map(|c| (s, c)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub file: String,
    /// Canonical field name → native column header. Replaces the default aliases.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Triage + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriageSettings {
    /// Below this word count a page is thin.
    #[serde(default = "default_thin_content_words")]
    pub thin_content_words: u64,
    /// At or above this many impressions a thin page is worth expanding.
    #[serde(default = "default_high_impressions")]
    pub high_impressions: f64,
    /// Rows kept in the public-safe subset.
    #[serde(default = "default_public_top_n")]
    pub public_top_n: usize,
}

fn default_thin_content_words() -> u64 {
    300
}

fn default_high_impressions() -> f64 {
    1000.0
}

fn default_public_top_n() -> usize {
    25
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            thin_content_words: default_thin_content_words(),
            high_impressions: default_high_impressions(),
            public_top_n: default_public_top_n(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

fn default_output_dir() -> String {
    "merged".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl TriageConfig {
    pub fn from_toml(input: &str) -> Result<Self, TriageError> {
        let config: TriageConfig =
            toml::from_str(input).map_err(|e| TriageError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TriageError> {
        if self.sources.iter().next().is_none() {
            return Err(TriageError::ConfigValidation(
                "at least one of [sources.frog], [sources.gsc], [sources.ga4] is required".into(),
            ));
        }

        if !(self.eligible_position_threshold > 0.0) {
            return Err(TriageError::ConfigValidation(format!(
                "eligible_position_threshold must be positive, got {}",
                self.eligible_position_threshold
            )));
        }

        if self.triage.public_top_n == 0 {
            return Err(TriageError::ConfigValidation(
                "triage.public_top_n must be at least 1".into(),
            ));
        }

        for (source, cfg) in self.sources.iter() {
            if cfg.file.trim().is_empty() {
                return Err(TriageError::ConfigValidation(format!(
                    "sources.{source}: file must not be empty"
                )));
            }
            for name in cfg.columns.keys() {
                if source.field_named(name).is_none() {
                    let known: Vec<&str> = source.fields().iter().map(|f| f.name()).collect();
                    return Err(TriageError::ConfigValidation(format!(
                        "sources.{source}.columns: unknown field '{name}' (expected one of {})",
                        known.join(", ")
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn key_options(&self) -> KeyOptions {
        KeyOptions::new(self.base_host.as_deref(), self.strip_all_query_params)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
