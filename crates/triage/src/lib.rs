//! `sitemerge-triage`: merge crawl, search and analytics exports into one
//! record per page, then find and rank the pages that underperform.
//!
//! Pure engine crate: receives CSV text or pre-built tables, returns the
//! merged dataset, anomaly report and triage tables. No CLI or filesystem
//! access.
//!
//! Stages run strictly in order: [`normalize()`] keys, [`merge()`] the three
//! sources, [`derive`](derived::derive) ratios, [`score_anomalies`]
//! against the cohort median, [`rank`](rank::rank) the opportunities.

pub mod adapter;
pub mod anomaly;
pub mod config;
pub mod derived;
pub mod engine;
pub mod error;
pub mod export;
pub mod merge;
pub mod model;
pub mod normalize;
pub mod rank;
pub mod source;
pub mod summary;

pub use adapter::{load_csv_rows, RawRow, RawTable};
pub use anomaly::score_anomalies;
pub use config::TriageConfig;
pub use engine::{run, TriageInput};
pub use error::{DataWarning, Stage, TriageError};
pub use merge::merge;
pub use model::{
    AnomalyRecord, AnomalyReport, CanonicalPage, MergedDataset, RunContext, TriageRecord,
    TriageResult,
};
pub use normalize::{normalize, CanonicalKey, KeyOptions};
pub use source::{Field, SourceKind};
