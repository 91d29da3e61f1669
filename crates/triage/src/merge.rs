//! Three-way outer join on the canonical key.
//!
//! Every key present in at least one source yields exactly one page. Each
//! field set comes from the single source that owns it; a source without a
//! row for the key leaves its field set absent. The only value more than one
//! source can supply is the display URL, and the join order decides it:
//! crawl, then search, then analytics.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::adapter::{RawRow, RawTable};
use crate::error::{DataWarning, TriageError};
use crate::model::{
    AnalyticsFields, CanonicalPage, CrawlFields, DerivedFields, MergedDataset, RunContext,
    SearchFields,
};
use crate::normalize::{CanonicalKey, KeyOptions};
use crate::source::{Field, SourceKind};

#[derive(Debug)]
pub struct MergeOutput {
    pub dataset: MergedDataset,
    pub warnings: Vec<DataWarning>,
}

/// Outer-join the three source tables into one page per canonical key.
pub fn merge(
    frog: &RawTable,
    gsc: &RawTable,
    ga4: &RawTable,
    keys: &KeyOptions,
    run: &RunContext,
) -> Result<MergeOutput, TriageError> {
    check_slot(frog, SourceKind::Frog)?;
    check_slot(gsc, SourceKind::Gsc)?;
    check_slot(ga4, SourceKind::Ga4)?;

    let mut warnings = Vec::new();
    let frog_map = index_rows(frog, keys, &mut warnings);
    let gsc_map = index_rows(gsc, keys, &mut warnings);
    let ga4_map = index_rows(ga4, keys, &mut warnings);

    let all_keys: BTreeSet<&CanonicalKey> = frog_map
        .keys()
        .chain(gsc_map.keys())
        .chain(ga4_map.keys())
        .collect();

    let pages: Vec<CanonicalPage> = all_keys
        .into_iter()
        .map(|key| {
            let frog_row = frog_map.get(key);
            let gsc_row = gsc_map.get(key);
            let ga4_row = ga4_map.get(key);

            let url = frog_row
                .or(gsc_row)
                .or(ga4_row)
                .map(|r| r.url.clone())
                .unwrap_or_default();

            CanonicalPage {
                key: key.clone(),
                url,
                crawl: frog_row.map(|r| crawl_fields(r)),
                search: gsc_row.map(|r| search_fields(r)),
                analytics: ga4_row.map(|r| analytics_fields(r)),
                derived: DerivedFields::default(),
                run_id: run.run_id.clone(),
                run_timestamp: run.run_timestamp,
            }
        })
        .collect();

    debug!(
        "merged {} + {} + {} rows into {} pages",
        frog.len(),
        gsc.len(),
        ga4.len(),
        pages.len()
    );

    Ok(MergeOutput {
        dataset: MergedDataset {
            run: run.clone(),
            pages,
        },
        warnings,
    })
}

fn check_slot(table: &RawTable, expected: SourceKind) -> Result<(), TriageError> {
    if table.source != expected {
        return Err(TriageError::SourceMismatch {
            input: table.source,
            expected,
        });
    }
    if table.identifier_column.is_none() && !table.rows.is_empty() {
        return Err(TriageError::MissingIdentifierColumn {
            input: table.source,
            tried: "no identifier column resolved".into(),
        });
    }
    Ok(())
}

/// Key each row. Empty identifiers are skipped; on duplicate keys the first
/// row in file order wins.
fn index_rows<'a>(
    table: &'a RawTable,
    keys: &KeyOptions,
    warnings: &mut Vec<DataWarning>,
) -> BTreeMap<CanonicalKey, &'a RawRow> {
    let mut map: BTreeMap<CanonicalKey, &RawRow> = BTreeMap::new();

    for row in &table.rows {
        let key = keys.normalize(&row.url);
        if key.is_empty() {
            let w = DataWarning::EmptyIdentifier {
                source: table.source,
                line: row.line,
            };
            warn!("{w}");
            warnings.push(w);
            continue;
        }

        if let Some(first) = map.get(&key) {
            let w = DataWarning::DuplicateKey {
                source: table.source,
                key: key.to_string(),
                line: row.line,
                first_line: first.line,
            };
            warn!("{w}");
            warnings.push(w);
            continue;
        }

        map.insert(key, row);
    }

    map
}

fn crawl_fields(row: &RawRow) -> CrawlFields {
    CrawlFields {
        status_code: row
            .count(Field::StatusCode)
            .and_then(|c| u16::try_from(c).ok()),
        title: row.text(Field::Title).map(str::to_string),
        meta_description: row.text(Field::MetaDescription).map(str::to_string),
        word_count: row.count(Field::WordCount),
        inlinks: row.count(Field::Inlinks),
        schema_types: row.text(Field::SchemaTypes).map(str::to_string),
    }
}

fn search_fields(row: &RawRow) -> SearchFields {
    SearchFields {
        clicks: row.number(Field::Clicks),
        impressions: row.number(Field::Impressions),
        ctr: row.number(Field::Ctr),
        position: row.number(Field::Position),
    }
}

fn analytics_fields(row: &RawRow) -> AnalyticsFields {
    AnalyticsFields {
        users: row.number(Field::Users),
        sessions: row.number(Field::Sessions),
        engaged_sessions: row.number(Field::EngagedSessions),
        avg_engagement_time: row.number(Field::AvgEngagementTime),
    }
}
