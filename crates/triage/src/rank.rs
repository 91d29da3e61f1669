//! Opportunity ranking and the playbook decision table.

use std::cmp::Reverse;

use log::debug;
use ordered_float::OrderedFloat;

use crate::config::TriageSettings;
use crate::model::{AnomalyRecord, EffortHint, Playbook, PublicTriageRow, TriageRecord};

/// One row of the decision table: the first rule whose predicate holds wins.
struct Rule {
    playbook: Playbook,
    effort: EffortHint,
    applies: fn(&AnomalyRecord, &TriageSettings) -> bool,
}

const PLAYBOOK_RULES: &[Rule] = &[
    Rule {
        playbook: Playbook::AuditCrawl,
        effort: EffortHint::Medium,
        applies: |r, _| r.page.crawl.is_none(),
    },
    Rule {
        playbook: Playbook::FixStatus,
        effort: EffortHint::Medium,
        applies: |r, _| crawl_status(r).is_some_and(|s| s >= 300),
    },
    Rule {
        playbook: Playbook::WriteTitle,
        effort: EffortHint::Low,
        applies: |r, _| is_blank(r.page.crawl.as_ref().and_then(|c| c.title.as_deref())),
    },
    Rule {
        playbook: Playbook::WriteMetaDescription,
        effort: EffortHint::Low,
        applies: |r, _| {
            is_blank(
                r.page
                    .crawl
                    .as_ref()
                    .and_then(|c| c.meta_description.as_deref()),
            )
        },
    },
    Rule {
        playbook: Playbook::AddStructuredData,
        effort: EffortHint::Medium,
        applies: |r, _| is_blank(r.page.crawl.as_ref().and_then(|c| c.schema_types.as_deref())),
    },
    Rule {
        playbook: Playbook::ExpandContent,
        effort: EffortHint::High,
        applies: |r, s| {
            let words = r.page.crawl.as_ref().and_then(|c| c.word_count);
            let impressions = r.page.impressions().unwrap_or(0.0);
            words.is_some_and(|w| w < s.thin_content_words) && impressions >= s.high_impressions
        },
    },
];

const FALLBACK: (Playbook, EffortHint) = (Playbook::RewriteSnippet, EffortHint::Low);

fn crawl_status(r: &AnomalyRecord) -> Option<u16> {
    r.page.crawl.as_ref().and_then(|c| c.status_code)
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

pub fn select_playbook(record: &AnomalyRecord, settings: &TriageSettings) -> (Playbook, EffortHint) {
    PLAYBOOK_RULES
        .iter()
        .find(|rule| (rule.applies)(record, settings))
        .map(|rule| (rule.playbook, rule.effort))
        .unwrap_or(FALLBACK)
}

/// Rank anomalous records: most missed clicks first, then most impressions,
/// then key. Records equal on both metrics share a dense rank.
pub fn rank(records: &[AnomalyRecord], settings: &TriageSettings) -> Vec<TriageRecord> {
    let mut anomalies: Vec<&AnomalyRecord> = records.iter().filter(|r| r.is_anomaly).collect();
    anomalies.sort_by_key(|r| {
        (
            Reverse(OrderedFloat(r.missed_clicks)),
            Reverse(OrderedFloat(r.page.impressions().unwrap_or(0.0))),
            r.page.key.clone(),
        )
    });

    let mut out = Vec::with_capacity(anomalies.len());
    let mut rank = 0;
    let mut previous: Option<(OrderedFloat<f64>, OrderedFloat<f64>)> = None;

    for record in anomalies {
        let metrics = (
            OrderedFloat(record.missed_clicks),
            OrderedFloat(record.page.impressions().unwrap_or(0.0)),
        );
        if previous != Some(metrics) {
            rank += 1;
            previous = Some(metrics);
        }
        out.push(triage_record(record, rank, settings));
    }

    debug!("ranked {} opportunities into {rank} ranks", out.len());
    out
}

fn triage_record(record: &AnomalyRecord, rank: usize, settings: &TriageSettings) -> TriageRecord {
    let (playbook, effort_hint) = select_playbook(record, settings);
    let page = &record.page;
    let crawl = page.crawl.as_ref();

    TriageRecord {
        priority_rank: rank,
        key: page.key.clone(),
        url: page.url.clone(),
        title: crawl.and_then(|c| c.title.clone()),
        meta_description: crawl.and_then(|c| c.meta_description.clone()),
        status_code: crawl.and_then(|c| c.status_code),
        word_count: crawl.and_then(|c| c.word_count),
        schema_types: crawl.and_then(|c| c.schema_types.clone()),
        clicks: page.clicks(),
        impressions: page.impressions(),
        ctr: page.ctr(),
        ctr_pct: page.derived.ctr_pct,
        position: page.position(),
        median_ctr: record.median_ctr,
        missed_clicks: record.missed_clicks,
        playbook,
        effort_hint,
        intent_note: String::new(),
        run_id: page.run_id.clone(),
        run_timestamp: page.run_timestamp,
    }
}

/// The top `top_n` triage rows with identifying fields removed.
pub fn public_view(triage: &[TriageRecord], top_n: usize) -> Vec<PublicTriageRow> {
    triage
        .iter()
        .take(top_n)
        .map(|t| PublicTriageRow {
            priority_rank: t.priority_rank,
            path: t.key.path().to_string(),
            playbook: t.playbook,
            effort_hint: t.effort_hint,
            clicks: t.clicks,
            impressions: t.impressions,
            ctr_pct: t.ctr_pct,
            position: t.position,
            missed_clicks: t.missed_clicks,
            word_count: t.word_count,
            has_structured_data: !is_blank(t.schema_types.as_deref()),
            run_id: t.run_id.clone(),
        })
        .collect()
}
