//! Median-relative CTR scoring over the eligible cohort.

use log::{debug, info};

use crate::derived::round_to;
use crate::model::{AnomalyRecord, AnomalyReport, CanonicalPage, MergedDataset};

/// Median of `values`. Sorts in place. Even-sized input averages the two
/// middle values.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// A page is eligible when it ranks at or above `threshold` and has a CTR.
pub fn is_eligible(page: &CanonicalPage, threshold: f64) -> bool {
    matches!(
        (page.position(), page.ctr()),
        (Some(pos), Some(_)) if pos <= threshold
    )
}

/// Compare one page against a cohort median. Missing impressions count as zero.
pub fn score_against(page: &CanonicalPage, median_ctr: f64) -> AnomalyRecord {
    let ctr = page.ctr().unwrap_or(0.0);
    let impressions = page.impressions().unwrap_or(0.0);
    let missed = ((median_ctr - ctr) * impressions).max(0.0);

    AnomalyRecord {
        page: page.clone(),
        median_ctr,
        missed_clicks: round_to(missed, 3),
        is_anomaly: ctr < median_ctr,
    }
}

/// Score every eligible page. Pages outside the cohort get no record.
pub fn score_anomalies(dataset: &MergedDataset, threshold: f64) -> AnomalyReport {
    let cohort: Vec<&CanonicalPage> = dataset
        .pages
        .iter()
        .filter(|p| is_eligible(p, threshold))
        .collect();

    let mut ctrs: Vec<f64> = cohort.iter().filter_map(|p| p.ctr()).collect();
    let Some(median_ctr) = median(&mut ctrs) else {
        info!("no pages at position <= {threshold}; anomaly set is empty");
        return AnomalyReport {
            position_threshold: threshold,
            cohort_size: 0,
            median_ctr: None,
            records: Vec::new(),
        };
    };

    let records: Vec<AnomalyRecord> = cohort
        .iter()
        .map(|p| score_against(p, median_ctr))
        .collect();

    debug!(
        "cohort of {} pages, median ctr {median_ctr}, {} anomalies",
        cohort.len(),
        records.iter().filter(|r| r.is_anomaly).count()
    );

    AnomalyReport {
        position_threshold: threshold,
        cohort_size: cohort.len(),
        median_ctr: Some(median_ctr),
        records,
    }
}
