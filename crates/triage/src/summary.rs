use crate::derived::round_to;
use crate::model::{AnomalyReport, MergedDataset, RunSummary, TriageRecord};

/// Count pages per source and roll up the anomaly and triage stages.
pub fn compute_summary(
    dataset: &MergedDataset,
    anomalies: &AnomalyReport,
    triage: &[TriageRecord],
    warnings: usize,
) -> RunSummary {
    let mut summary = RunSummary {
        pages: dataset.len(),
        cohort_size: anomalies.cohort_size,
        median_ctr: anomalies.median_ctr,
        triaged: triage.len(),
        warnings,
        ..Default::default()
    };

    for page in &dataset.pages {
        if page.source_frog() {
            summary.from_frog += 1;
        }
        if page.source_gsc() {
            summary.from_gsc += 1;
        }
        if page.source_ga4() {
            summary.from_ga4 += 1;
        }
        if page.source_frog() && page.source_gsc() && page.source_ga4() {
            summary.in_all_sources += 1;
        }
    }

    let mut missed = 0.0;
    for record in anomalies.anomalies() {
        summary.anomalies += 1;
        missed += record.missed_clicks;
    }
    summary.total_missed_clicks = round_to(missed, 3);

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AnalyticsFields, AnomalyRecord, CanonicalPage, CrawlFields, DerivedFields, RunContext,
        SearchFields,
    };
    use crate::normalize::normalize;

    fn page(key: &str, frog: bool, gsc: bool, ga4: bool) -> CanonicalPage {
        CanonicalPage {
            key: normalize(key, None, false),
            url: key.into(),
            crawl: frog.then(CrawlFields::default),
            search: gsc.then(SearchFields::default),
            analytics: ga4.then(AnalyticsFields::default),
            derived: DerivedFields::default(),
            run_id: "r".into(),
            run_timestamp: 0,
        }
    }

    #[test]
    fn summary_counts() {
        let dataset = MergedDataset {
            run: RunContext::new("r", 0),
            pages: vec![
                page("/a", true, true, true),
                page("/b", true, false, false),
                page("/c", false, true, true),
            ],
        };
        let record = |p: &CanonicalPage, missed: f64, is_anomaly: bool| AnomalyRecord {
            page: p.clone(),
            median_ctr: 0.05,
            missed_clicks: missed,
            is_anomaly,
        };
        let report = AnomalyReport {
            position_threshold: 5.0,
            cohort_size: 2,
            median_ctr: Some(0.05),
            records: vec![
                record(&dataset.pages[0], 12.5, true),
                record(&dataset.pages[2], 0.0, false),
            ],
        };

        let summary = compute_summary(&dataset, &report, &[], 4);
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.from_frog, 2);
        assert_eq!(summary.from_gsc, 2);
        assert_eq!(summary.from_ga4, 2);
        assert_eq!(summary.in_all_sources, 1);
        assert_eq!(summary.cohort_size, 2);
        assert_eq!(summary.anomalies, 1);
        assert_eq!(summary.total_missed_clicks, 12.5);
        assert_eq!(summary.warnings, 4);
        assert_eq!(summary.triaged, 0);
    }
}
