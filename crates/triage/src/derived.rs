//! Derived metrics layered on top of the merged dataset.
//!
//! Every value is rounded half away from zero on the scaled value, so two
//! runs over the same input always agree to the last decimal.

use log::debug;

use crate::model::{CanonicalPage, DerivedFields, MergedDataset};

/// Round `value` to `places` decimals, half away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Fill the derived fields of every page. Source fields are left untouched.
pub fn derive(mut dataset: MergedDataset) -> MergedDataset {
    let total_clicks: f64 = dataset.pages.iter().filter_map(share_clicks).sum();

    for page in &mut dataset.pages {
        page.derived = derive_page(page, total_clicks);
    }

    debug!(
        "derived metrics for {} pages (total clicks {})",
        dataset.len(),
        total_clicks
    );
    dataset
}

/// Clicks that count toward click share. Negative counts never reach here
/// from an adapter, but hand-built pages are held to the same rule.
fn share_clicks(page: &CanonicalPage) -> Option<f64> {
    page.clicks().filter(|c| *c >= 0.0)
}

fn derive_page(page: &CanonicalPage, total_clicks: f64) -> DerivedFields {
    let ctr_pct = page.ctr().map(|ctr| round_to(ctr * 100.0, 2));

    // Rounded rate feeds the percentage so the two columns agree.
    let engagement_rate = page.analytics.as_ref().and_then(|a| {
        let sessions = a.sessions?;
        let engaged = a.engaged_sessions?;
        (sessions > 0.0 && engaged >= 0.0).then(|| round_to(engaged / sessions, 4))
    });
    let engagement_rate_pct = engagement_rate.map(|r| round_to(r * 100.0, 1));

    let click_share = if total_clicks > 0.0 {
        share_clicks(page).map(|c| round_to(c / total_clicks, 6))
    } else {
        None
    };

    DerivedFields {
        ctr_pct,
        engagement_rate,
        engagement_rate_pct,
        click_share,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalyticsFields, RunContext, SearchFields};
    use crate::normalize::normalize;

    fn page(key: &str) -> CanonicalPage {
        CanonicalPage {
            key: normalize(key, None, false),
            url: key.into(),
            crawl: None,
            search: None,
            analytics: None,
            derived: DerivedFields::default(),
            run_id: "r".into(),
            run_timestamp: 0,
        }
    }

    fn searched(key: &str, clicks: Option<f64>, ctr: Option<f64>) -> CanonicalPage {
        CanonicalPage {
            search: Some(SearchFields {
                clicks,
                ctr,
                ..Default::default()
            }),
            ..page(key)
        }
    }

    fn dataset(pages: Vec<CanonicalPage>) -> MergedDataset {
        MergedDataset {
            run: RunContext::new("r", 0),
            pages,
        }
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_to(2.5, 0), 3.0);
        assert_eq!(round_to(-2.5, 0), -3.0);
        assert_eq!(round_to(0.123456789, 6), 0.123457);
        assert_eq!(round_to(4.44, 1), 4.4);
    }

    #[test]
    fn ctr_pct_two_decimals() {
        let ds = derive(dataset(vec![searched("/a", Some(1.0), Some(0.04567))]));
        assert_eq!(ds.pages[0].derived.ctr_pct, Some(4.57));
    }

    #[test]
    fn ctr_pct_absent_without_ctr() {
        let ds = derive(dataset(vec![searched("/a", Some(1.0), None)]));
        assert_eq!(ds.pages[0].derived.ctr_pct, None);
    }

    #[test]
    fn engagement_rate_and_pct() {
        let mut p = page("/a");
        p.analytics = Some(AnalyticsFields {
            sessions: Some(3.0),
            engaged_sessions: Some(2.0),
            ..Default::default()
        });
        let ds = derive(dataset(vec![p]));
        assert_eq!(ds.pages[0].derived.engagement_rate, Some(0.6667));
        assert_eq!(ds.pages[0].derived.engagement_rate_pct, Some(66.7));
    }

    #[test]
    fn engagement_rate_absent_on_zero_sessions() {
        let mut p = page("/a");
        p.analytics = Some(AnalyticsFields {
            sessions: Some(0.0),
            engaged_sessions: Some(0.0),
            ..Default::default()
        });
        let ds = derive(dataset(vec![p]));
        assert_eq!(ds.pages[0].derived.engagement_rate, None);
        assert_eq!(ds.pages[0].derived.engagement_rate_pct, None);
    }

    #[test]
    fn click_share_over_pages_with_clicks() {
        let ds = derive(dataset(vec![
            searched("/a", Some(30.0), None),
            searched("/b", Some(10.0), None),
            searched("/c", None, None),
            page("/d"),
        ]));
        assert_eq!(ds.pages[0].derived.click_share, Some(0.75));
        assert_eq!(ds.pages[1].derived.click_share, Some(0.25));
        assert_eq!(ds.pages[2].derived.click_share, None);
        assert_eq!(ds.pages[3].derived.click_share, None);
    }

    #[test]
    fn click_share_absent_when_total_zero() {
        let ds = derive(dataset(vec![
            searched("/a", Some(0.0), None),
            searched("/b", Some(0.0), None),
        ]));
        assert!(ds.pages.iter().all(|p| p.derived.click_share.is_none()));
    }

    #[test]
    fn click_share_stays_within_unit_interval() {
        let ds = derive(dataset(vec![
            searched("/a", Some(-10.0), None),
            searched("/b", Some(20.0), None),
            searched("/c", Some(5.0), None),
        ]));
        assert_eq!(ds.pages[0].derived.click_share, None);
        assert_eq!(ds.pages[1].derived.click_share, Some(0.8));
        for share in ds.pages.iter().filter_map(|p| p.derived.click_share) {
            assert!((0.0..=1.0).contains(&share), "share {share} out of range");
        }
    }

    #[test]
    fn derive_keeps_source_fields() {
        let before = dataset(vec![searched("/a", Some(5.0), Some(0.1))]);
        let after = derive(before.clone());
        assert_eq!(after.pages[0].search, before.pages[0].search);
        assert_eq!(after.pages[0].key, before.pages[0].key);
    }
}
