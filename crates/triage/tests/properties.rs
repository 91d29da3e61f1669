// Property-based tests for key normalization, the join, derived shares and ranking.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::BTreeSet;

use proptest::prelude::*;
use sitemerge_triage::config::TriageSettings;
use sitemerge_triage::derived::derive;
use sitemerge_triage::merge::merge;
use sitemerge_triage::model::{AnomalyRecord, CanonicalPage, DerivedFields, SearchFields};
use sitemerge_triage::rank::rank;
use sitemerge_triage::{normalize, Field, KeyOptions, RawRow, RawTable, RunContext, SourceKind};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

fn arb_host() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("example.com".to_string()),
        Just("Example.COM".to_string()),
        Just("shop.example.org".to_string()),
        Just("example.com:8080".to_string()),
    ]
}

fn arb_path() -> impl Strategy<Value = String> {
    prop::collection::vec(r"[A-Za-z0-9_-]{1,8}", 0..4).prop_map(|segs| {
        if segs.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", segs.join("/"))
        }
    })
}

fn arb_query() -> impl Strategy<Value = String> {
    let param = prop_oneof![
        3 => (r"[a-z]{1,4}", r"[a-z0-9]{0,4}").prop_map(|(k, v)| format!("{k}={v}")),
        1 => r"[a-z0-9]{1,5}".prop_map(|v| format!("utm_source={v}")),
        1 => r"[a-z0-9]{1,5}".prop_map(|v| format!("gclid={v}")),
    ];
    prop::collection::vec(param, 0..3).prop_map(|params| {
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    })
}

/// A raw identifier in one of the spellings exports actually use.
fn arb_raw_url() -> impl Strategy<Value = String> {
    (
        0..4usize,
        arb_host(),
        arb_path(),
        prop::bool::ANY,
        arb_query(),
        prop::bool::ANY,
    )
        .prop_map(|(style, host, path, slash, query, fragment)| {
            let path = if slash && path != "/" {
                format!("{path}/")
            } else {
                path
            };
            let frag = if fragment { "#section" } else { "" };
            match style {
                0 => format!("https://{host}{path}{query}{frag}"),
                1 => format!("http://{host}{path}{query}"),
                2 => format!("{host}{path}{query}"),
                _ => format!("  {path}{query}  "),
            }
        })
}

fn arb_base_host() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("example.com".to_string())),
        Just(Some("https://Example.com/".to_string())),
    ]
}

fn table(source: SourceKind, urls: &[String]) -> RawTable {
    urls.iter().enumerate().fold(RawTable::new(source, "prop"), |t, (i, url)| {
        t.with_row(RawRow::new(i + 2, url.as_str()))
    })
}

fn searched_page(key: &str, clicks: Option<f64>) -> CanonicalPage {
    CanonicalPage {
        key: normalize(key, None, false),
        url: key.to_string(),
        crawl: None,
        search: Some(SearchFields {
            clicks,
            impressions: Some(1000.0),
            ctr: Some(0.01),
            position: Some(1.0),
        }),
        analytics: None,
        derived: DerivedFields::default(),
        run_id: "prop".into(),
        run_timestamp: 0,
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn normalization_is_idempotent(
        raw in arb_raw_url(),
        base in arb_base_host(),
        strip in prop::bool::ANY,
    ) {
        let once = normalize(&raw, base.as_deref(), strip);
        let twice = normalize(once.as_str(), base.as_deref(), strip);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalization_drops_tracking_and_fragment(raw in arb_raw_url(), base in arb_base_host()) {
        let key = normalize(&raw, base.as_deref(), false);
        prop_assert!(!key.as_str().contains("utm_"));
        prop_assert!(!key.as_str().contains("gclid"));
        prop_assert!(!key.as_str().contains('#'));
        prop_assert!(!key.as_str().contains("://"));
    }

    #[test]
    fn join_is_complete_and_unique(
        frog in prop::collection::vec(arb_raw_url(), 0..8),
        gsc in prop::collection::vec(arb_raw_url(), 0..8),
        ga4 in prop::collection::vec(arb_raw_url(), 0..8),
        base in arb_base_host(),
    ) {
        let keys = KeyOptions::new(base.as_deref(), false);
        let out = merge(
            &table(SourceKind::Frog, &frog),
            &table(SourceKind::Gsc, &gsc),
            &table(SourceKind::Ga4, &ga4),
            &keys,
            &RunContext::new("prop", 0),
        )
        .unwrap();

        let expected: BTreeSet<String> = frog
            .iter()
            .chain(&gsc)
            .chain(&ga4)
            .map(|u| keys.normalize(u).to_string())
            .collect();
        let actual: Vec<String> = out.dataset.pages.iter().map(|p| p.key.to_string()).collect();
        let unique: BTreeSet<String> = actual.iter().cloned().collect();

        prop_assert_eq!(actual.len(), unique.len());
        prop_assert_eq!(unique, expected);

        for page in &out.dataset.pages {
            let k = page.key.to_string();
            prop_assert_eq!(page.source_frog(), frog.iter().any(|u| keys.normalize(u).to_string() == k));
            prop_assert_eq!(page.source_gsc(), gsc.iter().any(|u| keys.normalize(u).to_string() == k));
            prop_assert_eq!(page.source_ga4(), ga4.iter().any(|u| keys.normalize(u).to_string() == k));
        }
    }

    #[test]
    fn click_share_sums_to_one(
        clicks in prop::collection::vec(prop::option::of(0u32..50_000), 1..40),
    ) {
        let pages: Vec<CanonicalPage> = clicks
            .iter()
            .enumerate()
            .map(|(i, c)| searched_page(&format!("/p{i:03}"), c.map(f64::from)))
            .collect();
        let total: f64 = clicks.iter().flatten().map(|c| f64::from(*c)).sum();
        let dataset = derive(sitemerge_triage::MergedDataset {
            run: RunContext::new("prop", 0),
            pages,
        });

        let shares: Vec<f64> = dataset.pages.iter().filter_map(|p| p.derived.click_share).collect();
        prop_assert!(shares.iter().all(|s| (0.0..=1.0).contains(s)));
        if total > 0.0 {
            let sum: f64 = shares.iter().sum();
            let tolerance = 5e-7 * shares.len() as f64 + 1e-9;
            prop_assert!((sum - 1.0).abs() <= tolerance, "sum {} over {} pages", sum, shares.len());
        } else {
            prop_assert!(shares.is_empty());
        }
    }

    #[test]
    fn rank_is_deterministic_and_dense(
        missed in prop::collection::vec(0u32..5, 1..30),
    ) {
        let records: Vec<AnomalyRecord> = missed
            .iter()
            .enumerate()
            .map(|(i, m)| AnomalyRecord {
                page: searched_page(&format!("/p{i:03}"), Some(1.0)),
                median_ctr: 0.05,
                missed_clicks: f64::from(*m) * 10.0,
                is_anomaly: true,
            })
            .collect();
        let settings = TriageSettings::default();

        let first = rank(&records, &settings);
        let mut reversed = records.clone();
        reversed.reverse();
        let second = rank(&reversed, &settings);
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first.first().map(|t| t.priority_rank), Some(1));
        for pair in first.windows(2) {
            prop_assert!(pair[0].missed_clicks >= pair[1].missed_clicks);
            let step = pair[1].priority_rank - pair[0].priority_rank;
            if pair[0].missed_clicks == pair[1].missed_clicks {
                prop_assert_eq!(step, 0);
                prop_assert!(pair[0].key < pair[1].key);
            } else {
                prop_assert_eq!(step, 1);
            }
        }
    }
}

#[test]
fn field_vocabulary_covers_search_metrics() {
    for field in [Field::Clicks, Field::Impressions, Field::Ctr, Field::Position] {
        assert!(SourceKind::Gsc.fields().contains(&field));
    }
}
