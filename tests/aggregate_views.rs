// tests/aggregate_views.rs
//
// Contract tests for the aggregation engine's bounded views: bounds,
// ordering, partition behavior and the fixed heatmap domain, over inputs
// with deliberately missing/malformed fields.

use chrono::{TimeZone, Utc};

use threatdeck::aggregate::{
    self, HIGH_RISK_HEADLINES, TIMELINE_DAYS, TOP_SOURCES, TOP_TOPICS,
};
use threatdeck::types::{FeedItem, Ioc, RiskAnnotation};

fn feed_with_source(source: Option<&str>) -> FeedItem {
    FeedItem {
        source: source.map(str::to_string),
        ..FeedItem::default()
    }
}

fn ioc_with_type(kind: Option<&str>) -> Ioc {
    Ioc {
        kind: kind.map(str::to_string),
        ..Ioc::default()
    }
}

#[test]
fn group_by_source_partitions_input_with_unknown_absorbing_missing() {
    // 5 distinct keys (< 8), so every key must appear and counts must
    // partition the whole input.
    let sources = [
        Some("Alpha"),
        Some("alpha"),
        Some("Beta"),
        None,
        Some(""),
        Some("Gamma"),
        Some("delta"),
        Some("ALPHA"),
    ];
    let feeds: Vec<FeedItem> = sources.iter().map(|s| feed_with_source(*s)).collect();

    let out = aggregate::group_by_source(&feeds);
    assert!(out.len() <= TOP_SOURCES);

    let total: usize = out.iter().map(|s| s.count).sum();
    assert_eq!(total, feeds.len());

    for pair in out.windows(2) {
        assert!(pair[0].count >= pair[1].count, "counts must descend");
    }

    assert_eq!(out[0].name, "alpha");
    assert_eq!(out[0].count, 3);
    assert!(out.iter().any(|s| s.name == "unknown" && s.count == 2));
}

#[test]
fn source_counts_fold_duplicate_spellings() {
    let feeds = vec![
        feed_with_source(Some("ThreatPost")),
        feed_with_source(Some("threatpost")),
        feed_with_source(Some("CSO")),
    ];
    let out = aggregate::group_by_source(&feeds);
    assert_eq!(out.len(), 2);
    assert_eq!((out[0].name.as_str(), out[0].count), ("threatpost", 2));
    assert_eq!((out[1].name.as_str(), out[1].count), ("cso", 1));
}

#[test]
fn group_by_source_bounded_for_many_distinct_sources() {
    let feeds: Vec<FeedItem> = (0..50)
        .map(|i| feed_with_source(Some(&format!("source-{i}"))))
        .collect();
    assert_eq!(aggregate::group_by_source(&feeds).len(), TOP_SOURCES);
}

#[test]
fn heatmap_always_has_the_four_known_types_in_order() {
    let inputs: Vec<Vec<Ioc>> = vec![
        vec![],
        vec![ioc_with_type(None)],
        vec![ioc_with_type(Some("HASH")), ioc_with_type(Some("weird"))],
        (0..30).map(|_| ioc_with_type(Some("domain"))).collect(),
    ];
    for iocs in &inputs {
        let out = aggregate::calc_ioc_heatmap(iocs);
        let names: Vec<&str> = out.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["domain", "ip", "cve", "hash"]);
    }
}

#[test]
fn heatmap_counts_mixed_case_types() {
    let iocs = vec![
        ioc_with_type(Some("IP")),
        ioc_with_type(Some("ip")),
        ioc_with_type(Some("CVE")),
    ];
    let out = aggregate::calc_ioc_heatmap(&iocs);
    let counts: Vec<usize> = out.iter().map(|e| e.count).collect();
    assert_eq!(counts, vec![0, 2, 1, 0]);
}

#[test]
fn timeline_is_bounded_strictly_descending_and_duplicate_free() {
    let now = Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap();
    // 25 distinct days, two items each, plus malformed stragglers.
    let mut feeds = Vec::new();
    for d in 1..=25 {
        for _ in 0..2 {
            feeds.push(FeedItem {
                published_at: Some(format!("2025-05-{d:02}T10:30:00Z")),
                ..FeedItem::default()
            });
        }
    }
    feeds.push(FeedItem {
        published_at: Some("garbage".into()),
        ..FeedItem::default()
    });

    let out = aggregate::group_by_date(&feeds, now);
    assert!(out.len() <= TIMELINE_DAYS);
    for pair in out.windows(2) {
        assert!(pair[0].date > pair[1].date, "dates must strictly descend");
    }
    // The malformed timestamp bucketed under `now`, which is the most
    // recent day in the input.
    assert_eq!(out[0].date, "2025-07-01");
    assert_eq!(out[0].count, 1);
}

#[test]
fn timeline_timezone_offsets_collapse_to_utc_days() {
    let now = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
    // 23:30-05:00 is 04:30 UTC the next day.
    let feeds = vec![FeedItem {
        published_at: Some("2025-06-10T23:30:00-05:00".into()),
        ..FeedItem::default()
    }];
    let out = aggregate::group_by_date(&feeds, now);
    assert_eq!(out[0].date, "2025-06-11");
}

#[test]
fn topics_are_bounded_and_exclude_stopwords() {
    let feeds: Vec<FeedItem> = (0..20)
        .map(|i| FeedItem {
            title: Some(format!(
                "Security attack report: phishing wave {i} targets banking credentials"
            )),
            description: Some("Large phishing campaign observed".into()),
            ..FeedItem::default()
        })
        .collect();
    let out = aggregate::build_topic_list(&feeds);
    assert!(out.len() <= TOP_TOPICS);
    assert_eq!(out[0].topic, "phishing");
    assert!(out.iter().all(|t| t.topic != "security" && t.topic != "attack"));
    assert!(out.iter().all(|t| t.topic.chars().count() >= 6));
}

#[test]
fn high_risk_is_bounded_and_order_preserving() {
    let mk = |level: Option<&str>, title: &str| FeedItem {
        title: Some(title.into()),
        risk: level.map(|l| RiskAnnotation {
            level: Some(l.into()),
            score: None,
            sentiment: None,
        }),
        ..FeedItem::default()
    };
    let feeds = vec![
        mk(Some("High"), "one"),
        mk(None, "skipped"),
        mk(Some("Critical"), "two"),
        mk(Some("Low"), "skipped"),
        mk(Some("High"), "three"),
        mk(Some("Critical"), "four"),
        mk(Some("High"), "five"),
    ];
    let out = aggregate::extract_high_risk_headlines(&feeds);
    assert_eq!(out.len(), HIGH_RISK_HEADLINES);
    let titles: Vec<&str> = out
        .iter()
        .map(|f| f.title.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(titles, vec!["one", "two", "three", "four"]);
}

#[test]
fn engine_is_total_over_garbage_records() {
    let feeds = vec![FeedItem::default(); 10];
    let iocs = vec![Ioc::default(); 10];
    let now = Utc::now();

    // None of these may panic on fully-empty records.
    let _ = aggregate::group_by_source(&feeds);
    let _ = aggregate::group_by_date(&feeds, now);
    let _ = aggregate::build_topic_list(&feeds);
    let _ = aggregate::extract_high_risk_headlines(&feeds);
    let _ = aggregate::calc_ioc_heatmap(&iocs);
    let summary = aggregate::summarise_iocs(&iocs);
    assert_eq!(summary.ip + summary.domain + summary.cve, 0);
}
