// src/aggregate.rs
//! # Aggregation Engine
//! Pure, testable reductions that map a raw feed/IOC collection into the
//! bounded summary views the dashboard renders. No I/O, no mutable state;
//! deterministic given the same input.
//!
//! Every function is total over malformed records: a missing source becomes
//! `"unknown"`, an unparseable timestamp falls back to the caller-supplied
//! `now`, an unrecognized IOC type buckets to `other`. Callers pass `now`
//! explicitly so the date-dependent views stay reproducible in tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::types::{FeedItem, Ioc, IocType, ResultsPayload};

/// Upper bound on the top-sources view.
pub const TOP_SOURCES: usize = 8;
/// Upper bound on timeline buckets (most recent days that actually appear).
pub const TIMELINE_DAYS: usize = 10;
/// Upper bound on the trending-topics view.
pub const TOP_TOPICS: usize = 6;
/// Upper bound on the high-risk headline strip.
pub const HIGH_RISK_HEADLINES: usize = 4;
/// Tokens shorter than this never become topics.
const MIN_TOPIC_LEN: usize = 6;

/// Fixed display order of the IOC heatmap; `other` is intentionally absent.
const HEATMAP_TYPES: [IocType; 4] = [IocType::Domain, IocType::Ip, IocType::Cve, IocType::Hash];

/// Domain-generic nouns that would otherwise dominate every topic list.
/// Implementation constant, not user-configurable.
static TOPIC_STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "security",
        "attack",
        "attacks",
        "attacker",
        "attackers",
        "report",
        "reports",
        "threat",
        "threats",
        "hacker",
        "hackers",
        "hacking",
        "malware",
        "breach",
        "breaches",
        "exploit",
        "exploits",
        "vulnerability",
        "vulnerabilities",
        "research",
        "researchers",
        "company",
        "companies",
        "target",
        "targets",
        "targeted",
        "system",
        "systems",
        "software",
        "network",
        "networks",
        "device",
        "devices",
        "update",
        "updates",
        "warning",
        "online",
        "million",
        "incident",
        "campaign",
        "cybersecurity",
        "against",
        "between",
        "through",
        "because",
        "without",
        "should",
        "could",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineBucket {
    /// UTC calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IocHeatmapEntry {
    pub name: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

/// Narrow IOC tally for the stat tiles; see [`summarise_iocs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IocSummary {
    pub ip: usize,
    pub domain: usize,
    pub cve: usize,
}

/// All six reductions for one results payload, recomputed on demand and
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateView {
    pub top_sources: Vec<SourceCount>,
    pub timeline: Vec<TimelineBucket>,
    pub ioc_heatmap: Vec<IocHeatmapEntry>,
    pub topics: Vec<TopicCount>,
    pub high_risk: Vec<FeedItem>,
    pub ioc_summary: IocSummary,
}

impl AggregateView {
    pub fn from_payload(payload: &ResultsPayload, now: DateTime<Utc>) -> Self {
        Self {
            top_sources: group_by_source(&payload.feeds),
            timeline: group_by_date(&payload.feeds, now),
            ioc_heatmap: calc_ioc_heatmap(&payload.iocs),
            topics: build_topic_list(&payload.feeds),
            high_risk: extract_high_risk_headlines(&payload.feeds),
            ioc_summary: summarise_iocs(&payload.iocs),
        }
    }
}

/// Top sources by item count, at most [`TOP_SOURCES`] entries.
///
/// Source names are lower-cased; missing/blank sources count under
/// `"unknown"`. The sort is stable, so ties keep first-seen order.
pub fn group_by_source(feeds: &[FeedItem]) -> Vec<SourceCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for item in feeds {
        let key = item
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "unknown".to_string());
        let slot = counts.entry(key.clone()).or_insert(0);
        if *slot == 0 {
            order.push(key);
        }
        *slot += 1;
    }

    let mut out: Vec<SourceCount> = order
        .into_iter()
        .map(|name| {
            let count = counts[&name];
            SourceCount { name, count }
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(TOP_SOURCES);
    out
}

/// Activity timeline: items bucketed per UTC calendar day, most recent
/// first, at most [`TIMELINE_DAYS`] buckets. Days with zero items produce
/// no bucket.
///
/// Bucket key falls back `published_at` → `fetched_at` → `now`.
pub fn group_by_date(feeds: &[FeedItem], now: DateTime<Utc>) -> Vec<TimelineBucket> {
    // BTreeMap keys sort ascending; for YYYY-MM-DD lexicographic order is
    // chronological order, so the reverse walk yields most-recent-first.
    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();

    for item in feeds {
        let day = item
            .published_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| item.fetched_at.as_deref().and_then(parse_timestamp))
            .unwrap_or(now)
            .format("%Y-%m-%d")
            .to_string();
        *buckets.entry(day).or_insert(0) += 1;
    }

    buckets
        .into_iter()
        .rev()
        .take(TIMELINE_DAYS)
        .map(|(date, count)| TimelineBucket { date, count })
        .collect()
}

/// IOC-type heatmap over the four known categories, in fixed order.
///
/// Always exactly four entries, zero-filled. Entries typed `other` (or
/// unrecognized) are excluded, so the totals need not equal the input size.
pub fn calc_ioc_heatmap(iocs: &[Ioc]) -> Vec<IocHeatmapEntry> {
    let mut counts: HashMap<IocType, usize> = HashMap::new();
    for ioc in iocs {
        *counts
            .entry(IocType::from_raw(ioc.kind.as_deref()))
            .or_insert(0) += 1;
    }

    HEATMAP_TYPES
        .iter()
        .map(|t| IocHeatmapEntry {
            name: t.name(),
            count: counts.get(t).copied().unwrap_or(0),
        })
        .collect()
}

/// Trending topics: token frequency over title + description, at most
/// [`TOP_TOPICS`] entries, stable-sorted by count descending.
pub fn build_topic_list(feeds: &[FeedItem]) -> Vec<TopicCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for item in feeds {
        let text = format!(
            "{} {}",
            item.title.as_deref().unwrap_or(""),
            item.description.as_deref().unwrap_or("")
        );
        for token in tokenize(&normalize_text(&text)) {
            if token.chars().count() < MIN_TOPIC_LEN || TOPIC_STOPWORDS.contains(token.as_str()) {
                continue;
            }
            let slot = counts.entry(token.clone()).or_insert(0);
            if *slot == 0 {
                order.push(token);
            }
            *slot += 1;
        }
    }

    let mut out: Vec<TopicCount> = order
        .into_iter()
        .map(|topic| {
            let count = counts[&topic];
            TopicCount { topic, count }
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(TOP_TOPICS);
    out
}

/// Headlines whose risk level is exactly `"Critical"` or `"High"`, in input
/// order, at most [`HIGH_RISK_HEADLINES`] entries.
pub fn extract_high_risk_headlines(feeds: &[FeedItem]) -> Vec<FeedItem> {
    feeds
        .iter()
        .filter(|item| {
            matches!(
                item.risk.as_ref().and_then(|r| r.level.as_deref()),
                Some("Critical") | Some("High")
            )
        })
        .take(HIGH_RISK_HEADLINES)
        .cloned()
        .collect()
}

/// IP/domain/CVE counts for the stat tiles.
///
/// Deliberately narrower than [`calc_ioc_heatmap`]: hashes and `other`
/// indicators are not accumulated anywhere here, so the two views are not
/// interchangeable.
pub fn summarise_iocs(iocs: &[Ioc]) -> IocSummary {
    let mut summary = IocSummary::default();
    for ioc in iocs {
        match IocType::from_raw(ioc.kind.as_deref()) {
            IocType::Ip => summary.ip += 1,
            IocType::Domain => summary.domain += 1,
            IocType::Cve => summary.cve += 1,
            IocType::Hash | IocType::Other => {}
        }
    }
    summary
}

/// Normalize feed text before tokenization: decode HTML entities, strip
/// tags, collapse whitespace. RSS descriptions routinely embed markup.
fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Alphanumeric tokens, lower-cased; everything else is a separator.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Lenient timestamp parsing for loosely-typed feed records.
/// Accepts RFC 3339, RFC 2822, naive datetimes and bare dates; anything
/// else is treated as absent.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    None
}
