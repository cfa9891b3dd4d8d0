// src/types.rs
//! Wire shapes shared by the aggregation engine, the API client and the
//! saved-briefings store.
//!
//! Feed and IOC records arrive from a loosely-typed backend: any field may
//! be missing, empty or malformed. Every input field is therefore modeled
//! as explicitly optional and deserialization must never fail on a record
//! that merely lacks data. Defaulting rules live with the consumers
//! (`aggregate`, `briefings`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One ingested news/report record.
///
/// `link` is the natural identity. Timestamps are kept as raw strings and
/// parsed leniently at aggregation time; the backend mixes RFC 3339 with
/// naive datetimes depending on the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub fetched_at: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub risk: Option<RiskAnnotation>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Optional risk enrichment attached to a feed item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAnnotation {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

/// A typed artifact extracted from feed content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ioc {
    /// Raw type label as sent by the backend; case-insensitive.
    /// Use [`IocType::from_raw`] for the normalized bucket.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub enrichment: Option<IocEnrichment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IocEnrichment {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub context: Vec<String>,
}

/// Normalized IOC bucket. Unknown or missing labels land in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IocType {
    Domain,
    Ip,
    Cve,
    Hash,
    Other,
}

impl IocType {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("domain") => IocType::Domain,
            Some("ip") => IocType::Ip,
            Some("cve") => IocType::Cve,
            Some("hash") => IocType::Hash,
            _ => IocType::Other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IocType::Domain => "domain",
            IocType::Ip => "ip",
            IocType::Cve => "cve",
            IocType::Hash => "hash",
            IocType::Other => "other",
        }
    }
}

/// Full payload returned by the aggregation backend's results endpoint.
///
/// Transport failures degrade to [`ResultsPayload::degraded`] so downstream
/// consumers always receive a well-formed (possibly empty) payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsPayload {
    #[serde(default)]
    pub feeds: Vec<FeedItem>,
    #[serde(default)]
    pub iocs: Vec<Ioc>,
    #[serde(default)]
    pub clusters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ResultsPayload {
    /// Empty-but-well-formed payload carrying a user-visible error message.
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// A user-curated bookmark of a feed item, identified by its link.
///
/// The authoritative copy lives server-side keyed by `(client_id, link)`;
/// locally the set is mirrored into a bounded cache keyed by `link` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBriefing {
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl SavedBriefing {
    /// Candidate briefing for an optimistic save, stamped with `now`.
    pub fn from_feed_item(item: &FeedItem, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            link: item.link.clone().unwrap_or_default(),
            title: item.title.clone().unwrap_or_default(),
            source: item.source.clone().unwrap_or_default(),
            image_url: item.image_url.clone().unwrap_or_default(),
            risk_level: item.risk.as_ref().and_then(|r| r.level.clone()),
            risk_score: item.risk.as_ref().and_then(|r| r.score),
            saved_at: Some(now.to_rfc3339()),
        }
    }
}
