// src/client.rs
//! Boundary to the remote aggregation backend.
//!
//! The core consumes [`ApiClient`] as an abstract contract; the transport
//! lives entirely behind it. [`HttpApiClient`] is the production
//! implementation, a thin reqwest wrapper over the backend's REST surface.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::types::{ResultsPayload, SavedBriefing};

/// Insert request for a saved briefing. The server is authoritative for the
/// final stored shape; a duplicate link for the same client is an upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertSavedRequest {
    pub client_id: String,
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
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetch the aggregated results payload.
    ///
    /// Never fails: transport errors degrade to an empty payload carrying
    /// an `error` string, so the aggregation engine always receives valid
    /// input.
    async fn fetch_results(&self) -> ResultsPayload;

    /// List the saved briefings for a client, most-recent-first.
    async fn list_saved(&self, client_id: &str) -> Result<Vec<SavedBriefing>>;

    /// Upsert one saved briefing; returns the canonical stored entry.
    async fn insert_saved(&self, req: &InsertSavedRequest) -> Result<SavedBriefing>;

    /// Delete one saved briefing. Idempotent: deleting an absent entry is
    /// not an error.
    async fn delete_saved(&self, client_id: &str, link: &str) -> Result<()>;

    /// Fire-and-forget signal to the ingestion pipeline. Callers re-read
    /// results later; they never wait on pipeline completion.
    async fn trigger_live_fetch(&self) -> Result<()>;
}

#[derive(Debug, Default, Deserialize)]
struct SavedListResponse {
    #[serde(default)]
    items: Vec<SavedBriefing>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InsertSavedResponse {
    item: SavedBriefing,
}

/// REST client for the aggregation backend.
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn try_fetch_results(&self) -> Result<ResultsPayload> {
        let resp = self
            .http
            .get(self.url("/results"))
            .send()
            .await
            .context("fetch /results")?
            .error_for_status()
            .context("/results status")?;
        resp.json::<ResultsPayload>()
            .await
            .context("parse /results body")
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn fetch_results(&self) -> ResultsPayload {
        match self.try_fetch_results().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = ?e, "results fetch degraded to empty payload");
                ResultsPayload::degraded(e.to_string())
            }
        }
    }

    async fn list_saved(&self, client_id: &str) -> Result<Vec<SavedBriefing>> {
        let resp = self
            .http
            .get(self.url("/saved"))
            .query(&[("client_id", client_id)])
            .send()
            .await
            .context("fetch /saved")?
            .error_for_status()
            .context("/saved status")?;
        let body: SavedListResponse = resp.json().await.context("parse /saved body")?;
        if let Some(err) = body.error {
            bail!("saved list error: {err}");
        }
        Ok(body.items)
    }

    async fn insert_saved(&self, req: &InsertSavedRequest) -> Result<SavedBriefing> {
        let resp = self
            .http
            .post(self.url("/saved"))
            .json(req)
            .send()
            .await
            .context("insert saved briefing")?
            .error_for_status()
            .context("insert saved status")?;
        let body: InsertSavedResponse = resp.json().await.context("parse insert response")?;
        Ok(body.item)
    }

    async fn delete_saved(&self, client_id: &str, link: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url("/saved"))
            .query(&[("client_id", client_id), ("link", link)])
            .send()
            .await
            .context("delete saved briefing")?;
        // Absent entries delete cleanly.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        resp.error_for_status().context("delete saved status")?;
        Ok(())
    }

    async fn trigger_live_fetch(&self) -> Result<()> {
        self.http
            .post(self.url("/fetch_live"))
            .send()
            .await
            .context("trigger live fetch")?
            .error_for_status()
            .context("live fetch status")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let c = HttpApiClient::new("http://localhost:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(c.url("/results"), "http://localhost:8000/results");
    }

    #[test]
    fn insert_request_omits_absent_risk_fields() {
        let req = InsertSavedRequest {
            client_id: "c1".into(),
            link: "https://x/1".into(),
            title: "A".into(),
            source: "s".into(),
            image_url: String::new(),
            risk_level: None,
            risk_score: None,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("risk_level").is_none());
        assert!(v.get("risk_score").is_none());
        assert_eq!(v["link"], serde_json::json!("https://x/1"));
    }
}
