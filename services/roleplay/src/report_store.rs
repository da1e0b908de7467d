use ai_gateway::ReportClient;
use async_trait::async_trait;
use roleplay_core::error::ReportError;
use roleplay_core::report::{AuthTokenProvider, PracticeReport, ReportAck, ReportStore};
use roleplay_core::rubric::Category;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

/// Posts reports to the backend for the signed in user. Signed out users are skipped.
pub struct BackendReportStore {
    client: ReportClient,
    tokens: Arc<dyn AuthTokenProvider>,
}

impl BackendReportStore {
    pub fn new(base_url: &str, tokens: Arc<dyn AuthTokenProvider>) -> Self {
        Self {
            client: ReportClient::new(base_url),
            tokens,
        }
    }
}

#[async_trait]
impl ReportStore for BackendReportStore {
    async fn save_report(&self, report: &PracticeReport) -> Result<ReportAck, ReportError> {
        let Some(token) = self.tokens.auth_token().await else {
            return Ok(ReportAck::Skipped);
        };
        self.client
            .submit(report, &token)
            .await
            .map_err(|e| ReportError::Store(e.to_string()))?;
        Ok(ReportAck::Saved)
    }
}

/// One line of the local history file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry<'a> {
    saved_at: u64,
    event: &'a str,
    event_id: &'a str,
    score: u32,
    score_available: bool,
    category_scores: &'a BTreeMap<Category, u32>,
    judges_failed: usize,
}

/// Appends a compact summary of each report to a JSON Lines file.
pub struct JsonlReportStore {
    path: PathBuf,
}

impl JsonlReportStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ReportStore for JsonlReportStore {
    async fn save_report(&self, report: &PracticeReport) -> Result<ReportAck, ReportError> {
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let entry = HistoryEntry {
            saved_at,
            event: &report.event,
            event_id: &report.event_id,
            score: report.score,
            score_available: report.score_available,
            category_scores: &report.category_scores,
            judges_failed: report.judges_failed,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        tracing::debug!(path = %self.path.display(), "appended practice report");
        Ok(ReportAck::Saved)
    }
}
