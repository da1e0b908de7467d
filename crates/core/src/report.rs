use crate::error::ReportError;
use crate::judging::{Aggregate, category_averages};
use crate::rubric::Category;
use crate::session::Session;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The summary persisted at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeReport {
    pub event: String,
    pub event_id: String,
    pub score: u32,
    pub score_available: bool,
    pub category_scores: BTreeMap<Category, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    pub judges_succeeded: usize,
    pub judges_failed: usize,
}

impl PracticeReport {
    pub fn from_session(session: &Session) -> Self {
        let Aggregate {
            score,
            available,
            succeeded,
            failed,
        } = session.aggregate();
        let (event, event_id) = session
            .event
            .as_ref()
            .map(|e| (e.title.clone(), e.id.clone()))
            .unwrap_or_else(|| ("Unknown".to_string(), String::new()));

        let transcript = [&session.main_recording, &session.qa_recording]
            .iter()
            .map(|recording| recording.transcript.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            event,
            event_id,
            score,
            score_available: available,
            category_scores: category_averages(&session.judge_results),
            transcript: (!transcript.is_empty()).then_some(transcript),
            judges_succeeded: succeeded,
            judges_failed: failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportAck {
    Saved,
    /// Nothing was stored, e.g. because there is no signed-in user.
    Skipped,
}

/// Persistence of finished sessions.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_report(&self, report: &PracticeReport) -> Result<ReportAck, ReportError>;
}

/// Source of the signed-in user's bearer token. `None` means signed out.
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    async fn auth_token(&self) -> Option<String>;
}

/// Saves the report in the background. Failures are logged and never surface.
pub fn spawn_save(store: Arc<dyn ReportStore>, report: PracticeReport) -> JoinHandle<()> {
    tokio::spawn(async move {
        match store.save_report(&report).await {
            Ok(ReportAck::Saved) => {
                tracing::info!(event = %report.event, score = report.score, "practice report saved")
            }
            Ok(ReportAck::Skipped) => tracing::debug!("practice report not saved, no signed in user"),
            Err(e) => tracing::error!(error = %e, "failed to save practice report"),
        }
    })
}
