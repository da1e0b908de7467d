use crate::error::AiError;
use crate::gateway::{AiGateway, ExpectJson};
use crate::judges::Judge;
use crate::parse;
use crate::rubric::{self, Category, CategoryScores, TOTAL_POINTS};
use crate::scenario::Scenario;
use crate::session::Recording;
use futures::future::join_all;
use roleplay_types::{ChatMessage, ContentPart};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Instruction included in every judging prompt.
pub const LITERAL_RULE: &str = "IMPORTANT: Evaluate ONLY the literal transcript and audio content provided. \
Never invent or assume content the participant did not actually say. \
If the transcript is sparse, empty or off-topic, score exactly what is there and say so in the feedback.";

const OUTPUT_SCHEMA: &str = r#"{
    "scores": { "understanding": 0, "alternatives": 0, "solution": 0, "knowledge": 0, "organization": 0, "delivery": 0, "questions": 0 },
    "total": 0,
    "categoryFeedback": { "understanding": "...", "alternatives": "...", "solution": "...", "knowledge": "...", "organization": "...", "delivery": "...", "questions": "..." },
    "overallFeedback": "2-3 sentences.",
    "strengthHighlight": "1 phrase",
    "improvementArea": "1 phrase",
    "personalizedFeedback": "1 sentence in character.",
    "actionableTips": ["Tip 1", "Tip 2"]
}"#;

const ERROR_FEEDBACK: &str = "Error processing evaluation.";
const FALLBACK_POINTS: u32 = 5;

/// One judge's scored evaluation of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub scores: CategoryScores,
    pub total: u32,
    /// Whether the model supplied the total itself rather than it being summed here.
    #[serde(skip)]
    pub total_supplied: bool,
    pub category_feedback: BTreeMap<Category, String>,
    pub overall_feedback: String,
    pub strength_highlight: String,
    pub improvement_area: String,
    pub personalized_feedback: String,
    pub actionable_tips: Vec<String>,
}

impl Evaluation {
    /// Reads an evaluation from model JSON, clamping every score to its bound.
    ///
    /// A missing or zero total is replaced by the sum of the category scores.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "evaluation is not a JSON object".to_string())?;
        let raw_scores = object
            .get("scores")
            .and_then(Value::as_object)
            .ok_or_else(|| "evaluation has no scores".to_string())?;

        let mut scores = CategoryScores::default();
        for category in Category::ALL {
            let points = raw_scores
                .get(category.key())
                .and_then(parse::number)
                .map(clamp_points)
                .unwrap_or(0);
            scores.set(category, points);
        }

        let supplied = object
            .get("total")
            .and_then(parse::number)
            .map(clamp_points)
            .filter(|total| *total > 0);
        let total = supplied.unwrap_or_else(|| scores.sum()).min(TOTAL_POINTS);

        let category_feedback = object
            .get("categoryFeedback")
            .and_then(Value::as_object)
            .map(|feedback| {
                Category::ALL
                    .into_iter()
                    .filter_map(|category| {
                        feedback
                            .get(category.key())
                            .and_then(Value::as_str)
                            .map(|text| (category, text.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            scores,
            total,
            total_supplied: supplied.is_some(),
            category_feedback,
            overall_feedback: text("overallFeedback"),
            strength_highlight: text("strengthHighlight"),
            improvement_area: text("improvementArea"),
            personalized_feedback: text("personalizedFeedback"),
            actionable_tips: object
                .get("actionableTips")
                .map(parse::string_list)
                .unwrap_or_default(),
        })
    }
}

fn clamp_points(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value.round().min(TOTAL_POINTS as f64) as u32
    }
}

/// The placeholder evaluation shown for a judge whose call failed.
pub fn fallback_evaluation() -> Evaluation {
    let scores = CategoryScores::uniform(FALLBACK_POINTS);
    Evaluation {
        total: scores.sum(),
        scores,
        total_supplied: false,
        category_feedback: Category::ALL
            .into_iter()
            .map(|category| (category, ERROR_FEEDBACK.to_string()))
            .collect(),
        overall_feedback:
            "The AI judge encountered an error processing your audio. Please try again.".to_string(),
        strength_highlight: "N/A".to_string(),
        improvement_area: "N/A".to_string(),
        personalized_feedback: "I'm sorry, I couldn't process your presentation.".to_string(),
        actionable_tips: vec![
            "Try a shorter recording".to_string(),
            "Check internet connection".to_string(),
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeFailure {
    pub message: String,
    pub status: Option<u16>,
    pub code: String,
    pub fallback: Evaluation,
}

impl JudgeFailure {
    pub fn new(message: impl Into<String>, status: Option<u16>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            code: code.into(),
            fallback: fallback_evaluation(),
        }
    }

    fn malformed(message: impl Into<String>) -> Self {
        Self::new(message, None, "malformed_response")
    }
}

impl From<AiError> for JudgeFailure {
    fn from(err: AiError) -> Self {
        Self::new(err.to_string(), err.status(), err.code())
    }
}

/// The outcome for one judge slot: a real evaluation or an isolated failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum JudgeResult {
    Scored(Evaluation),
    Failed(JudgeFailure),
}

impl JudgeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JudgeResult::Scored(_))
    }

    /// The evaluation to display: the real one, or the fallback of a failure.
    pub fn evaluation(&self) -> &Evaluation {
        match self {
            JudgeResult::Scored(evaluation) => evaluation,
            JudgeResult::Failed(failure) => &failure.fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgingMode {
    /// One call evaluating every judge at once.
    #[default]
    Panel,
    /// One independent call per judge.
    Parallel,
}

/// What the judges get to see.
#[derive(Debug, Clone, Copy)]
pub struct JudgingContext<'a> {
    pub event_title: &'a str,
    pub scenario: &'a Scenario,
    pub questions: &'a [String],
    pub presentation: &'a Recording,
    pub answers: &'a Recording,
    pub include_audio: bool,
}

impl JudgingContext<'_> {
    fn user_message(&self) -> ChatMessage {
        let text = format!(
            "SCENARIO:\n{}\n\nQ&A QUESTIONS ASKED:\n{}\n\nMAIN PRESENTATION (TRANSCRIPT):\n{}\n\nQ&A RESPONSE (TRANSCRIPT):\n{}\n\n{}",
            self.scenario.text(),
            self.questions
                .iter()
                .enumerate()
                .map(|(i, q)| format!("{}. {}", i + 1, q))
                .collect::<Vec<_>>()
                .join("\n"),
            transcript_or_placeholder(self.presentation),
            transcript_or_placeholder(self.answers),
            if self.include_audio {
                "NOTE: Audio of the presentation and the answers is attached when it was recorded."
            } else {
                "NOTE: No audio is attached; judge delivery from the transcript only."
            },
        );

        let mut parts = vec![ContentPart::text(&text)];
        if self.include_audio {
            parts.extend(
                [self.presentation, self.answers]
                    .into_iter()
                    .filter_map(|recording| recording.audio.as_ref())
                    .filter(|audio| !audio.is_empty())
                    .map(|audio| audio.to_content_part()),
            );
        }
        ChatMessage::user_parts(parts)
    }
}

fn transcript_or_placeholder(recording: &Recording) -> &str {
    if !recording.has_transcript() {
        "(No transcript captured)"
    } else {
        recording.transcript.trim()
    }
}

fn judge_prompt(judge: &Judge, event_title: &str) -> String {
    format!(
        "You are {name}, {title}.\n\
BACKGROUND: {background}\n\
PERSONALITY: {voice}\n\
TASK: Judge a {event_title} role play from the transcripts and any audio provided.\n\n\
{LITERAL_RULE}\n\n\
{rubric}\n\
OUTPUT JSON:\n{OUTPUT_SCHEMA}",
        name = judge.name,
        title = judge.title,
        background = judge.background,
        voice = judge.voice,
        rubric = rubric::rubric_prompt(),
    )
}

fn panel_prompt(judges: &[Judge], event_title: &str) -> String {
    let roster = judges
        .iter()
        .enumerate()
        .map(|(i, judge)| {
            format!(
                "- judgeIndex {i}: {}, {}. {} {}",
                judge.name, judge.title, judge.background, judge.voice
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a panel of {count} judges scoring a {event_title} role play. \
Each judge evaluates independently, in character.\n\n\
JUDGES:\n{roster}\n\n\
{LITERAL_RULE}\n\n\
{rubric}\n\
OUTPUT JSON: an object {{\"evaluations\": [...]}} with one entry per judge. \
Each entry has \"judgeIndex\" plus these fields:\n{OUTPUT_SCHEMA}",
        count = judges.len(),
        rubric = rubric::rubric_prompt(),
    )
}

#[derive(Debug, Clone, Default)]
pub struct JudgingPipeline {
    mode: JudgingMode,
}

impl JudgingPipeline {
    pub fn new(mode: JudgingMode) -> Self {
        Self { mode }
    }

    /// Produces exactly one result per judge, in judge order.
    pub async fn evaluate(
        &self,
        gateway: &dyn AiGateway,
        ctx: &JudgingContext<'_>,
        judges: &[Judge],
    ) -> Vec<JudgeResult> {
        if self.mode == JudgingMode::Panel {
            match self.evaluate_panel(gateway, ctx, judges).await {
                Ok(results) => return results,
                Err(reason) => {
                    tracing::warn!(%reason, "panel judging failed, evaluating judges individually")
                }
            }
        }
        self.evaluate_parallel(gateway, ctx, judges).await
    }

    pub async fn evaluate_parallel(
        &self,
        gateway: &dyn AiGateway,
        ctx: &JudgingContext<'_>,
        judges: &[Judge],
    ) -> Vec<JudgeResult> {
        join_all(
            judges
                .iter()
                .enumerate()
                .map(|(index, judge)| self.evaluate_judge(gateway, ctx, judge, index)),
        )
        .await
    }

    /// Runs one judge on its own. Used for fan-out and for retrying a single slot.
    pub async fn evaluate_judge(
        &self,
        gateway: &dyn AiGateway,
        ctx: &JudgingContext<'_>,
        judge: &Judge,
        index: usize,
    ) -> JudgeResult {
        let messages = vec![
            ChatMessage::system(&judge_prompt(judge, ctx.event_title)),
            ctx.user_message(),
        ];
        let outcome = match gateway.call_ai(messages, ExpectJson::Object).await {
            Ok(text) => parse::extract_json(&text)
                .ok_or_else(|| JudgeFailure::malformed("judge response was not JSON"))
                .and_then(|value| Evaluation::from_value(&value).map_err(JudgeFailure::malformed)),
            Err(err) => Err(JudgeFailure::from(err)),
        };

        match outcome {
            Ok(evaluation) => {
                tracing::info!(index, judge = judge.name, total = evaluation.total, "judge scored");
                JudgeResult::Scored(evaluation)
            }
            Err(failure) => {
                tracing::warn!(index, judge = judge.name, error = %failure.message, code = %failure.code, "judge failed");
                JudgeResult::Failed(failure)
            }
        }
    }

    /// Evaluates every judge in a single call.
    ///
    /// Returns `Err` when the call fails or the answer holds no evaluation
    /// list. A missing or unreadable entry only fails its own slot.
    pub async fn evaluate_panel(
        &self,
        gateway: &dyn AiGateway,
        ctx: &JudgingContext<'_>,
        judges: &[Judge],
    ) -> Result<Vec<JudgeResult>, String> {
        let messages = vec![
            ChatMessage::system(&panel_prompt(judges, ctx.event_title)),
            ctx.user_message(),
        ];
        let text = gateway
            .call_ai(messages, ExpectJson::Object)
            .await
            .map_err(|err| err.to_string())?;
        let value = parse::extract_json(&text).ok_or("panel response was not JSON")?;
        let entries = match &value {
            Value::Array(entries) => entries,
            Value::Object(map) => map
                .get("evaluations")
                .and_then(Value::as_array)
                .ok_or("panel response has no evaluations list")?,
            _ => return Err("panel response has no evaluations list".to_string()),
        };

        let indices: Vec<Option<usize>> = entries
            .iter()
            .map(|entry| {
                entry
                    .get("judgeIndex")
                    .and_then(parse::number)
                    .filter(|n| *n >= 0.0)
                    .map(|n| n as usize)
            })
            .collect();
        // Judges numbered from 1 show up as an index equal to the panel size with none at 0.
        let one_based = indices.iter().flatten().any(|&i| i == judges.len())
            && !indices.iter().flatten().any(|&i| i == 0);
        if one_based {
            tracing::debug!("panel numbered its judges from 1");
        }
        let offset = usize::from(one_based);

        let mut slots: Vec<Option<JudgeResult>> = vec![None; judges.len()];
        for (position, (entry, index)) in entries.iter().zip(indices).enumerate() {
            let index = index.map(|i| i - offset).unwrap_or(position);
            let Some(slot) = slots.get_mut(index) else {
                tracing::debug!(index, "ignoring panel entry for unknown judge");
                continue;
            };
            if slot.is_some() {
                continue;
            }
            *slot = Some(match Evaluation::from_value(entry) {
                Ok(evaluation) => JudgeResult::Scored(evaluation),
                Err(reason) => JudgeResult::Failed(JudgeFailure::malformed(reason)),
            });
        }

        Ok(slots
            .into_iter()
            .zip(judges)
            .enumerate()
            .map(|(index, (slot, judge))| {
                slot.unwrap_or_else(|| {
                    tracing::warn!(index, judge = judge.name, "panel response missing judge");
                    JudgeResult::Failed(JudgeFailure::new(
                        "panel response had no evaluation for this judge",
                        None,
                        "missing_evaluation",
                    ))
                })
            })
            .collect())
    }
}

/// The session score: mean of the successful judges' totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub score: u32,
    /// False when no judge succeeded; `score` is then 0 and carries no meaning.
    pub available: bool,
    pub succeeded: usize,
    pub failed: usize,
}

impl Aggregate {
    pub fn from_results(results: &[JudgeResult]) -> Self {
        let totals: Vec<u32> = results
            .iter()
            .filter_map(|result| match result {
                JudgeResult::Scored(evaluation) => Some(evaluation.total),
                JudgeResult::Failed(_) => None,
            })
            .collect();
        let succeeded = totals.len();
        Self {
            score: rounded_mean(&totals).unwrap_or(0),
            available: succeeded > 0,
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }

    pub fn display(&self) -> String {
        match (self.available, self.is_partial()) {
            (false, _) => "unavailable".to_string(),
            (true, true) => format!("{}*", self.score),
            (true, false) => self.score.to_string(),
        }
    }
}

fn rounded_mean(values: &[u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    let sum: u32 = values.iter().sum();
    Some((sum as f64 / values.len() as f64).round() as u32)
}

/// Per-category averages over successful judges. Zero scores are left out and
/// a category nobody scored is omitted.
pub fn category_averages(results: &[JudgeResult]) -> BTreeMap<Category, u32> {
    Category::ALL
        .into_iter()
        .filter_map(|category| {
            let scored: Vec<u32> = results
                .iter()
                .filter(|result| result.is_success())
                .map(|result| result.evaluation().scores.get(category))
                .filter(|points| *points > 0)
                .collect();
            rounded_mean(&scored).map(|mean| (category, mean))
        })
        .collect()
}

/// Everything the results screen shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsView {
    pub judges: Vec<Judge>,
    pub results: Vec<JudgeResult>,
    pub aggregate: Aggregate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioArtifact, AudioFormat};
    use crate::gateway::MockAiGateway;
    use crate::judges::JUDGE_POOL;
    use crate::scenario::ScenarioParams;
    use serde_json::json;

    fn scenario() -> Scenario {
        Scenario::new(
            "A furniture maker expands to Poland.".to_string(),
            ScenarioParams {
                company_type: "furniture maker",
                country_candidates: vec!["Poland"],
            },
        )
    }

    fn judges() -> Vec<Judge> {
        JUDGE_POOL[..3].to_vec()
    }

    fn evaluation_json(points: u32) -> Value {
        json!({
            "scores": {
                "understanding": points, "alternatives": points, "solution": points,
                "knowledge": points, "organization": points, "delivery": points, "questions": points
            },
            "overallFeedback": "Solid.",
            "actionableTips": ["Slow down"]
        })
    }

    fn recording(transcript: &str) -> Recording {
        Recording {
            transcript: transcript.to_string(),
            ..Recording::default()
        }
    }

    #[test]
    fn missing_total_defaults_to_sum() {
        let evaluation = Evaluation::from_value(&evaluation_json(8)).unwrap();
        assert_eq!(evaluation.total, 56);
        assert_eq!(evaluation.total, evaluation.scores.sum());
        assert!(!evaluation.total_supplied);
        assert_eq!(evaluation.actionable_tips, vec!["Slow down"]);
    }

    #[test]
    fn scores_and_totals_are_clamped() {
        let value = json!({
            "scores": { "understanding": 42, "alternatives": "15", "delivery": -3 },
            "total": 250
        });
        let evaluation = Evaluation::from_value(&value).unwrap();
        assert_eq!(evaluation.scores.get(Category::Understanding), 10);
        assert_eq!(evaluation.scores.get(Category::Alternatives), 15);
        assert_eq!(evaluation.scores.get(Category::Delivery), 0);
        assert_eq!(evaluation.total, 100);
        assert!(evaluation.total_supplied);
    }

    #[test]
    fn evaluation_without_scores_is_rejected() {
        assert!(Evaluation::from_value(&json!({"total": 50})).is_err());
        assert!(Evaluation::from_value(&json!("85")).is_err());
    }

    #[test]
    fn fallback_scores_total_thirty_five() {
        let fallback = fallback_evaluation();
        assert_eq!(fallback.total, 35);
        assert_eq!(fallback.scores.sum(), 35);
        assert!(fallback.category_feedback.values().all(|f| f == ERROR_FEEDBACK));
        assert_eq!(fallback.category_feedback.len(), 7);
    }

    #[test]
    fn aggregate_only_counts_successes() {
        let results = vec![
            JudgeResult::Scored(Evaluation::from_value(&json!({"scores": {}, "total": 80})).unwrap()),
            JudgeResult::Failed(JudgeFailure::new("boom", Some(500), "upstream_error")),
            JudgeResult::Scored(Evaluation::from_value(&json!({"scores": {}, "total": 71})).unwrap()),
        ];
        let aggregate = Aggregate::from_results(&results);
        assert_eq!(aggregate.score, 76);
        assert_eq!((aggregate.succeeded, aggregate.failed), (2, 1));
        assert_eq!(aggregate.display(), "76*");

        let none = Aggregate::from_results(&results[1..2]);
        assert!(!none.available);
        assert_eq!(none.score, 0);
        assert_eq!(none.display(), "unavailable");
    }

    #[test]
    fn category_averages_skip_failures_and_zeros() {
        let mut low = evaluation_json(4);
        low["scores"]["questions"] = json!(0);
        let results = vec![
            JudgeResult::Scored(Evaluation::from_value(&evaluation_json(8)).unwrap()),
            JudgeResult::Scored(Evaluation::from_value(&low).unwrap()),
            JudgeResult::Failed(JudgeFailure::new("boom", None, "malformed_response")),
        ];
        let averages = category_averages(&results);
        assert_eq!(averages[&Category::Understanding], 6);
        assert_eq!(averages[&Category::Questions], 8);
    }

    #[tokio::test]
    async fn parallel_failure_is_isolated_to_its_slot() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_call_ai().returning(|messages, expect| {
            assert_eq!(expect, ExpectJson::Object);
            let system = messages[0].text();
            assert!(system.contains(LITERAL_RULE));
            if system.contains(JUDGE_POOL[1].name) {
                Err(AiError::Upstream {
                    status: Some(500),
                    details: "internal".to_string(),
                })
            } else {
                Ok(evaluation_json(10).to_string())
            }
        });

        let (presentation, answers) = (recording("We will export."), recording(""));
        let questions = vec!["Why Poland?".to_string()];
        let scenario = scenario();
        let ctx = JudgingContext {
            event_title: "International Business",
            scenario: &scenario,
            questions: &questions,
            presentation: &presentation,
            answers: &answers,
            include_audio: false,
        };
        let results = JudgingPipeline::new(JudgingMode::Parallel)
            .evaluate(&gateway, &ctx, &judges())
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(results[2].is_success());
        match &results[1] {
            JudgeResult::Failed(failure) => {
                assert_eq!(failure.status, Some(500));
                assert_eq!(failure.code, "upstream_error");
                assert_eq!(failure.fallback.total, 35);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(Aggregate::from_results(&results).score, 70);
    }

    #[tokio::test]
    async fn panel_maps_entries_by_judge_index() {
        let mut gateway = MockAiGateway::new();
        gateway
            .expect_call_ai()
            .withf(|messages, _| messages[0].text().contains("panel of 3"))
            .times(1)
            .returning(|_, _| {
                let mut second = evaluation_json(5);
                second["judgeIndex"] = json!(2);
                let mut first = evaluation_json(10);
                first["judgeIndex"] = json!(0);
                Ok(json!({ "evaluations": [second, first] }).to_string())
            });

        let (presentation, answers) = (recording("text"), recording("answers"));
        let scenario = scenario();
        let ctx = JudgingContext {
            event_title: "International Business",
            scenario: &scenario,
            questions: &[],
            presentation: &presentation,
            answers: &answers,
            include_audio: false,
        };
        let results = JudgingPipeline::new(JudgingMode::Panel)
            .evaluate(&gateway, &ctx, &judges())
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].evaluation().total, 70);
        assert!(!results[1].is_success());
        assert_eq!(results[2].evaluation().total, 35);
        assert!(results[2].is_success());
    }

    #[test]
    fn blank_transcripts_are_marked_as_missing() {
        let (presentation, answers) = (recording("We pick a joint venture."), recording("  \n "));
        let scenario = scenario();
        let ctx = JudgingContext {
            event_title: "International Business",
            scenario: &scenario,
            questions: &[],
            presentation: &presentation,
            answers: &answers,
            include_audio: false,
        };
        let text = ctx.user_message().text();
        assert!(text.contains("We pick a joint venture."));
        assert_eq!(text.matches("(No transcript captured)").count(), 1);
    }

    #[tokio::test]
    async fn panel_numbering_from_one_is_shifted_back() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_call_ai().times(1).returning(|_, _| {
            let entries: Vec<Value> = [(3, 4), (1, 10), (2, 7)]
                .into_iter()
                .map(|(number, points)| {
                    let mut entry = evaluation_json(points);
                    entry["judgeIndex"] = json!(number);
                    entry
                })
                .collect();
            Ok(json!({ "evaluations": entries }).to_string())
        });

        let (presentation, answers) = (recording("text"), recording("answers"));
        let scenario = scenario();
        let ctx = JudgingContext {
            event_title: "International Business",
            scenario: &scenario,
            questions: &[],
            presentation: &presentation,
            answers: &answers,
            include_audio: false,
        };
        let results = JudgingPipeline::new(JudgingMode::Panel)
            .evaluate(&gateway, &ctx, &judges())
            .await;

        assert!(results.iter().all(JudgeResult::is_success));
        let totals: Vec<u32> = results.iter().map(|r| r.evaluation().total).collect();
        assert_eq!(totals, vec![70, 49, 28]);
    }

    #[tokio::test]
    async fn unreadable_panel_falls_back_to_individual_judges() {
        let mut gateway = MockAiGateway::new();
        gateway.expect_call_ai().returning(|messages, _| {
            if messages[0].text().contains("panel of") {
                Ok("The panel could not agree.".to_string())
            } else {
                Ok(evaluation_json(9).to_string())
            }
        });

        let (presentation, answers) = (recording("text"), recording(""));
        let scenario = scenario();
        let ctx = JudgingContext {
            event_title: "International Business",
            scenario: &scenario,
            questions: &[],
            presentation: &presentation,
            answers: &answers,
            include_audio: false,
        };
        let results = JudgingPipeline::default()
            .evaluate(&gateway, &ctx, &judges())
            .await;
        assert!(results.iter().all(JudgeResult::is_success));
        assert_eq!(Aggregate::from_results(&results).score, 63);
    }

    #[tokio::test]
    async fn audio_is_attached_only_when_enabled() {
        let mut gateway = MockAiGateway::new();
        gateway
            .expect_call_ai()
            .withf(|messages, _| messages[1].audio_part_count() == 2)
            .times(1)
            .returning(|_, _| Ok(evaluation_json(6).to_string()));

        let audio = AudioArtifact::new(vec![0; 8], AudioFormat::Wav);
        let presentation = Recording {
            audio: Some(audio.clone()),
            ..recording("text")
        };
        let answers = Recording {
            audio: Some(audio),
            ..recording("")
        };
        let scenario = scenario();
        let ctx = JudgingContext {
            event_title: "International Business",
            scenario: &scenario,
            questions: &[],
            presentation: &presentation,
            answers: &answers,
            include_audio: true,
        };
        let result = JudgingPipeline::new(JudgingMode::Parallel)
            .evaluate_judge(&gateway, &ctx, &JUDGE_POOL[0], 0)
            .await;
        assert_eq!(result.evaluation().total, 42);
    }
}
