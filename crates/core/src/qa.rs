use crate::audio::AudioArtifact;
use crate::error::SessionError;
use crate::gateway::{AiGateway, ExpectJson};
use crate::parse::{self, Parsed};
use crate::scenario::Scenario;
use crate::session::QaTiming;
use roleplay_types::{ChatMessage, ContentPart};

pub const DEFAULTS_BEFORE: [&str; 2] = [
    "How would you approach the challenges presented in this scenario?",
    "What key factors would influence your proposed solution?",
];

pub const DEFAULTS_AFTER: [&str; 2] = [
    "Could you elaborate on the implementation timeline?",
    "What specific resources are required for your plan?",
];

/// Exactly two follow-up questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaQuestions([String; 2]);

impl QaQuestions {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self([first.into(), second.into()])
    }

    pub fn defaults(timing: QaTiming) -> Self {
        let [first, second] = match timing {
            QaTiming::Before => DEFAULTS_BEFORE,
            QaTiming::After => DEFAULTS_AFTER,
        };
        Self::new(first, second)
    }

    /// Fits a model-provided list to exactly two questions, truncating extras
    /// or padding from the defaults. An empty list yields `None`.
    pub fn normalize(questions: Vec<String>, timing: QaTiming) -> Option<Self> {
        let mut questions = questions.into_iter();
        let first = questions.next()?;
        let second = questions
            .next()
            .unwrap_or_else(|| Self::defaults(timing).0[1].clone());
        Some(Self([first, second]))
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.to_vec()
    }
}

#[derive(Debug, Clone, Default)]
pub struct QaGenerator;

impl QaGenerator {
    /// Asks for two follow-up questions.
    ///
    /// `Before` uses the scenario alone; `After` adds the presentation
    /// transcript and audio. Unreadable answers fall back to defaults, while
    /// gateway failures are returned to the caller.
    pub async fn generate(
        &self,
        gateway: &dyn AiGateway,
        event_title: &str,
        scenario: &Scenario,
        timing: QaTiming,
        transcript: &str,
        audio: Option<&AudioArtifact>,
    ) -> Result<Parsed<QaQuestions>, SessionError> {
        let messages = match timing {
            QaTiming::Before => before_prompt(event_title, scenario),
            QaTiming::After => after_prompt(event_title, scenario, transcript, audio),
        };
        let response = gateway.call_ai(messages, ExpectJson::Array).await?;

        let questions = parse::extract_json(&response)
            .map(|value| parse::string_list(&value))
            .and_then(|list| QaQuestions::normalize(list, timing));
        Ok(match questions {
            Some(questions) => Parsed::Parsed(questions),
            None => {
                tracing::warn!(?timing, "could not read follow-up questions, using defaults");
                Parsed::Fallback(QaQuestions::defaults(timing))
            }
        })
    }
}

fn before_prompt(event_title: &str, scenario: &Scenario) -> Vec<ChatMessage> {
    let system = "You are a competition judge preparing questions about a role play scenario.\n\n\
DIFFICULTY LEVEL: Official competitive level (fair, realistic, probing).\n\n\
CRITICAL RULES:\n\
1. Generate exactly 2 follow-up questions based on the scenario\n\
2. Questions should test tradeoffs, risks, implementation details, and scenario-specific constraints\n\
3. Output ONLY a JSON array of questions, nothing else\n\n\
Example output format:\n\
[\"How would the proposed solution account for currency fluctuation risks?\", \"What specific timeline would be realistic for implementation?\"]";
    let user = format!(
        "Based on the following {event_title} role play scenario, generate exactly 2 follow-up questions that could be asked of a competitor:\n\nSCENARIO:\n{}\n",
        scenario.text()
    );
    vec![ChatMessage::system(system), ChatMessage::user(&user)]
}

fn after_prompt(
    event_title: &str,
    scenario: &Scenario,
    transcript: &str,
    audio: Option<&AudioArtifact>,
) -> Vec<ChatMessage> {
    let system = format!(
        "You are an expert competition judge. Your goal is to ask insightful, probing follow-up questions based on the participant's presentation.\n\n\
Event: {event_title}\n\n\
Read the participant's transcript (and listen to the audio if provided) and generate exactly 2 follow-up questions that \
challenge the proposed solution and address weak points or overlooked areas. \
Base them only on what was actually said; do not invent content the participant did not present.\n\n\
Return ONLY a JSON array of strings.\nExample: [\"Question 1?\", \"Question 2?\"]"
    );

    let transcript = transcript.trim();
    let mut text = format!(
        "SCENARIO:\n{}\n\nPARTICIPANT PRESENTATION (TRANSCRIPT):\n{}\n\n\
Generate 2 follow-up questions that reference what they said (tradeoffs, risks, implementation details).",
        scenario.text(),
        if transcript.is_empty() { "(No transcript captured)" } else { transcript },
    );
    let audio = audio.filter(|artifact| !artifact.is_empty());
    if audio.is_none() {
        text.push_str("\n\n(No audio was recorded. Generate questions based on the scenario.)");
    }

    let mut parts = vec![ContentPart::text(&text)];
    parts.extend(audio.map(AudioArtifact::to_content_part));
    vec![ChatMessage::system(&system), ChatMessage::user_parts(parts)]
}
