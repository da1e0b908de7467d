use crate::audio::AudioArtifact;
use crate::capture::RecordingTarget;
use crate::catalog::PracticeEvent;
use crate::judges::Judge;
use crate::judging::{Aggregate, JudgeResult, JudgingMode};
use crate::phase::Phase;
use crate::qa::QaQuestions;
use crate::scenario::Scenario;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Maximum number of characters kept from the planning notes.
pub const NOTES_LIMIT: usize = 300;

/// When the follow-up questions are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaTiming {
    /// From the scenario alone, in the background while the user plans.
    #[default]
    Before,
    /// From the scenario and the presentation, once it has ended.
    After,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub planning: Duration,
    pub presentation: Duration,
    /// Remaining presentation time at which a warning is emitted.
    pub presentation_warning: Duration,
    pub qa_read_delay: Duration,
    pub qa_answer: Duration,
    pub error_display: Duration,
    pub judge_count: usize,
    pub qa_timing: QaTiming,
    pub judging_mode: JudgingMode,
    /// Run chunked transcription over recorded audio before judging.
    pub transcribe_audio: bool,
    pub send_audio_to_judges: bool,
    /// Characters kept from each reference example in the scenario prompt.
    pub example_char_budget: usize,
    pub events_root: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            planning: Duration::from_secs(20 * 60),
            presentation: Duration::from_secs(7 * 60),
            presentation_warning: Duration::from_secs(60),
            qa_read_delay: Duration::from_secs(5),
            qa_answer: Duration::from_secs(60),
            error_display: Duration::from_secs(3),
            judge_count: 3,
            qa_timing: QaTiming::Before,
            judging_mode: JudgingMode::Panel,
            transcribe_audio: true,
            send_audio_to_judges: true,
            example_char_budget: 600,
            events_root: PathBuf::from("data/roleplay"),
        }
    }
}

/// One recording of the session: its running transcript plus the captured audio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub transcript: String,
    /// Latest non-final speech recognition result, replaced on every update.
    pub interim: String,
    pub audio: Option<AudioArtifact>,
    pub finished: bool,
}

impl Recording {
    pub fn append_final(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(text);
        self.interim.clear();
    }

    /// Folds any pending interim result into the transcript.
    pub fn settle_interim(&mut self) {
        let interim = std::mem::take(&mut self.interim);
        self.append_final(&interim);
    }

    pub fn has_transcript(&self) -> bool {
        !self.transcript.trim().is_empty()
    }
}

/// Everything one practice attempt accumulates, owned by the phase engine.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub event: Option<PracticeEvent>,
    pub scenario: Option<Scenario>,
    pub notes: String,
    pub qa_questions: Option<QaQuestions>,
    pub main_recording: Recording,
    pub qa_recording: Recording,
    pub selected_judges: Vec<Judge>,
    pub judge_results: Vec<JudgeResult>,
    pub(crate) phase: Phase,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Stores the planning notes, keeping at most `NOTES_LIMIT` characters.
    pub fn set_notes(&mut self, notes: &str) {
        self.notes = notes.chars().take(NOTES_LIMIT).collect();
    }

    pub fn recording(&self, target: RecordingTarget) -> &Recording {
        match target {
            RecordingTarget::Presentation => &self.main_recording,
            RecordingTarget::Answers => &self.qa_recording,
        }
    }

    pub fn recording_mut(&mut self, target: RecordingTarget) -> &mut Recording {
        match target {
            RecordingTarget::Presentation => &mut self.main_recording,
            RecordingTarget::Answers => &mut self.qa_recording,
        }
    }

    pub fn aggregate(&self) -> Aggregate {
        Aggregate::from_results(&self.judge_results)
    }
}
