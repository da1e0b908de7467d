pub mod audio;
pub mod capture;
pub mod catalog;
pub mod countdown;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod judges;
pub mod judging;
pub mod parse;
pub mod phase;
pub mod qa;
pub mod report;
pub mod rubric;
pub mod scenario;
pub mod session;
pub mod transcript;
pub mod waveform;

use crate::catalog::PracticeEvent;
use crate::judging::ResultsView;
use crate::phase::Phase;
use std::time::Duration;

/// Represents commands that the core logic (`PhaseEngine`) issues to the runtime.
///
/// The engine never renders anything itself; the runtime decides how each
/// command is shown to the user.
#[derive(Debug, Clone)]
pub enum Command {
    /// The session moved into a new phase.
    PhaseChanged(Phase),
    /// One second elapsed on the active countdown.
    Tick { phase: Phase, remaining: u64 },
    /// The presentation countdown crossed its warning mark.
    PresentationWarning { remaining: u64 },
    ScenarioReady { title: String, scenario: String },
    QuestionsReady(Vec<String>),
    /// A categorized failure to show for `dismiss_after` before hiding it again.
    ShowError {
        message: String,
        dismiss_after: Duration,
    },
    /// Non-fatal capture problem; the session continues without audio.
    CaptureNotice(String),
    ShowResults(ResultsView),
}

/// Events the runtime feeds into the `PhaseEngine`.
#[derive(Debug, Clone)]
pub enum Input {
    SelectEvent(PracticeEvent),
    UpdateNotes(String),
    StartPresentation,
    EndPresentation,
    EndQa,
    /// A speech recognition result for whichever recording is active.
    LiveTranscript { text: String, is_final: bool },
    RetryJudge(usize),
    StartNewSession,
    Quit,
}
