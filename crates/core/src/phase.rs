use crate::error::TransitionError;
use serde::Serialize;

/// The states of a practice session, in the order a session normally visits them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    #[default]
    EventSelection,
    ScenarioGeneration,
    Planning,
    Presentation,
    QaDelay,
    QaRecording,
    Judging,
    Results,
}

/// What happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// An event was picked from the catalog.
    Select,
    ScenarioReady,
    /// The user started the presentation before planning time ran out.
    Begin,
    /// The active countdown reached zero.
    Expired,
    /// Follow-up questions are available after the presentation ended.
    QuestionsReady,
    /// The user ended the Q&A answer early.
    Finish,
    JudgingDone,
    /// Scenario or question generation failed.
    Fail,
    /// A new session was requested.
    Reset,
}

impl Phase {
    /// The transition function of the session state machine.
    pub fn next(self, trigger: Trigger) -> Result<Phase, TransitionError> {
        use Phase::*;
        use Trigger::*;

        let next = match (self, trigger) {
            (_, Reset) => EventSelection,
            (EventSelection, Select) => ScenarioGeneration,
            (ScenarioGeneration, ScenarioReady) => Planning,
            (ScenarioGeneration | Planning | Presentation, Fail) => EventSelection,
            (Planning, Begin | Expired) => Presentation,
            (Presentation, QuestionsReady) => QaDelay,
            (QaDelay, Expired) => QaRecording,
            (QaRecording, Finish | Expired) => Judging,
            (Judging, JudgingDone) => Results,
            (from, trigger) => return Err(TransitionError { from, trigger }),
        };
        Ok(next)
    }

    pub fn is_recording(self) -> bool {
        matches!(self, Phase::Presentation | Phase::QaRecording)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::EventSelection => "Event selection",
            Phase::ScenarioGeneration => "Generating scenario",
            Phase::Planning => "Planning",
            Phase::Presentation => "Presentation",
            Phase::QaDelay => "Q&A (read the questions)",
            Phase::QaRecording => "Q&A (answering)",
            Phase::Judging => "Judging",
            Phase::Results => "Results",
        }
    }
}
