//! Terminal front end: turns typed lines into engine inputs and engine
//! commands into printable text.

use roleplay_core::catalog::EventCatalog;
use roleplay_core::judging::{JudgeResult, ResultsView, category_averages};
use roleplay_core::phase::Phase;
use roleplay_core::{Command, Input};
use std::fmt::Write;

pub const HELP: &str = "\
commands:
  event <name>     pick an event (fuzzy match)
  start            begin the presentation before planning time runs out
  end              finish the presentation, or the answers during Q&A
  notes <text>     replace your planning notes
  say <text>       add spoken text to the active recording
  retry <n>        re-run judge n after a failure
  new              start a new session
  help             show this list
  quit             leave";

/// Parses one typed line. `Ok(None)` means the line asked for help.
pub fn parse_line(line: &str, catalog: &EventCatalog) -> Result<Option<Input>, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let input = match word.to_lowercase().as_str() {
        "" | "help" | "?" => return Ok(None),
        "event" | "select" => {
            if rest.is_empty() {
                return Err("usage: event <name>".to_string());
            }
            let event = catalog.find(rest).map_err(|e| e.to_string())?;
            Input::SelectEvent(event.clone())
        }
        "start" => Input::StartPresentation,
        "end" | "done" => Input::EndPresentation,
        "notes" => Input::UpdateNotes(rest.to_string()),
        "say" => Input::LiveTranscript {
            text: rest.to_string(),
            is_final: true,
        },
        "retry" => {
            let number: usize = rest
                .parse()
                .map_err(|_| format!("not a judge number: {rest:?}"))?;
            if number == 0 {
                return Err("judges are numbered from 1".to_string());
            }
            Input::RetryJudge(number - 1)
        }
        "new" => Input::StartNewSession,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command: {other} (type help)")),
    };
    Ok(Some(input))
}

/// Fits a parsed input to the current phase. `end` ends whichever recording
/// is running; spoken text is refused while nothing records.
pub fn route(input: Input, phase: Phase) -> Result<Input, String> {
    match (input, phase) {
        (Input::EndPresentation, Phase::QaRecording) => Ok(Input::EndQa),
        (Input::LiveTranscript { .. }, phase) if !phase.is_recording() => {
            Err(format!("nothing is recording during {}", phase.label()))
        }
        (input, _) => Ok(input),
    }
}

fn clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Text to print for a command, or `None` for commands shown elsewhere.
pub fn render(command: &Command) -> Option<String> {
    let text = match command {
        Command::PhaseChanged(phase) => format!("== {} ==", phase.label()),
        // Full minutes and the final ten seconds only.
        Command::Tick { phase, remaining } if *remaining % 60 == 0 || *remaining <= 10 => {
            format!("[{}] {} left", phase.label(), clock(*remaining))
        }
        Command::Tick { .. } => return None,
        Command::PresentationWarning { remaining } => {
            format!("!! {} left in your presentation", clock(*remaining))
        }
        Command::ScenarioReady { title, scenario } => format!("{title}\n\n{scenario}"),
        Command::QuestionsReady(questions) => questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("Q{}: {q}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
        Command::ShowError { message, .. } => format!("error: {message}"),
        Command::CaptureNotice(notice) => format!("note: {notice}"),
        Command::ShowResults(view) => render_results(view),
    };
    Some(text)
}

pub fn render_results(view: &ResultsView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Score: {}", view.aggregate.display());
    if view.aggregate.is_partial() {
        let _ = writeln!(
            out,
            "* based on {} of {} judges",
            view.aggregate.succeeded,
            view.aggregate.succeeded + view.aggregate.failed
        );
    }

    for (i, (judge, result)) in view.judges.iter().zip(&view.results).enumerate() {
        let _ = writeln!(out);
        match result {
            JudgeResult::Scored(evaluation) => {
                let _ = writeln!(out, "{}. {} ({}): {}", i + 1, judge.name, judge.title, evaluation.total);
                let _ = writeln!(out, "   {}", evaluation.overall_feedback);
                if !evaluation.strength_highlight.is_empty() {
                    let _ = writeln!(out, "   strength: {}", evaluation.strength_highlight);
                }
                if !evaluation.improvement_area.is_empty() {
                    let _ = writeln!(out, "   improve: {}", evaluation.improvement_area);
                }
                for tip in &evaluation.actionable_tips {
                    let _ = writeln!(out, "   - {tip}");
                }
            }
            JudgeResult::Failed(failure) => {
                let _ = writeln!(
                    out,
                    "{}. {} ({}): failed, {} (type `retry {}`)",
                    i + 1,
                    judge.name,
                    judge.title,
                    failure.message,
                    i + 1
                );
            }
        }
    }

    let averages = category_averages(&view.results);
    if !averages.is_empty() {
        let _ = writeln!(out);
        for (category, points) in averages {
            let _ = writeln!(out, "{:<14} {points}/{}", category.key(), category.max_points());
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use roleplay_core::error::AiError;
    use roleplay_core::judges::JUDGE_POOL;
    use roleplay_core::judging::{Aggregate, JudgeFailure, fallback_evaluation};
    use std::time::Duration;

    #[test]
    fn lines_become_inputs() {
        let catalog = EventCatalog::builtin();
        assert!(matches!(
            parse_line("event international", &catalog),
            Ok(Some(Input::SelectEvent(event))) if event.id == "international-business"
        ));
        assert!(matches!(parse_line("  START ", &catalog), Ok(Some(Input::StartPresentation))));
        assert!(matches!(
            parse_line("notes open with the market size", &catalog),
            Ok(Some(Input::UpdateNotes(notes))) if notes == "open with the market size"
        ));
        assert!(matches!(
            parse_line("say Good morning judges", &catalog),
            Ok(Some(Input::LiveTranscript { text, is_final: true })) if text == "Good morning judges"
        ));
        assert!(matches!(parse_line("retry 2", &catalog), Ok(Some(Input::RetryJudge(1)))));
        assert!(matches!(parse_line("quit", &catalog), Ok(Some(Input::Quit))));
        assert!(matches!(parse_line("help", &catalog), Ok(None)));
    }

    #[test]
    fn bad_lines_are_explained() {
        let catalog = EventCatalog::builtin();
        assert!(parse_line("retry two", &catalog).is_err());
        assert!(parse_line("retry 0", &catalog).is_err());
        assert!(parse_line("event", &catalog).is_err());
        assert!(parse_line("dance", &catalog).unwrap_err().contains("unknown command"));
    }

    #[test]
    fn end_follows_the_active_recording() {
        assert!(matches!(
            route(Input::EndPresentation, Phase::Presentation),
            Ok(Input::EndPresentation)
        ));
        assert!(matches!(route(Input::EndPresentation, Phase::QaRecording), Ok(Input::EndQa)));
        assert!(matches!(
            route(Input::StartNewSession, Phase::QaRecording),
            Ok(Input::StartNewSession)
        ));
    }

    #[test]
    fn spoken_text_needs_an_active_recording() {
        let say = || Input::LiveTranscript {
            text: "hello".to_string(),
            is_final: true,
        };
        assert!(matches!(route(say(), Phase::Presentation), Ok(Input::LiveTranscript { .. })));
        assert!(matches!(route(say(), Phase::QaRecording), Ok(Input::LiveTranscript { .. })));
        assert_eq!(
            route(say(), Phase::Planning).unwrap_err(),
            "nothing is recording during Planning"
        );
    }

    #[test]
    fn phase_changes_use_readable_names() {
        assert_eq!(
            render(&Command::PhaseChanged(Phase::QaDelay)).as_deref(),
            Some("== Q&A (read the questions) ==")
        );
    }

    #[test]
    fn ticks_are_thinned_out() {
        let tick = |remaining| Command::Tick {
            phase: Phase::Planning,
            remaining,
        };
        assert_eq!(render(&tick(120)).as_deref(), Some("[Planning] 2:00 left"));
        assert_eq!(render(&tick(95)), None);
        assert_eq!(render(&tick(9)).as_deref(), Some("[Planning] 0:09 left"));
    }

    #[test]
    fn errors_and_questions_render() {
        let error = Command::ShowError {
            message: "Please sign in".to_string(),
            dismiss_after: Duration::from_secs(3),
        };
        assert_eq!(render(&error).as_deref(), Some("error: Please sign in"));

        let questions = Command::QuestionsReady(vec!["Why?".to_string(), "How?".to_string()]);
        assert_eq!(render(&questions).as_deref(), Some("Q1: Why?\nQ2: How?"));
    }

    #[test]
    fn partial_results_point_at_retry() {
        let mut scored = fallback_evaluation();
        scored.total = 80;
        scored.overall_feedback = "Clear structure.".to_string();
        let failed = JudgeFailure::from(AiError::RateLimited);
        let results = vec![JudgeResult::Scored(scored), JudgeResult::Failed(failed)];
        let view = ResultsView {
            judges: JUDGE_POOL[..2].to_vec(),
            aggregate: Aggregate::from_results(&results),
            results,
        };

        let text = render_results(&view);
        assert!(text.starts_with("Score: 80*"));
        assert!(text.contains("based on 1 of 2 judges"));
        assert!(text.contains("Clear structure."));
        assert!(text.contains("type `retry 2`"));
    }
}
