use crate::Command;
use crate::Input;
use crate::audio::AudioArtifact;
use crate::capture::{AudioCapture, RecordingTarget};
use crate::catalog::{self, PracticeEvent};
use crate::countdown::{Countdown, Tick};
use crate::error::SessionError;
use crate::gateway::AiGateway;
use crate::judges::select_judges;
use crate::judging::{JudgeFailure, JudgeResult, JudgingContext, JudgingPipeline, ResultsView};
use crate::parse::Parsed;
use crate::phase::{Phase, Trigger};
use crate::qa::{QaGenerator, QaQuestions};
use crate::report::{PracticeReport, ReportStore, spawn_save};
use crate::scenario::{Scenario, ScenarioGenerator, inspect_scenario};
use crate::session::{QaTiming, Recording, Session, SessionConfig};
use crate::transcript::{ChunkedTranscriber, prefer_longer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Collaborators the engine drives.
pub struct EngineParts {
    pub gateway: Arc<dyn AiGateway>,
    pub capture: Box<dyn AudioCapture>,
    pub reports: Arc<dyn ReportStore>,
    pub commands: mpsc::Sender<Command>,
}

/// Results arriving from the engine's own background tasks.
#[derive(Debug)]
enum EngineEvent {
    Tick(Tick),
    QuestionsReady {
        generation: u64,
        result: Result<Parsed<QaQuestions>, SessionError>,
    },
}

impl From<Tick> for EngineEvent {
    fn from(tick: Tick) -> Self {
        EngineEvent::Tick(tick)
    }
}

enum Next {
    Input(Option<Input>),
    Event(EngineEvent),
}

/// Owns a practice session and moves it through its phases.
///
/// All session state is mutated on the task that runs the engine. Countdowns
/// and question pre-generation run as separate tasks and report back through
/// an internal channel; their results are tagged with the `epoch` (bumped on
/// every transition) or `generation` (bumped on every reset) they were started
/// under, and anything stale is dropped on arrival.
pub struct PhaseEngine {
    config: SessionConfig,
    session: Session,
    gateway: Arc<dyn AiGateway>,
    capture: Box<dyn AudioCapture>,
    reports: Arc<dyn ReportStore>,
    commands: mpsc::Sender<Command>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    countdown: Option<Countdown>,
    epoch: u64,
    generation: u64,
    questions_pending: bool,
    awaiting_questions: bool,
    capturing: Option<RecordingTarget>,
    rng: StdRng,
    scenarios: ScenarioGenerator,
    transcriber: ChunkedTranscriber,
    judging: JudgingPipeline,
    last_save: Option<JoinHandle<()>>,
    /// Set once the runtime stops receiving commands.
    closed: bool,
}

impl PhaseEngine {
    pub fn new(config: SessionConfig, parts: EngineParts) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            scenarios: ScenarioGenerator::new(config.example_char_budget),
            judging: JudgingPipeline::new(config.judging_mode),
            transcriber: ChunkedTranscriber::default(),
            config,
            session: Session::new(),
            gateway: parts.gateway,
            capture: parts.capture,
            reports: parts.reports,
            commands: parts.commands,
            events_tx,
            events_rx,
            countdown: None,
            epoch: 0,
            generation: 0,
            questions_pending: false,
            awaiting_questions: false,
            capturing: None,
            rng: StdRng::from_os_rng(),
            last_save: None,
            closed: false,
        }
    }

    /// Makes judge selection and scenario parameters reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    /// Number of countdowns currently running. Never more than one.
    pub fn active_countdowns(&self) -> usize {
        self.countdown.iter().filter(|c| c.is_active()).count()
    }

    /// Runs until `Input::Quit` or until the input channel closes.
    pub async fn run(&mut self, mut inputs: mpsc::Receiver<Input>) {
        loop {
            let next = tokio::select! {
                input = inputs.recv() => Next::Input(input),
                Some(event) = self.events_rx.recv() => Next::Event(event),
            };
            match next {
                Next::Input(None) => break,
                Next::Input(Some(input)) => {
                    if !self.dispatch(input).await {
                        break;
                    }
                }
                Next::Event(event) => self.handle_event(event).await,
            }
            if self.closed {
                break;
            }
        }

        self.clear_countdown();
        self.release_capture().await;
        self.flush_reports().await;
        tracing::info!("phase engine stopped");
    }

    /// Applies one input. Returns `false` when the engine should stop.
    pub async fn dispatch(&mut self, input: Input) -> bool {
        let result = match input {
            Input::Quit => return false,
            Input::SelectEvent(event) => self.select_event(event).await,
            Input::UpdateNotes(notes) => self.update_notes(&notes),
            Input::StartPresentation => self.start_presentation(Trigger::Begin).await,
            Input::EndPresentation => self.end_presentation().await,
            Input::EndQa => self.end_answers(Trigger::Finish).await,
            Input::LiveTranscript { text, is_final } => self.live_transcript(&text, is_final),
            Input::RetryJudge(index) => self.retry_judge(index).await,
            Input::StartNewSession => self.start_new_session().await,
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, phase = ?self.session.phase, "input ignored");
        }
        true
    }

    /// Waits for the next countdown tick or background result and applies it.
    pub async fn step(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event).await;
        }
    }

    /// Waits until the last report save has finished.
    pub async fn flush_reports(&mut self) {
        if let Some(handle) = self.last_save.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "report save task did not complete");
            }
        }
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Tick(tick) => self.on_tick(tick).await,
            EngineEvent::QuestionsReady { generation, result } => {
                self.on_questions(generation, result).await
            }
        }
    }

    /// Waits for room in the command channel. A closed channel stops the engine.
    async fn emit(&mut self, command: Command) {
        if self.commands.send(command).await.is_err() && !self.closed {
            tracing::info!("runtime stopped receiving commands, stopping engine");
            self.closed = true;
        }
    }

    async fn transition(&mut self, trigger: Trigger) -> Result<(), SessionError> {
        let from = self.session.phase;
        let to = from.next(trigger)?;
        self.clear_countdown();
        self.epoch += 1;
        self.session.phase = to;
        tracing::info!(?from, ?to, ?trigger, epoch = self.epoch, "phase transition");
        self.emit(Command::PhaseChanged(to)).await;
        Ok(())
    }

    fn clear_countdown(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
    }

    fn start_countdown(&mut self, duration: Duration) {
        self.clear_countdown();
        self.countdown = Some(Countdown::start(
            self.session.phase,
            self.epoch,
            duration,
            self.events_tx.clone(),
        ));
    }

    async fn on_tick(&mut self, tick: Tick) {
        if tick.epoch != self.epoch || tick.phase != self.session.phase {
            tracing::debug!(
                tick_epoch = tick.epoch,
                epoch = self.epoch,
                tick_phase = ?tick.phase,
                phase = ?self.session.phase,
                "discarding stale tick"
            );
            return;
        }

        self.emit(Command::Tick {
            phase: tick.phase,
            remaining: tick.remaining,
        })
        .await;
        if tick.phase == Phase::Presentation
            && tick.remaining > 0
            && tick.remaining == self.config.presentation_warning.as_secs()
        {
            self.emit(Command::PresentationWarning {
                remaining: tick.remaining,
            })
            .await;
        }
        if tick.remaining > 0 {
            return;
        }

        let result = match tick.phase {
            Phase::Planning => self.start_presentation(Trigger::Expired).await,
            Phase::Presentation => self.end_presentation().await,
            Phase::QaDelay => self.start_answers().await,
            Phase::QaRecording => self.end_answers(Trigger::Expired).await,
            _ => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, phase = ?tick.phase, "countdown expiry could not advance the session");
        }
    }

    pub async fn select_event(&mut self, event: PracticeEvent) -> Result<(), SessionError> {
        self.transition(Trigger::Select).await?;
        self.session.selected_judges = select_judges(&mut self.rng, self.config.judge_count);
        self.session.event = Some(event.clone());
        tracing::info!(
            event = %event.id,
            judges = ?self.session.selected_judges.iter().map(|j| j.name).collect::<Vec<_>>(),
            "event selected"
        );

        let scenario = match self.generate_scenario(&event).await {
            Ok(scenario) => scenario,
            Err(err) => {
                self.fail(err).await;
                return Ok(());
            }
        };

        let shape = inspect_scenario(scenario.text(), scenario.params());
        if shape.is_expected() {
            tracing::debug!(words = shape.word_count, "scenario generated");
        } else {
            tracing::warn!(
                bullets = shape.requirement_bullets,
                countries = ?shape.countries_named,
                words = shape.word_count,
                "scenario does not have the expected shape"
            );
        }

        self.emit(Command::ScenarioReady {
            title: event.title.clone(),
            scenario: scenario.text().to_string(),
        })
        .await;
        self.session.scenario = Some(scenario);
        self.transition(Trigger::ScenarioReady).await?;
        self.start_countdown(self.config.planning);
        if self.config.qa_timing == QaTiming::Before {
            self.spawn_question_pregeneration();
        }
        Ok(())
    }

    async fn generate_scenario(&mut self, event: &PracticeEvent) -> Result<Scenario, SessionError> {
        let materials = catalog::load_materials(&self.config.events_root, event).await?;
        let request = self.scenarios.prepare(event, &materials, &mut self.rng);
        self.scenarios
            .generate(self.gateway.as_ref(), request)
            .await
    }

    fn spawn_question_pregeneration(&mut self) {
        let Some(scenario) = self.session.scenario.clone() else {
            return;
        };
        let title = self.event_title().to_string();
        let gateway = self.gateway.clone();
        let tx = self.events_tx.clone();
        let generation = self.generation;
        self.questions_pending = true;

        tokio::spawn(async move {
            let result = QaGenerator
                .generate(gateway.as_ref(), &title, &scenario, QaTiming::Before, "", None)
                .await;
            let _ = tx.send(EngineEvent::QuestionsReady { generation, result });
        });
        tracing::debug!(generation, "pre-generating follow-up questions");
    }

    async fn on_questions(
        &mut self,
        generation: u64,
        result: Result<Parsed<QaQuestions>, SessionError>,
    ) {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "discarding stale questions");
            return;
        }
        self.questions_pending = false;

        match result {
            Ok(parsed) => {
                if parsed.is_fallback() {
                    tracing::info!("using default follow-up questions");
                }
                self.session.qa_questions = Some(parsed.into_inner());
                if std::mem::take(&mut self.awaiting_questions) {
                    if let Err(err) = self.enter_qa_delay().await {
                        tracing::warn!(error = %err, "could not start Q&A");
                    }
                }
            }
            Err(err) => {
                self.awaiting_questions = false;
                self.fail(err).await;
            }
        }
    }

    fn update_notes(&mut self, notes: &str) -> Result<(), SessionError> {
        if self.session.phase != Phase::Planning {
            return Err(SessionError::InvalidInput(
                "notes can only be edited while planning".to_string(),
            ));
        }
        self.session.set_notes(notes);
        Ok(())
    }

    fn live_transcript(&mut self, text: &str, is_final: bool) -> Result<(), SessionError> {
        let Some(target) = self.recording_target() else {
            tracing::debug!(phase = ?self.session.phase, "live transcript outside a recording phase");
            return Ok(());
        };
        let recording = self.session.recording_mut(target);
        if is_final {
            recording.append_final(text);
        } else {
            recording.interim = text.to_string();
        }
        Ok(())
    }

    fn recording_target(&self) -> Option<RecordingTarget> {
        match self.session.phase {
            Phase::Presentation if !self.session.main_recording.finished => {
                Some(RecordingTarget::Presentation)
            }
            Phase::QaRecording if !self.session.qa_recording.finished => {
                Some(RecordingTarget::Answers)
            }
            _ => None,
        }
    }

    async fn start_presentation(&mut self, trigger: Trigger) -> Result<(), SessionError> {
        self.transition(trigger).await?;
        self.session.main_recording = Recording::default();
        self.begin_capture(RecordingTarget::Presentation).await;
        self.start_countdown(self.config.presentation);
        Ok(())
    }

    async fn end_presentation(&mut self) -> Result<(), SessionError> {
        if self.session.phase != Phase::Presentation || self.session.main_recording.finished {
            return Err(SessionError::InvalidInput(
                "no presentation in progress".to_string(),
            ));
        }
        self.clear_countdown();
        self.finish_capture(RecordingTarget::Presentation).await;
        self.prepare_transcript(RecordingTarget::Presentation).await;

        if self.session.qa_questions.is_some() {
            return self.enter_qa_delay().await;
        }
        if self.questions_pending {
            tracing::info!("waiting for follow-up questions");
            self.awaiting_questions = true;
            return Ok(());
        }

        match self.generate_questions_now().await {
            Ok(parsed) => {
                self.session.qa_questions = Some(parsed.into_inner());
                self.enter_qa_delay().await
            }
            Err(err) => {
                self.fail(err).await;
                Ok(())
            }
        }
    }

    async fn generate_questions_now(&self) -> Result<Parsed<QaQuestions>, SessionError> {
        let scenario = self
            .session
            .scenario
            .as_ref()
            .ok_or_else(|| SessionError::InvalidInput("no scenario to ask about".to_string()))?;
        let recording = &self.session.main_recording;
        QaGenerator
            .generate(
                self.gateway.as_ref(),
                self.event_title(),
                scenario,
                QaTiming::After,
                &recording.transcript,
                recording.audio.as_ref(),
            )
            .await
    }

    async fn enter_qa_delay(&mut self) -> Result<(), SessionError> {
        self.transition(Trigger::QuestionsReady).await?;
        if let Some(questions) = self.session.qa_questions.as_ref().map(QaQuestions::to_vec) {
            self.emit(Command::QuestionsReady(questions)).await;
        }
        self.start_countdown(self.config.qa_read_delay);
        Ok(())
    }

    async fn start_answers(&mut self) -> Result<(), SessionError> {
        self.transition(Trigger::Expired).await?;
        self.session.qa_recording = Recording::default();
        self.begin_capture(RecordingTarget::Answers).await;
        self.start_countdown(self.config.qa_answer);
        Ok(())
    }

    async fn end_answers(&mut self, trigger: Trigger) -> Result<(), SessionError> {
        if self.session.phase != Phase::QaRecording {
            return Err(SessionError::InvalidInput("no Q&A answer in progress".to_string()));
        }
        self.clear_countdown();
        self.finish_capture(RecordingTarget::Answers).await;
        self.prepare_transcript(RecordingTarget::Answers).await;

        self.transition(trigger).await?;
        self.run_judging().await;
        self.transition(Trigger::JudgingDone).await?;
        self.publish_results().await;

        let report = PracticeReport::from_session(&self.session);
        self.last_save = Some(spawn_save(self.reports.clone(), report));
        Ok(())
    }

    async fn begin_capture(&mut self, target: RecordingTarget) {
        match self.capture.start(target).await {
            Ok(()) => self.capturing = Some(target),
            Err(e) => {
                let err = SessionError::from(e);
                tracing::warn!(error = %err, ?target, "continuing without audio");
                self.emit(Command::CaptureNotice(err.user_message())).await;
            }
        }
    }

    async fn release_capture(&mut self) -> Option<AudioArtifact> {
        self.capturing.take()?;
        match self.capture.stop().await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!(error = %e, "failed to stop audio capture");
                None
            }
        }
    }

    async fn finish_capture(&mut self, target: RecordingTarget) {
        let artifact = self.release_capture().await;
        let recording = self.session.recording_mut(target);
        recording.settle_interim();
        recording.audio = artifact;
        recording.finished = true;
    }

    /// Replaces the live transcript with a post-hoc one when that is longer.
    async fn prepare_transcript(&mut self, target: RecordingTarget) {
        if !self.config.transcribe_audio {
            return;
        }
        let Some(pcm) = self
            .session
            .recording(target)
            .audio
            .as_ref()
            .and_then(|audio| audio.pcm())
            .cloned()
        else {
            return;
        };

        match self.transcriber.transcribe(self.gateway.as_ref(), &pcm).await {
            Ok(text) => {
                let recording = self.session.recording_mut(target);
                if let Some(longer) = prefer_longer(&recording.transcript, &text) {
                    tracing::info!(?target, chars = longer.len(), "using post-hoc transcript");
                    recording.transcript = longer;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, ?target, "post-hoc transcription failed, keeping live transcript")
            }
        }
    }

    fn event_title(&self) -> &str {
        self.session
            .event
            .as_ref()
            .map(|event| event.title.as_str())
            .unwrap_or("Unknown")
    }

    async fn run_judging(&mut self) {
        let judges = self.session.selected_judges.clone();
        let questions = self
            .session
            .qa_questions
            .as_ref()
            .map(QaQuestions::to_vec)
            .unwrap_or_default();

        let results = match self.judging_context(&questions) {
            Some(ctx) => self.judging.evaluate(self.gateway.as_ref(), &ctx, &judges).await,
            None => judges
                .iter()
                .map(|_| {
                    JudgeResult::Failed(JudgeFailure::new(
                        "no scenario to judge",
                        None,
                        "missing_scenario",
                    ))
                })
                .collect(),
        };
        self.session.judge_results = results;
    }

    fn judging_context<'a>(&'a self, questions: &'a [String]) -> Option<JudgingContext<'a>> {
        Some(JudgingContext {
            event_title: self.event_title(),
            scenario: self.session.scenario.as_ref()?,
            questions,
            presentation: &self.session.main_recording,
            answers: &self.session.qa_recording,
            include_audio: self.config.send_audio_to_judges,
        })
    }

    async fn publish_results(&mut self) {
        let aggregate = self.session.aggregate();
        tracing::info!(
            score = aggregate.score,
            available = aggregate.available,
            succeeded = aggregate.succeeded,
            failed = aggregate.failed,
            "judging finished"
        );
        self.emit(Command::ShowResults(ResultsView {
            judges: self.session.selected_judges.clone(),
            results: self.session.judge_results.clone(),
            aggregate,
        }))
        .await;
    }

    async fn retry_judge(&mut self, index: usize) -> Result<(), SessionError> {
        if self.session.phase != Phase::Results {
            return Err(SessionError::InvalidInput(
                "judges can only be retried on the results screen".to_string(),
            ));
        }
        let judge = *self
            .session
            .selected_judges
            .get(index)
            .ok_or_else(|| SessionError::InvalidInput(format!("no judge at position {index}")))?;

        tracing::info!(index, judge = judge.name, "retrying judge");
        let questions = self
            .session
            .qa_questions
            .as_ref()
            .map(QaQuestions::to_vec)
            .unwrap_or_default();
        let ctx = self
            .judging_context(&questions)
            .ok_or_else(|| SessionError::InvalidInput("no scenario to judge".to_string()))?;
        let result = self
            .judging
            .evaluate_judge(self.gateway.as_ref(), &ctx, &judge, index)
            .await;

        if let Some(slot) = self.session.judge_results.get_mut(index) {
            *slot = result;
        }
        self.publish_results().await;
        Ok(())
    }

    async fn start_new_session(&mut self) -> Result<(), SessionError> {
        self.reset(Trigger::Reset).await;
        tracing::info!("new session started");
        Ok(())
    }

    /// Shows a categorized error, then drops the session and returns to event selection.
    async fn fail(&mut self, err: SessionError) {
        tracing::error!(error = %err, phase = ?self.session.phase, "session failed");
        self.emit(Command::ShowError {
            message: err.user_message(),
            dismiss_after: self.config.error_display,
        })
        .await;
        let trigger = match self.session.phase.next(Trigger::Fail) {
            Ok(_) => Trigger::Fail,
            Err(_) => Trigger::Reset,
        };
        self.reset(trigger).await;
    }

    async fn reset(&mut self, trigger: Trigger) {
        self.clear_countdown();
        self.release_capture().await;
        self.generation += 1;
        self.questions_pending = false;
        self.awaiting_questions = false;
        if let Err(err) = self.transition(trigger).await {
            tracing::warn!(error = %err, "reset transition rejected");
        }
        self.session = Session::new();
    }
}
