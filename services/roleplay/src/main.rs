use anyhow::{Context, Result};
use clap::Parser;
use roleplay_core::capture::{AudioCapture, NoCapture};
use roleplay_core::catalog::EventCatalog;
use roleplay_core::engine::{EngineParts, PhaseEngine};
use roleplay_core::judging::JudgingMode;
use roleplay_core::phase::Phase;
use roleplay_core::report::{AuthTokenProvider, ReportStore};
use roleplay_core::session::QaTiming;
use roleplay_core::{Command, Input};
use roleplay_native_audio::{MicInput, Recorder};
use roleplay_service::config::Config;
use roleplay_service::console;
use roleplay_service::gateway_adapter::{GatewayAdapter, StaticToken};
use roleplay_service::report_store::{BackendReportStore, JsonlReportStore};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Timed role-play practice with an AI judging panel")]
struct Cli {
    /// Event to practice, matched against the catalog by id or title
    query: Option<String>,
    /// Print the available events and exit
    #[arg(long)]
    list_events: bool,
    /// Print the available microphones and exit
    #[arg(long)]
    list_devices: bool,
    /// Microphone to record from; defaults to the system input
    #[arg(long)]
    device: Option<String>,
    /// Run without a microphone; type `say <text>` to build the transcript
    #[arg(long)]
    no_mic: bool,
    /// Skip transcribing the recorded audio before judging
    #[arg(long)]
    offline_transcript: bool,
    /// One request per judge instead of a single panel request
    #[arg(long)]
    parallel_judges: bool,
    /// Generate the follow-up questions after the presentation
    #[arg(long)]
    qa_after: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(config.log_level).into())
                .with_env_var("LOG_FILTER")
                .from_env_lossy(),
        )
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    if args.list_devices {
        let devices = roleplay_native_audio::device::get_available_inputs()
            .context("Failed to list audio input devices")?;
        println!("{devices}");
        return Ok(());
    }

    // --- 4. Load the Event Catalog ---
    let catalog = EventCatalog::load(&config.events_dir).context("Failed to load event catalog")?;
    if args.list_events {
        for event in catalog.events() {
            println!("{:<28} {}", event.id, event.title);
        }
        return Ok(());
    }
    let first_event = args
        .query
        .as_deref()
        .map(|query| catalog.find(query).cloned())
        .transpose()
        .context("Failed to find the requested event")?;

    tracing::info!(
        gateway = %config.gateway_url,
        model = %config.chat_model,
        "Configuration loaded successfully. Starting role-play practice..."
    );

    // --- 5. Build the Engine's Collaborators ---
    let mut session_config = config.session_config();
    if args.offline_transcript {
        session_config.transcribe_audio = false;
    }
    if args.parallel_judges {
        session_config.judging_mode = JudgingMode::Parallel;
    }
    if args.qa_after {
        session_config.qa_timing = QaTiming::After;
    }

    let tokens: Arc<dyn AuthTokenProvider> = Arc::new(StaticToken::new(config.auth_token.clone()));
    let client = ai_gateway::Client::new(
        ai_gateway::Config::builder()
            .with_base_url(&config.gateway_url)
            .with_model(&config.chat_model)
            .with_auth_token(config.auth_token.as_deref())
            .build(),
    );
    let gateway = Arc::new(GatewayAdapter::new(client, tokens.clone()));

    let reports: Arc<dyn ReportStore> = match &config.reports_url {
        Some(url) => Arc::new(BackendReportStore::new(url, tokens.clone())),
        None => Arc::new(JsonlReportStore::new(&config.reports_file)),
    };

    let capture: Box<dyn AudioCapture> = if args.no_mic {
        Box::new(NoCapture)
    } else {
        Box::new(Recorder::new(MicInput::new(args.device.clone()), config.trim_silence))
    };

    // The command channel decouples the engine from the terminal.
    let (command_tx, mut command_rx) = mpsc::channel::<Command>(64);
    let (input_tx, input_rx) = mpsc::channel::<Input>(32);
    let (phase_tx, phase_rx) = watch::channel(Phase::EventSelection);

    let mut engine = PhaseEngine::new(
        session_config,
        EngineParts {
            gateway: gateway.clone(),
            capture,
            reports,
            commands: command_tx,
        },
    );

    // --- 6. Terminal Tasks ---

    // Prints engine commands and tracks the phase for the input task.
    let renderer = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            if let Command::PhaseChanged(phase) = &command {
                phase_tx.send_replace(*phase);
            }
            if let Some(text) = console::render(&command) {
                println!("{text}");
            }
        }
    });

    // Reads typed lines and forwards them to the engine.
    let stdin_tx = input_tx.clone();
    let stdin_reader = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read from stdin: {:?}", e);
                    break;
                }
            };
            let input = console::parse_line(&line, &catalog)
                .and_then(|input| input.map(|i| console::route(i, *phase_rx.borrow())).transpose());
            match input {
                Ok(Some(input)) => {
                    if stdin_tx.send(input).await.is_err() {
                        break;
                    }
                }
                Ok(None) => println!("{}", console::HELP),
                Err(message) => println!("{message}"),
            }
        }
        // End of input stops the engine.
        let _ = stdin_tx.send(Input::Quit).await;
    });

    match first_event {
        Some(event) => {
            input_tx
                .send(Input::SelectEvent(event))
                .await
                .context("Failed to queue the selected event")?;
        }
        None => println!("{}", console::HELP),
    }
    drop(input_tx);

    // The engine holds the microphone, which must stay on this task.
    let interrupted = tokio::select! {
        _ = engine.run(input_rx) => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        tracing::info!("Received Ctrl-C, shutting down...");
        engine.flush_reports().await;
    }

    stdin_reader.abort();
    drop(engine);
    let _ = renderer.await;

    let stats = gateway.client().stats();
    tracing::info!(
        calls = stats.calls(),
        total_tokens = stats.total_tokens(),
        input_tokens = stats.input_tokens(),
        output_tokens = stats.output_tokens(),
        "Shutting down..."
    );
    Ok(())
}
