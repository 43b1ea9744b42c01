use anyhow::{Context, Result};
use clap::Parser;
use gemini_content::GeminiClient;
use learn_tales_core::coordinator::Coordinator;
use learn_tales_core::generator::ContentGenerator;
use learn_tales_core::narration::PlaybackState;
use learn_tales_core::request::{ClassGrade, Language, LearningForm, Subject};
use learn_tales_core::speech::SpeechEngine;
use learn_tales_service::app::App;
use learn_tales_service::commands::{Command, HELP};
use learn_tales_service::config::{Config, SpeechEngineKind};
use learn_tales_service::console_speech::ConsoleSpeechEngine;
use learn_tales_service::gemini_adapter::GeminiAdapter;
use learn_tales_service::prompt_loader;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Turns a school topic into a story, a quiz and a picture")]
struct Cli {
    /// Class between 1 and 7
    #[arg(long)]
    class: Option<ClassGrade>,
    /// Subject, e.g. "Science" or "Social Studies"
    #[arg(long)]
    subject: Option<Subject>,
    /// The topic to learn about
    #[arg(long)]
    topic: Option<String>,
    /// Language of the story, quiz and narration
    #[arg(long)]
    language: Option<Language>,
    /// Save the illustration here
    #[arg(long)]
    image_out: Option<PathBuf>,
}

impl Cli {
    fn form(&self) -> LearningForm {
        let mut form = LearningForm::default();
        if let Some(class_grade) = self.class {
            form.class_grade = class_grade;
        }
        if let Some(subject) = self.subject {
            form.subject = subject;
        }
        if let Some(topic) = &self.topic {
            form.topic = topic.clone();
        }
        if let Some(language) = self.language {
            form.language = language;
        }
        form
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so they do not interleave with the page on stdout.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting Learn Tales...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Load Prompts ---
    let prompts = if config.prompts_dir.is_dir() {
        prompt_loader::load_prompts(&config.prompts_dir).context("Failed to load LLM prompts")?
    } else {
        tracing::warn!(
            "Prompts directory {} not found, using the built-in storyteller instruction.",
            config.prompts_dir.display()
        );
        HashMap::new()
    };
    tracing::info!("Loaded {} prompts successfully.", prompts.len());

    // --- 5. Initialize API Clients ---
    let client =
        GeminiClient::new(config.gemini_config()).context("Failed to create Gemini client")?;
    let generator: Arc<dyn ContentGenerator> = Arc::new(GeminiAdapter::new(
        client,
        prompt_loader::system_instruction(&prompts),
    ));
    let engine: Option<Arc<dyn SpeechEngine>> = match config.speech_engine {
        SpeechEngineKind::Console => {
            Some(Arc::new(ConsoleSpeechEngine::new(config.words_per_minute)))
        }
        SpeechEngineKind::None => None,
    };

    // --- 6. Application Setup ---
    let mut app = App::new(
        args.form(),
        Coordinator::new(generator),
        engine,
        args.image_out.clone(),
    );
    let mut state_rx = app.coordinator().subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Learn Tales: learning through stories\n");
    println!("{}\n", app.render_form());
    println!("{HELP}\n");
    if let Some(reply) = app.submit() {
        println!("{reply}");
    }

    // --- 7. Event Loop ---
    loop {
        // The story on screen may have changed since the last pass.
        let mut narration_rx = app.narration_updates();
        tokio::select! {
            Some(playback) = next_playback(&mut narration_rx) => {
                if playback == PlaybackState::Idle {
                    if let Some(controls) = app.narration_controls() {
                        println!("\n{controls}\n");
                    }
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                for block in app.on_state(&state).await {
                    println!("{block}\n");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Some(reply) = app.handle(command).await {
                            println!("{reply}\n");
                        }
                    }
                    Err(e) => println!("{e}\n"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down.");
                break;
            }
        }
    }

    tracing::info!("Learn Tales stopped.");
    Ok(())
}

/// Waits for the next playback change. Never resolves without a narration.
async fn next_playback(rx: &mut Option<watch::Receiver<PlaybackState>>) -> Option<PlaybackState> {
    match rx {
        Some(rx) => {
            rx.changed().await.ok()?;
            Some(*rx.borrow_and_update())
        }
        None => std::future::pending().await,
    }
}
