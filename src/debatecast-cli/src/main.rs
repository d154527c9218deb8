//! DebateCast CLI - AI Debate Driver
//!
//! Creates debates, advances them one turn at a time, and runs judgment and
//! narration against the configured generation and speech backends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use debatecast_core::{
    AudioStore, Config, Debate, DebateEvent, DebateOrchestrator, DebateStatus, DebateStore,
    ElevenLabsSynthesizer, FsAudioStore, JsonFileStore, NewDebate, OpenAiGenerator,
    OrchestratorSettings, Persona, Side, SpeechSynthesizer, SynthesisBackend, TextGenerator,
    default_config,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "debatecast",
    version,
    about = "DebateCast - Voiced AI debates, one turn at a time",
    long_about = "A CLI for running narrated debates between two AI personas using \
                  OpenAI-compatible generation APIs and text-to-speech backends."
)]
struct Cli {
    /// Path to a TOML config file (built-in defaults otherwise)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a debate and print its id
    Create(CreateArgs),
    /// Create a debate and drive it through every turn, judgment and narration
    Run {
        #[command(flatten)]
        args: CreateArgs,
        /// Skip the full narration audio
        #[arg(long)]
        no_narration: bool,
    },
    /// Fill the next open turn of a debate
    Next {
        #[arg(value_name = "ID")]
        id: Uuid,
    },
    /// Fill a specific turn slot
    Turn {
        #[arg(value_name = "ID")]
        id: Uuid,
        #[arg(value_name = "ROUND")]
        round: usize,
        #[arg(value_name = "TURN")]
        turn: usize,
    },
    /// Ask the judge for a verdict
    Judge {
        #[arg(value_name = "ID")]
        id: Uuid,
    },
    /// Synthesize the full debate narration
    Narrate {
        #[arg(value_name = "ID")]
        id: Uuid,
    },
    /// Print a debate
    Show {
        #[arg(value_name = "ID")]
        id: Uuid,
    },
    /// List stored debates
    List,
    /// List voices offered by the speech backend
    Voices,
}

#[derive(Args)]
struct CreateArgs {
    /// The topic to debate
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// One question per round (specify once per round)
    #[arg(short, long = "question", action = ArgAction::Append, required = true, value_name = "QUESTION")]
    questions: Vec<String>,

    /// Side that opens every round
    #[arg(long, default_value = "side1", value_parser = parse_side, value_name = "SIDE")]
    first_speaker: Side,

    /// Instructions for side 1
    #[arg(long, value_name = "TEXT")]
    instructions1: Option<String>,

    /// Instructions for side 2
    #[arg(long, value_name = "TEXT")]
    instructions2: Option<String>,

    /// Voice for side 1 (config default otherwise)
    #[arg(long, value_name = "VOICE")]
    voice1: Option<String>,

    /// Voice for side 2 (config default otherwise)
    #[arg(long, value_name = "VOICE")]
    voice2: Option<String>,

    /// Voice for the judge and narration (config default otherwise)
    #[arg(long, value_name = "VOICE")]
    presenter_voice: Option<String>,
}

impl CreateArgs {
    fn into_new_debate(self, config: &Config) -> NewDebate {
        let persona = |side: Side, instructions: Option<String>, voice: Option<String>| {
            Persona::new(
                instructions.unwrap_or_else(|| default_instructions(side)),
                voice.unwrap_or_else(|| config.voices.for_side(side).to_string()),
            )
        };

        NewDebate::new(self.topic, self.questions)
            .with_persona(Side::Side1, persona(Side::Side1, self.instructions1, self.voice1))
            .with_persona(Side::Side2, persona(Side::Side2, self.instructions2, self.voice2))
            .with_first_speaker(self.first_speaker)
            .with_presenter_voice(
                self.presenter_voice
                    .unwrap_or_else(|| config.voices.presenter.clone()),
            )
    }
}

fn parse_side(s: &str) -> Result<Side, String> {
    s.parse().map_err(|e: debatecast_core::DebateError| e.to_string())
}

fn default_instructions(side: Side) -> String {
    format!(
        "You are {} in a formal debate. Argue your position clearly and persuasively, \
         answer your opponent's points directly, and speak only the words you would say \
         aloud: no stage directions, no markdown.",
        side.verdict_label()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => default_config(),
    };

    let orchestrator = build_orchestrator(&config)
        .await?
        .with_callback(create_console_callback());

    match cli.command {
        Command::Create(args) => {
            let debate = orchestrator
                .create_debate(args.into_new_debate(&config))
                .await?;
            print_header(&debate);
            println!("{} {}", "Created debate".bright_green().bold(), debate.id);
        }
        Command::Run { args, no_narration } => {
            let debate = orchestrator
                .create_debate(args.into_new_debate(&config))
                .await?;
            print_header(&debate);
            run_to_completion(&orchestrator, debate.id, !no_narration).await?;
        }
        Command::Next { id } => {
            orchestrator.advance_next(id).await?;
        }
        Command::Turn { id, round, turn } => {
            orchestrator.advance_turn(id, round, turn).await?;
        }
        Command::Judge { id } => {
            orchestrator.judge(id).await?;
        }
        Command::Narrate { id } => {
            orchestrator.compose_full_narration(id).await?;
        }
        Command::Show { id } => {
            let debate = orchestrator.get_debate(id).await?;
            print_header(&debate);
            print_transcript(&debate);
        }
        Command::List => {
            for debate in orchestrator.list_debates().await? {
                println!(
                    "{}  {:<11}  {}",
                    debate.id.to_string().dimmed(),
                    status_label(debate.status).yellow(),
                    debate.topic.bright_white()
                );
            }
        }
        Command::Voices => {
            for voice in orchestrator.synthesizer().voices().await? {
                println!("  - {} {}", voice.voice_id.bright_cyan(), voice.name.dimmed());
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_orchestrator(config: &Config) -> Result<DebateOrchestrator> {
    let default_key = config.generation.default_api_key();
    if default_key.is_none() {
        eprintln!(
            "{}",
            format!(
                "Warning: {} not set. Generation calls may fail unless per-persona keys are set.",
                config.generation.api_key_env
            )
            .yellow()
        );
    }

    let generator = OpenAiGenerator::new(
        &config.generation.api_base,
        default_key,
        Duration::from_secs(config.generation.timeout_secs.max(1)),
    )?;

    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.synthesis.backend {
        SynthesisBackend::Elevenlabs => {
            let api_key = config.synthesis.api_key().unwrap_or_else(|| {
                eprintln!(
                    "{}",
                    format!(
                        "Warning: {} not set. Speech synthesis will fail.",
                        config.synthesis.api_key_env
                    )
                    .yellow()
                );
                String::new()
            });
            let mut synthesizer = ElevenLabsSynthesizer::new(&config.synthesis.api_base, api_key);
            if let Some(model_id) = &config.synthesis.model_id {
                synthesizer = synthesizer.with_model(model_id);
            }
            Arc::new(synthesizer)
        }
        SynthesisBackend::Kokoro => kokoro_synthesizer().await?,
    };

    let store = JsonFileStore::open(&config.storage.data_dir).await?;
    let audio = FsAudioStore::open(&config.storage.audio_dir).await?;
    info!(
        data_dir = %config.storage.data_dir.display(),
        audio_dir = %config.storage.audio_dir.display(),
        "opened storage"
    );

    Ok(DebateOrchestrator::new(
        Arc::new(generator) as Arc<dyn TextGenerator>,
        synthesizer,
        Arc::new(store) as Arc<dyn DebateStore>,
        Arc::new(audio) as Arc<dyn AudioStore>,
        OrchestratorSettings::from_config(config),
    ))
}

#[cfg(feature = "kokoro")]
async fn kokoro_synthesizer() -> Result<Arc<dyn SpeechSynthesizer>> {
    let synthesizer = debatecast_core::kokoro::KokoroSynthesizer::new().await?;
    Ok(Arc::new(synthesizer))
}

#[cfg(not(feature = "kokoro"))]
async fn kokoro_synthesizer() -> Result<Arc<dyn SpeechSynthesizer>> {
    anyhow::bail!("The kokoro backend is not compiled in. Rebuild with `--features kokoro`.")
}

/// Advance every open turn, then judge and optionally narrate.
async fn run_to_completion(
    orchestrator: &DebateOrchestrator,
    id: Uuid,
    narrate: bool,
) -> Result<()> {
    loop {
        let debate = orchestrator.get_debate(id).await?;
        if debate.next_slot().is_none() {
            break;
        }
        if let Err(e) = orchestrator.advance_next(id).await {
            warn!(debate_id = %id, error = %e, "turn failed");
            eprintln!(
                "{} {}\nResume with: debatecast next {}",
                "Error:".red().bold(),
                e,
                id
            );
            return Err(e.into());
        }
    }

    orchestrator.judge(id).await?;
    if narrate {
        orchestrator.compose_full_narration(id).await?;
    }

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Debate concluded.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    Ok(())
}

fn print_header(debate: &Debate) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {}", "DebateCast".bold(), debate.id)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), debate.topic.bright_white());
    println!("{} {}", "Status:".bold(), status_label(debate.status).yellow());
    println!("{} {}", "Opens each round:".bold(), debate.first_speaker);
    println!();
    println!("{}", "Questions:".bold());
    for (i, question) in debate.questions.iter().enumerate() {
        println!("  {}. {}", i + 1, question);
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());
}

fn print_transcript(debate: &Debate) {
    for (i, round) in debate.rounds.iter().enumerate() {
        println!();
        println!(
            "{}",
            format!("  Round {}: {}", i + 1, round.question)
                .bright_magenta()
                .bold()
        );
        for response in &round.responses {
            println!("{} {}", "▶".bright_cyan(), response.side.to_string().bright_cyan().bold());
            for line in textwrap(&response.content, 66).lines() {
                println!("  {}", line);
            }
            if let Some(file) = &response.audio_file {
                println!("  {}", file.dimmed());
            }
            println!();
        }
    }

    if let Some(decision) = &debate.judge_decision {
        println!("{} {}", "Winner:".bold(), decision.winner.to_string().bright_green());
        for line in textwrap(&decision.reasoning, 66).lines() {
            println!("  {}", line);
        }
    }
    if let Some(file) = &debate.full_debate_audio_file {
        println!("{} {}", "Full narration:".bold(), file);
    }
}

fn status_label(status: DebateStatus) -> &'static str {
    match status {
        DebateStatus::Created => "created",
        DebateStatus::InProgress => "in_progress",
        DebateStatus::Completed => "completed",
    }
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> Box<dyn Fn(DebateEvent) + Send + Sync> {
    Box::new(move |event| match event {
        DebateEvent::TurnStart {
            round, turn, side, ..
        } => {
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                side.to_string().bright_cyan().bold(),
                format!("(round {}, turn {})", round + 1, turn + 1).yellow()
            );
        }
        DebateEvent::TurnRecorded { content, .. } => {
            for line in textwrap(&content, 66).lines() {
                println!("  {}", line);
            }
            println!();
        }
        DebateEvent::VerdictReached {
            winner, reasoning, ..
        } => {
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!(
                "{}",
                format!("  VERDICT: {} wins", winner).bright_magenta().bold()
            );
            println!("{}", "═".repeat(70).bright_magenta());
            for line in textwrap(&reasoning, 66).lines() {
                println!("  {}", line);
            }
            println!();
        }
        DebateEvent::NarrationReady { audio_file, .. } => {
            println!("{} {}", "Full narration:".bold(), audio_file.bright_white());
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
