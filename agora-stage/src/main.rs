// Agora - animated debate stage
// Connects to the conversation service and performs each turn with speech and motion

use agora_core::TracingRenderer;
use agora_session::{ChannelState, InteractClient, SessionChannel, WsConnector};
use agora_spk::{AudioOutput, EspeakEngine, SpeechAudioResolver, Utterance};
use agora_stage::{AgentOrchestrator, FrameDriver, StageConfig, StageEvent, TurnOutcome};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agora")]
#[command(about = "Agora - animated characters performing a live debate", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Session endpoint, overrides configuration and environment
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a debate and perform it until interrupted
    Debate {
        /// Debate topic
        #[arg(long)]
        topic: String,

        /// Participating characters, comma separated
        #[arg(long, value_delimiter = ',', default_value = "aria,sera,eidon")]
        characters: Vec<String>,
    },

    /// Ask the interaction endpoint one question and perform the reply
    Ask {
        /// Question to send
        #[arg(long)]
        input: String,

        /// Character performing the reply (defaults to the configured one)
        #[arg(long)]
        character: Option<String>,

        /// Conversation id; a fresh one is generated when omitted
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Speak a line locally, without the conversation service
    Say {
        #[arg(long)]
        character: String,

        #[arg(long)]
        text: String,
    },

    /// List the characters on stage
    Characters,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Debate { topic, characters } => run_debate(config, &topic, characters).await,
        Commands::Ask {
            input,
            character,
            session_id,
        } => ask(config, &input, character, session_id).await,
        Commands::Say { character, text } => say(config, &character, &text).await,
        Commands::Characters => {
            list_characters(&config);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StageConfig> {
    let mut config = match cli.config {
        Some(ref path) => StageConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => StageConfig::default(),
    };
    config.apply_env();
    if let Some(ref endpoint) = cli.endpoint {
        config.session.endpoint = endpoint.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn audio_output() -> Arc<dyn AudioOutput> {
    #[cfg(feature = "rodio-output")]
    {
        Arc::new(agora_spk::output::RodioOutput)
    }
    #[cfg(not(feature = "rodio-output"))]
    {
        Arc::new(agora_spk::SilentOutput)
    }
}

fn build_stage(config: &StageConfig) -> anyhow::Result<AgentOrchestrator> {
    let output = audio_output();
    info!(output = output.name(), "audio output selected");
    let engine = EspeakEngine::spawn(&config.speech.local);
    let resolver = SpeechAudioResolver::from_config(&config.speech, output, engine)
        .context("Failed to build speech resolver")?;
    info!(tiers = ?resolver.tier_names(), "speech tiers ready");
    Ok(AgentOrchestrator::new(config.roster(), resolver))
}

fn start_frames(stage: &AgentOrchestrator, config: &StageConfig) -> (watch::Sender<bool>, tokio::task::JoinHandle<u64>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver = FrameDriver::from_config(stage.clone(), Arc::new(TracingRenderer), config);
    (shutdown_tx, driver.spawn(shutdown_rx))
}

async fn stop_frames(shutdown: watch::Sender<bool>, frames: tokio::task::JoinHandle<u64>) {
    shutdown.send_replace(true);
    match frames.await {
        Ok(count) => debug!(frames = count, "frame loop finished"),
        Err(e) => warn!(error = %e, "frame loop ended abnormally"),
    }
}

async fn run_debate(config: StageConfig, topic: &str, characters: Vec<String>) -> anyhow::Result<()> {
    let roster = config.roster();
    for id in &characters {
        if !roster.contains(id) {
            anyhow::bail!("Unknown character: {}", id);
        }
    }

    let stage = build_stage(&config)?;
    let connector = Arc::new(WsConnector::new(config.session.connect_timeout()));
    let channel = SessionChannel::new(config.session.clone(), connector);
    stage.attach(&channel);

    if let Err(e) = channel.connect().await {
        warn!(error = %e, "initial connection failed, waiting for reconnect");
        channel.wait_open().await.context("Could not reach the conversation service")?;
    }

    channel.start_debate(topic, &characters);
    info!(topic, characters = ?characters, "debate requested");

    let (shutdown, frames) = start_frames(&stage, &config);
    let mut state = channel.watch_state();
    let mut events = stage.subscribe();
    let mut debate_id: Option<String> = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow();
                match current {
                    ChannelState::Failed => {
                        error!("could not reconnect to the conversation service");
                        break;
                    }
                    ChannelState::Disconnected => {
                        info!("conversation service closed the session");
                        break;
                    }
                    other => debug!(state = ?other, "session state changed"),
                }
            }
            event = events.recv() => match event {
                Ok(StageEvent::DebateStarted { debate_id: id }) => debate_id = id,
                Ok(StageEvent::NoAudio { character_id, reason }) => {
                    warn!(character = %character_id, reason = %reason, "turn produced no audio");
                }
                Ok(StageEvent::UnknownCharacter { character_id }) => {
                    warn!(character = %character_id, "turn for a character not on stage");
                }
                Ok(other) => debug!(event = ?other, "stage event"),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "stage events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if let Some(ref id) = debate_id {
        channel.stop_debate(id);
    }
    stage.stop_all();
    channel.disconnect();
    stop_frames(shutdown, frames).await;
    Ok(())
}

async fn perform_for(stage: &AgentOrchestrator, config: &StageConfig, outcome: TurnOutcome) {
    match outcome {
        TurnOutcome::Speaking { source, duration } => {
            println!("Speaking via {} for {:.1}s", source, duration.as_secs_f64());
            let (shutdown, frames) = start_frames(stage, config);
            tokio::time::sleep(duration + Duration::from_millis(300)).await;
            stop_frames(shutdown, frames).await;
        }
        TurnOutcome::NoAudio => println!("No audio could be produced for this turn"),
        TurnOutcome::Superseded => {}
    }
}

async fn ask(
    config: StageConfig,
    input: &str,
    character: Option<String>,
    session_id: Option<String>,
) -> anyhow::Result<()> {
    let stage = build_stage(&config)?;
    let client = InteractClient::from_config(&config.session)?;
    let session_id = session_id.unwrap_or_else(InteractClient::new_session_id);
    let character = character.unwrap_or_else(|| config.default_character.clone());

    let (response, outcome) = stage
        .perform_interaction(&client, &session_id, input, &character)
        .await
        .context("Interaction failed")?;

    println!("{}: {}", character, response.text_response);
    if !response.avatar_commands.is_null() {
        debug!(commands = %response.avatar_commands, "avatar commands");
    }
    perform_for(&stage, &config, outcome).await;
    Ok(())
}

async fn say(config: StageConfig, character: &str, text: &str) -> anyhow::Result<()> {
    let stage = build_stage(&config)?;
    let outcome = stage.start_turn(character, Utterance::new(text)).await?;
    perform_for(&stage, &config, outcome).await;
    Ok(())
}

fn list_characters(config: &StageConfig) {
    let roster = config.roster();
    println!("{:<12} {:<18} {:<14} {}", "ID", "MOUTH", "POSITION", "MOTION");
    for character in roster.iter() {
        let motion = if character.animation.is_some() { "custom" } else { "defaults" };
        println!(
            "{:<12} {:<18} {:<14} {}",
            character.id,
            character.render.mouth_param,
            format!("({:.2}, {:.2})", character.render.position.x, character.render.position.y),
            motion
        );
    }
}
