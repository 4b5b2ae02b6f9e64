use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gesture_realtime::playback::{PlaybackClock, PlaybackStatus, Sequencer};
use gesture_realtime::types::{MessageKind, ServerEvent};
use gesture_realtime::{Client, Config, ConfigBuilder, Inbound, Notice};
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

const FRAME: Duration = Duration::from_millis(16);

/// Sends speech or text to the translation backend and plays back the body
/// instructions it answers with.
///
/// The realtime endpoint produces instructions from `audio_chunk` frames, so
/// pass `--audio`. Text input is only answered by backends that handle
/// `text_input` on the same socket.
#[derive(Parser)]
struct Cli {
    /// Text to translate into gestures, or context for `--audio`
    #[arg(required_unless_present = "audio")]
    text: Option<String>,
    /// Audio file to send as a single audio chunk instead of text
    #[arg(long)]
    audio: Option<PathBuf>,
    /// Overrides GESTURE_BACKEND_URL
    #[arg(long)]
    url: Option<String>,
    /// Seconds to wait for instructions
    #[arg(long, default_value_t = 30)]
    wait: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();
    if let Some(url) = args.url {
        config = ConfigBuilder::from(config).with_url(&url).build();
    }

    let client = Client::new(config);
    let mut instructions = client.subscribe(MessageKind::BodyInstructions)?;
    let mut translations = client.subscribe(MessageKind::Translation)?;
    let mut errors = client.subscribe(MessageKind::Error)?;
    let mut notices = client.notices();

    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            match notice {
                Notice::StatusChanged(state) => tracing::info!("connection: {:?}", state.status()),
                Notice::ConnectionFailed { attempts, error } => {
                    tracing::error!("gave up after {} retries: {}", attempts, error)
                }
                other => tracing::warn!("{:?}", other),
            }
        }
    });

    tokio::spawn(async move {
        while let Some(message) = translations.recv().await {
            if let Inbound::Event(ServerEvent::Translation(t)) = message {
                tracing::info!("translation: {} ({:.0}%)", t.text(), t.confidence() * 100.0);
            }
        }
    });

    tokio::spawn(async move {
        while let Some(message) = errors.recv().await {
            if let Inbound::Event(ServerEvent::Error(e)) = message {
                tracing::error!("backend error: {}", e.message());
            }
        }
    });

    client.open().await.context("Failed to connect to the translation backend")?;
    match (&args.audio, &args.text) {
        (Some(path), _) => {
            let audio = std::fs::read(path)
                .with_context(|| format!("Failed to read audio file {}", path.display()))?;
            client.send_audio_chunk(&audio, args.text.as_deref()).await?;
        }
        (None, Some(text)) => client.send_text(text).await?,
        (None, None) => anyhow::bail!("nothing to translate"),
    }

    let received = tokio::time::timeout(Duration::from_secs(args.wait), instructions.recv())
        .await
        .with_context(|| {
            format!(
                "No body instructions within {}s; the backend may not answer this input type",
                args.wait
            )
        })?;
    let Some(Inbound::Event(ServerEvent::BodyInstructions(event))) = received else {
        anyhow::bail!("connection ended before any instructions arrived");
    };

    let mut sequencer = Sequencer::new();
    sequencer
        .load(event.sequence())
        .context("Backend sent an unplayable sequence")?;
    sequencer.play()?;

    let mut clock = PlaybackClock::new();
    let mut frames = tokio::time::interval(FRAME);
    let mut last_step = None;
    while sequencer.status()? != PlaybackStatus::Complete {
        let now = frames.tick().await.into_std();
        sequencer.tick(clock.delta(now))?;
        let step = sequencer.progress()?.step_index;
        if last_step != Some(step) {
            let instruction = sequencer.current_instruction()?;
            tracing::info!("[{}] {}", instruction.kind(), instruction.description());
            last_step = Some(step);
        }
    }

    client.disconnect()?;
    Ok(())
}
