use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gesture_realtime::playback::{PlaybackClock, PlaybackStatus, Sequencer};
use gesture_realtime::types::{GestureKind, Instruction};
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
struct Cli {
    /// Playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
    /// Frames per second of the render loop
    #[arg(long, default_value_t = 60)]
    fps: u32,
}

fn greeting() -> Vec<Instruction> {
    vec![
        Instruction::new(GestureKind::Hand, "raise right hand to shoulder height", 0.8, 0.6, 1),
        Instruction::new(GestureKind::Hand, "wave palm outward twice", 1.5, 0.9, 2),
        Instruction::new(GestureKind::Face, "smile and hold eye contact", 1.0, 0.7, 3),
        Instruction::new(GestureKind::Body, "slight forward bow", 1.2, 0.5, 4),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();

    let mut sequencer = Sequencer::new();
    sequencer.on_complete(|| tracing::info!("sequence finished"));
    sequencer.load(greeting()).context("failed to load sequence")?;
    sequencer.set_speed(args.speed).context("invalid speed")?;
    sequencer.play()?;

    tracing::info!(
        "playing {} instructions, {:.1}s at {}x",
        sequencer.sequence()?.len(),
        sequencer.total_duration()?,
        sequencer.speed()
    );

    let mut clock = PlaybackClock::new();
    let mut frames = tokio::time::interval(Duration::from_secs(1) / args.fps.max(1));
    let mut last_step = None;

    loop {
        let now = frames.tick().await.into_std();
        sequencer.tick(clock.delta(now))?;

        let progress = sequencer.progress()?;
        if last_step != Some(progress.step_index) {
            let instruction = sequencer.current_instruction()?;
            tracing::info!(
                "step {}: [{}] {} (intensity {:.1})",
                progress.step_index + 1,
                instruction.kind(),
                instruction.description(),
                instruction.intensity()
            );
            last_step = Some(progress.step_index);
        }

        if progress.status == PlaybackStatus::Complete {
            break;
        }
    }

    Ok(())
}
