use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::Parser;
use engine::time::frame_duration_ms;
use engine::{
    ClipEndReceiver, Command, Event, FrameCache, PlaybackConfig, SessionPool, StreamController,
    load_project,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Plays a project headlessly and prints one JSON stream snapshot per
/// scheduling pass.
#[derive(Parser, Debug)]
#[command(name = "playsim", version)]
struct Cli {
    /// Project JSON with the sequence and its media.
    #[arg(long)]
    project: PathBuf,

    /// Playback config JSON. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Timeline frame to start playing from.
    #[arg(long, default_value_t = 0)]
    from: i64,

    /// Number of timeline frames to play.
    #[arg(long, default_value_t = 120)]
    frames: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).await
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let project = load_project(&cli.project)
        .with_context(|| format!("load project '{}'", cli.project.display()))?;
    let config = match &cli.config {
        Some(path) => PlaybackConfig::from_json_file(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => PlaybackConfig::default(),
    };

    let fps = project.sequence.fps;
    let cache = FrameCache::shared(config.frame_cache_capacity, frame_duration_ms(fps));
    let pool = Arc::new(SessionPool::new(Arc::clone(&cache)));
    for asset in project.media {
        pool.register_media(asset.into());
    }
    pool.warm_all().context("warm media sessions")?;

    let (controller, mut clip_ends) =
        StreamController::new(Arc::clone(&pool), cache, config, project.sequence)?;

    let mut frame = cli.from;
    dispatch(&controller, Command::Start { frame }, frame).await?;

    let frame_interval = Duration::from_secs_f64(1.0 / fps);
    let mut clock = Instant::now();
    let end = cli.from.saturating_add(cli.frames.max(0));
    while frame < end {
        frame += 1;
        clock += frame_interval;
        pump_sessions(&pool, clock);
        drain_clip_ends(&controller, &mut clip_ends, frame).await?;
        dispatch(&controller, Command::Tick { frame }, frame).await?;
    }

    dispatch(&controller, Command::Stop, frame).await?;
    info!(
        frames = cli.frames,
        cached_frames = pool.cache().lock().len(),
        "playback finished"
    );
    Ok(())
}

fn pump_sessions(pool: &SessionPool, now: Instant) {
    for session in pool.sessions() {
        let _ = session.pump(now);
        let decoder = session.decoder();
        if !decoder.poll_stall(now) {
            continue;
        }
        if let Err(error) = decoder.recover_from_eos() {
            warn!(media_id = decoder.media_id(), %error, "session recovery failed");
        }
    }
}

async fn drain_clip_ends(
    controller: &StreamController<SessionPool>,
    clip_ends: &mut ClipEndReceiver,
    frame: i64,
) -> anyhow::Result<()> {
    while let Ok(key) = clip_ends.try_recv() {
        dispatch(controller, Command::ClipEnded(key), frame).await?;
    }
    Ok(())
}

async fn dispatch(
    controller: &StreamController<SessionPool>,
    command: Command,
    frame: i64,
) -> anyhow::Result<()> {
    let events = match controller.handle_command(command).await {
        Ok(events) => events,
        Err(error) => {
            warn!(frame, %error, "command failed");
            return Ok(());
        }
    };
    for event in events {
        match event {
            Event::StreamsChanged(snapshot) => {
                let line = serde_json::json!({ "frame": frame, "snapshot": snapshot });
                println!("{}", serde_json::to_string(&line)?);
            }
            Event::Error(error) => {
                warn!(frame, kind = ?error.kind, message = %error.message, "engine error");
            }
        }
    }
    Ok(())
}
