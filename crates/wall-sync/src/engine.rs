//! The single logical timeline.
//!
//! One task owns the [`FrameDriver`] (and through it the store, actors and
//! spotlight). Poll and push run as separate tasks and hand completed
//! results over an mpsc channel, so network I/O never delays a frame.

use std::fmt;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use wall_core::{
    ConnectionState, FrameDriver, MonospaceMeasure, PresentationState, Renderer,
    SpotlightScheduler, Update,
};

use crate::config::WallConfig;
use crate::error::Result;
use crate::poll::PollChannel;
use crate::push::PushChannel;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Poll,
    Push,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Poll => f.write_str("poll"),
            Source::Push => f.write_str("push"),
        }
    }
}

/// What the channel tasks hand to the engine.
#[derive(Debug)]
pub enum ChannelMessage {
    Update { source: Source, update: Update },
    Connection(ConnectionState),
    PollFailed { failures: u32 },
}

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Fixed seed for placement and spotlight; OS entropy otherwise.
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub ideas: usize,
    pub updates: u64,
    pub conflicts: usize,
    pub poll_failures: u64,
    pub header: String,
}

pub fn build_driver(config: &WallConfig, seed: Option<u64>) -> FrameDriver {
    let (placement, spotlight) = match seed {
        Some(seed) => (
            SmallRng::seed_from_u64(seed),
            SmallRng::seed_from_u64(seed.wrapping_add(1)),
        ),
        None => (SmallRng::from_os_rng(), SmallRng::from_os_rng()),
    };
    FrameDriver::new(
        PresentationState::new(
            config.presentation_config(),
            MonospaceMeasure::default(),
            placement,
        ),
        SpotlightScheduler::new(config.spotlight_period(), config.spotlight.history, spotlight),
    )
}

/// Apply one channel message to the driver, logging what it changed.
pub fn apply_message(driver: &mut FrameDriver, message: ChannelMessage, summary: &mut RunSummary) {
    match message {
        ChannelMessage::Update { source, update } => {
            let report = driver.apply(update);
            summary.updates += 1;
            for id in &report.conflicts {
                tracing::warn!(
                    idea_id = %id,
                    %source,
                    "conflicting re-delivery ignored, keeping first version"
                );
            }
            summary.conflicts += report.conflicts.len();
            if !report.inserted.is_empty() {
                tracing::debug!(%source, count = report.inserted.len(), "ideas inserted");
            }
            if !report.removed.is_empty() {
                tracing::info!(removed = ?report.removed, "ideas removed after consecutive misses");
            }
            if report.header_changed {
                tracing::info!(header = driver.reconciler().header(), %source, "header changed");
            }
        }
        ChannelMessage::Connection(state) => {
            tracing::debug!(status = %state.status, retry = state.retry_count, "push state");
            driver.set_connection(state.status);
        }
        ChannelMessage::PollFailed { .. } => summary.poll_failures += 1,
    }
}

/// Run the wall until `cancel` fires or `max_frames` frames have been
/// presented. Channel tasks are stopped and awaited before returning.
pub async fn run<R: Renderer>(
    config: &WallConfig,
    renderer: &mut R,
    cancel: CancellationToken,
    options: RunOptions,
) -> Result<RunSummary> {
    let client = Client::builder().build()?;
    let poll = PollChannel::with_client(client, config)?;
    let backoff_rng = match options.seed {
        Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(2)),
        None => SmallRng::from_os_rng(),
    };
    let push = PushChannel::new(config, backoff_rng)?;

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let channels = cancel.child_token();
    let tracker = TaskTracker::new();
    tracker.spawn(poll.run(tx.clone(), channels.clone()));
    tracker.spawn(push.run(tx, channels.clone()));
    tracker.close();

    let mut driver = build_driver(config, options.seed);
    let mut frames = tokio::time::interval(config.frame_interval());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut summary = RunSummary::default();
    tracing::info!(fps = config.display.fps, api = %config.api.base_url, "wall running");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = frames.tick() => {
                let snapshot = driver.tick(Instant::now());
                renderer.present(&snapshot);
                summary.frames += 1;
                if options.max_frames.is_some_and(|max| summary.frames >= max) {
                    break;
                }
            }
            Some(message) = rx.recv() => apply_message(&mut driver, message, &mut summary),
        }
    }

    channels.cancel();
    rx.close();
    tracker.wait().await;

    summary.ideas = driver.reconciler().store().len();
    summary.header = driver.reconciler().header().to_string();
    tracing::info!(frames = summary.frames, ideas = summary.ideas, "wall stopped");
    Ok(summary)
}
