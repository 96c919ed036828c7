mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use wall_core::Reconciler;
use wall_sync::{PollChannel, RunOptions, WallConfig};

use crate::render::JsonLinesRenderer;

#[derive(Parser)]
#[command(name = "wall", about = "Idea wall sync and presentation engine")]
struct Cli {
    /// Config file (TOML). Falls back to WALL_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ideas API base URL. Overrides the config file and IDEAS_API
    #[arg(long, global = true)]
    api: Option<String>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the wall, writing frame snapshots to stdout as JSON lines
    Run {
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,

        /// Emit every Nth frame
        #[arg(long, default_value_t = 1)]
        emit_every: u64,

        /// Seed placement and spotlight for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Fetch the collection once and print it in display order
    Ideas,

    /// Print the effective configuration as TOML
    Config,
}

fn load_config(cli: &Cli) -> Result<WallConfig> {
    let mut config = WallConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(api) = &cli.api {
        config.api.base_url = api.trim().to_string();
        config.validate().context("invalid --api")?;
    }
    Ok(config)
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run {
            frames,
            emit_every,
            seed,
        } => cmd_run(&cli, *frames, *emit_every, *seed).await,
        Commands::Ideas => cmd_ideas(&cli).await,
        Commands::Config => cmd_config(&cli),
    }
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Cancel `cancel` on Ctrl-C or SIGTERM. Handlers are registered before
/// returning so no signal can slip past between start-up and the first frame.
#[cfg(unix)]
fn install_shutdown_handler(cancel: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
            _ = sigint.recv() => tracing::info!("interrupt received, shutting down"),
        }
        cancel.cancel();
    });
    Ok(())
}

#[cfg(not(unix))]
fn install_shutdown_handler(cancel: CancellationToken) -> Result<()> {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            return;
        }
        tracing::info!("interrupt received, shutting down");
        cancel.cancel();
    });
    Ok(())
}

async fn cmd_run(cli: &Cli, frames: Option<u64>, emit_every: u64, seed: Option<u64>) -> Result<()> {
    let config = load_config(cli)?;
    let cancel = CancellationToken::new();

    install_shutdown_handler(cancel.clone())?;

    let mut renderer = JsonLinesRenderer::new(std::io::stdout(), emit_every, cancel.clone());
    let options = RunOptions {
        max_frames: frames,
        seed,
    };
    let summary = wall_sync::run(&config, &mut renderer, cancel, options)
        .await
        .context("wall engine failed")?;

    if cli.verbose {
        eprintln!(
            "--- frames={}, emitted={}, ideas={}, updates={}, conflicts={}, poll_failures={} ---",
            summary.frames,
            renderer.emitted(),
            summary.ideas,
            summary.updates,
            summary.conflicts,
            summary.poll_failures
        );
    }
    Ok(())
}

async fn cmd_ideas(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let poll = PollChannel::new(&config).context("failed to set up poll channel")?;
    let outcome = poll
        .fetch()
        .await
        .with_context(|| format!("failed to fetch ideas from {}", config.api.base_url))?;

    if outcome.ideas.rejected > 0 {
        eprintln!("skipped {} malformed ideas", outcome.ideas.rejected);
    }

    let mut reconciler = Reconciler::new();
    reconciler.apply(outcome.into_update());

    println!("header: {}", reconciler.header());
    println!("ideas:  {}", reconciler.store().len());
    for idea in reconciler.store().snapshot_ordered() {
        let author = if idea.author.is_empty() {
            "anonymous"
        } else {
            idea.author.as_str()
        };
        println!("[{}] {} {}: {}", idea.id, idea.submitted_at, author, idea.text);
    }
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let text = config.to_toml().context("failed to render config")?;
    print!("{text}");
    Ok(())
}
