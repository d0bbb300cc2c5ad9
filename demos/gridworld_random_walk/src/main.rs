use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gridlab_core::{Environment, ToolCall};
use gridworld_env::{default_layout, Config, GridWorldEnvironment};
use gridworld_rs::EnvironmentRecord;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Run random-policy episodes against a GridWorld layout.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of episodes to play.
    #[arg(long, default_value_t = 10)]
    episodes: u32,
    /// Step cap per episode.
    #[arg(long, default_value_t = 200)]
    max_steps: u32,
    /// Seed for both start placement and the policy.
    #[arg(long)]
    seed: Option<u64>,
    /// JSON environment record to load instead of the built-in 5x5 layout.
    #[arg(long)]
    layout: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let layout = match &args.layout {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            EnvironmentRecord::parse(&text)?
        }
        None => default_layout(),
    };
    if layout.actions.is_empty() {
        bail!("layout has an empty action set");
    }
    let actions = layout.actions.clone();

    let mut env = GridWorldEnvironment::new(Config { seed: args.seed, layout })?;
    let mut policy = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };
    let obs = env.initialize().await?;
    info!(start = %obs.data["agent_pos"], "starting {} episodes", args.episodes);

    let max_score = play(&mut env, &actions, &mut policy, args.episodes, args.max_steps).await?;
    info!(max_score, "done");
    Ok(())
}

/// Play `episodes` random-policy episodes and return the high-water score.
///
/// The engine only folds a score into the high-water mark when an episode is
/// restarted, so a finished final episode is restarted before reading it.
async fn play(
    env: &mut GridWorldEnvironment,
    actions: &[String],
    policy: &mut StdRng,
    episodes: u32,
    max_steps: u32,
) -> Result<f64> {
    let mut pending_restart = false;
    for episode in 0..episodes {
        let mut steps = 0;
        let obs = loop {
            let Some(action) = actions.choose(policy) else { bail!("empty action set") };
            let obs = env.step(vec![ToolCall::new("interact", json!({ "action": action }))]).await?;
            steps += 1;
            if obs.terminated || steps >= max_steps {
                break obs;
            }
        };
        pending_restart = obs.terminated;
        if !obs.terminated {
            env.step(vec![ToolCall::new("restart", json!({}))]).await?;
            info!(episode, steps, "episode truncated");
            continue;
        }
        info!(
            episode,
            steps,
            score = %obs.data["score"],
            successful = %obs.data["successful"],
            "episode finished"
        );
    }

    let data = if pending_restart {
        env.step(vec![ToolCall::new("restart", json!({}))]).await?.data
    } else {
        env.checkpoint().await?.data
    };
    data["max_score"].as_f64().context("state has no max_score")
}
