//! SecretChat demo binary.
//!
//! # Usage
//!
//! ```bash
//! # Interactive: type /join <secret>, then chat
//! secretchat-demo console --user alice
//!
//! # Several scripted users sharing one in-memory backend
//! secretchat-demo script --users 3 --messages 2 --secret orchid
//! ```

mod console;
mod render;
mod script;

use std::time::Duration;

use clap::{Parser, Subcommand};
use secretchat_app::{App, AppConfig, Runtime, RuntimeConfig, SystemEnv};
use secretchat_backend::{MemoryBackend, WELCOME_SENDER};
use secretchat_core::{Environment, RoomKey};
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    console::ConsoleDriver,
    script::{Pacing, ScriptDriver, build_script},
};

const NAMES: [&str; 6] = ["Agent_X", "Cipher", "Echo", "Nova", "Raven", "Zero"];

/// SecretChat demo
#[derive(Parser, Debug)]
#[command(name = "secretchat-demo")]
#[command(about = "Shared-secret chat rooms with animated reveals")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Don't seed new rooms with the welcome messages
    #[arg(long, global = true)]
    no_welcome: bool,

    /// Duration of a reveal animation, in milliseconds
    #[arg(long, global = true, default_value = "6000")]
    reveal_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Chat from this terminal
    Console {
        /// Display name
        #[arg(short, long, default_value = "Agent_X")]
        user: String,

        /// Room to seed with welcome messages before starting
        #[arg(short, long, default_value = "orchid")]
        secret: String,
    },
    /// Run scripted users against each other
    Script {
        /// Number of users (at most 6)
        #[arg(long, default_value = "2")]
        users: usize,

        /// Messages each user sends
        #[arg(long, default_value = "2")]
        messages: usize,

        /// Shared room secret
        #[arg(short, long, default_value = "orchid")]
        secret: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    // Console frames own stdout.
    let logs = fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry().with(logs).with(filter).init();

    let env = SystemEnv;
    let backend = MemoryBackend::new();
    let config = AppConfig {
        reveal_duration: Duration::from_millis(args.reveal_ms),
        ..AppConfig::default()
    };

    match args.mode {
        Mode::Console { user, secret } => {
            if !args.no_welcome {
                seed(&backend, &secret, &env)?;
            }
            let app = App::new(env, user, config);
            let runtime =
                Runtime::new(ConsoleDriver::new(), backend, env, app, RuntimeConfig::default());
            runtime.run().await?;
        },
        Mode::Script { users, messages, secret } => {
            if !args.no_welcome {
                seed(&backend, &secret, &env)?;
            }
            run_script(&backend, env, &config, users.min(NAMES.len()), messages, &secret).await?;
        },
    }

    tracing::info!("SecretChat demo finished");
    Ok(())
}

fn seed(
    backend: &MemoryBackend,
    secret: &str,
    env: &SystemEnv,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = RoomKey::parse(secret)?;
    backend.seed_welcome(&key, WELCOME_SENDER, env.wall_clock())?;
    tracing::info!("seeded welcome messages");
    Ok(())
}

async fn run_script(
    backend: &MemoryBackend,
    env: SystemEnv,
    config: &AppConfig,
    users: usize,
    messages: usize,
    secret: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut runs = JoinSet::new();

    for (n, name) in NAMES.iter().take(users).enumerate() {
        let pacing = Pacing {
            join_delay: Duration::from_millis(150 * n as u64),
            send_gap: Duration::from_millis(400),
            reveal_wait: config.reveal_duration + Duration::from_secs(1),
        };
        let driver = ScriptDriver::new(*name, build_script(name, secret, messages, pacing));
        let app = App::new(env, *name, config.clone());
        let runtime = Runtime::new(driver, backend.clone(), env, app, RuntimeConfig::default());
        runs.spawn(runtime.run());
    }

    while let Some(joined) = runs.join_next().await {
        let Ok(app) = joined?;
        tracing::info!(user = app.username(), "script finished");
    }

    let key = RoomKey::parse(secret)?;
    tracing::info!(messages = backend.message_count(&key), "room transcript stored");
    Ok(())
}
