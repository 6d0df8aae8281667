//! # ProductivityPal
//!
//! Runs the bot (default) or a single workflow action against the same
//! configuration and data directory.
//!
//! Usage:
//!   productivitypal                      # Run the bot
//!   productivitypal --config pal.toml    # Explicit config file
//!   productivitypal remind               # Post one reminder and exit
//!   productivitypal status               # One status check-in
//!   productivitypal jobs                 # One job-application interview
//!   productivitypal diagnose             # Print a diagnostics report

mod health;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pal_channels::DiscordGateway;
use pal_core::config::PalConfig;
use pal_core::traits::ChannelGateway;
use pal_scheduler::{Clock, SystemClock};
use pal_workflows::Bot;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "productivitypal",
    version,
    about = "📅 ProductivityPal: reminders, status check-ins and job tracking on Discord"
)]
struct Cli {
    /// Config file (TOML). Defaults to ./productivitypal.toml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the bot until Ctrl-C
    Run,
    /// Post one reminder
    Remind,
    /// Run one status check-in
    Status,
    /// Run one job-application interview
    Jobs,
    /// Check channels, secrets, data files and the health endpoint
    Diagnose,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "productivitypal=debug,pal_workflows=debug,pal_scheduler=debug,pal_channels=debug,pal_providers=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = PalConfig::load(cli.config.as_deref())?;
    config.validate()?;
    tracing::info!("📂 Data directory: {}", config.data_dir.display());

    let gateway = Arc::new(DiscordGateway::from_config(&config));
    let me = gateway.connect().await?;
    tracing::info!("Bot logged in as {} ({})", me.username, me.id);

    let responder = pal_providers::create_responder(&config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let channels: Vec<_> = config
        .channels
        .labelled()
        .into_iter()
        .map(|(_, id)| id)
        .filter(|&id| id != 0)
        .collect();
    let poll_every = Duration::from_secs(config.discord.poll_interval_secs.max(1));
    let polling = gateway.clone().start_polling(channels, poll_every);

    let command = cli.command.unwrap_or(Command::Run);
    let bot = Bot::new(
        config.clone(),
        gateway.clone() as Arc<dyn ChannelGateway>,
        responder,
        clock,
    )?;

    match command {
        Command::Run => run(&bot, &config).await?,
        Command::Remind => {
            let outcome = bot.trigger_reminder().await;
            tracing::info!("Reminder: {outcome:?}");
        }
        Command::Status => {
            let outcome = bot.trigger_status_check().await;
            tracing::info!("Status check: {outcome:?}");
        }
        Command::Jobs => {
            let outcome = bot.trigger_job_tracker().await;
            tracing::info!("Job tracker: {outcome:?}");
        }
        Command::Diagnose => {
            let report = bot.diagnose().await;
            let post = report.to_post(SystemClock.now());
            println!("{}", post.title.as_deref().unwrap_or_default());
            for field in &post.fields {
                println!("\n{}:\n{}", field.name, field.value);
            }
        }
    }

    polling.abort();
    Ok(())
}

async fn run(bot: &Arc<Bot>, config: &PalConfig) -> Result<()> {
    println!("📅 ProductivityPal v{}", env!("CARGO_PKG_VERSION"));

    let server = if config.health.enabled {
        Some(health::spawn_server(config.health.port).await?)
    } else {
        None
    };
    let pinger = (!config.health.public_url.trim().is_empty()).then(|| {
        health::spawn_keep_alive(
            config.health.public_url.clone(),
            Duration::from_secs(config.health.ping_interval_minutes.max(1) * 60),
        )
    });

    bot.start().await;
    tracing::info!("✅ ProductivityPal running. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    bot.shutdown();
    for task in [server, pinger].into_iter().flatten() {
        task.abort();
    }
    Ok(())
}
