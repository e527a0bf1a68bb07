mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use craftwatch_core::{Config, ConfigValidator, CraftwatchError, PollVerdict};
use craftwatch_monitor::{force_check, Monitor, StatusPoller};
use craftwatch_tailer::replay_file;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("craftwatch=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    // Handle ConfigSample immediately without loading config
    if let Some(Commands::ConfigSample { output }) = &cli.command {
        let path = output
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("./craftwatch.sample.yaml"));
        Config::sample().save(&path)?;
        println!("✅ Sample configuration written to {:?}", path);
        return Ok(());
    }

    let mut config = Config::load(&cli.config_path)?;
    config.apply_env_overrides();
    ConfigValidator::validate(&config)?;

    match cli.command {
        Some(Commands::ForceCheck) => {
            force_check::request(&config.poll.force_check_file)
                .await
                .with_context(|| format!("Failed to create {:?}", config.poll.force_check_file))?;
            println!("✅ Force check requested");
        }
        Some(Commands::Replay) => {
            let (outcome, _) = replay_file(&config.log.path)
                .await
                .map_err(CraftwatchError::from)?;
            let status = if outcome.online { "🟢 Online" } else { "🔴 Offline" };
            println!("{}", status);
            if outcome.online {
                let players: Vec<_> = outcome.players.iter().cloned().collect();
                if players.is_empty() {
                    println!("Players: 0: None");
                } else {
                    println!("Players: {}: {}", players.len(), players.join(", "));
                }
            }
        }
        Some(Commands::Probe) => {
            let poller = StatusPoller::from_config(&config, Arc::new(Notify::new()))
                .context("Invalid server address")?;
            let cycle = poller.cycle().await;
            print_verdict("External", &cycle.external);
            if let Some(local) = &cycle.local {
                print_verdict("Local", local);
            }
            println!("Diagnosis: {}", cycle.diagnosis);
        }
        Some(Commands::Run) | None => run(config).await?,
        Some(Commands::ConfigSample { .. }) => {
            // Already handled
        }
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    ConfigValidator::validate_sink(&config)?;
    info!(
        "Watching {} (log: {})",
        config.server.address,
        config.log.path.display()
    );

    let shutdown = CancellationToken::new();
    let monitor = tokio::spawn(Monitor::from_config(config).run(shutdown.clone()));

    wait_for_signal().await;
    shutdown.cancel();

    monitor.await.context("Monitor task panicked")??;
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Exit signal (SIGINT) received"),
                    _ = term.recv() => info!("Exit signal (SIGTERM) received"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
    info!("Exit signal received");
}

fn print_verdict(label: &str, verdict: &PollVerdict) {
    if !verdict.reachable {
        println!("{}: unreachable", label);
        return;
    }
    let latency = verdict
        .latency
        .map(|l| format!("{}ms", l.as_millis()))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}: online, {}/{} players, {} ({})",
        label,
        verdict.player_count,
        verdict.max_count,
        verdict.version.as_deref().unwrap_or("unknown version"),
        latency
    );
    match &verdict.player_names {
        Some(names) if !names.is_empty() => println!("  Players: {}", names.join(", ")),
        _ if verdict.obscured_count() > 0 => {
            println!("  {} players with hidden names", verdict.obscured_count())
        }
        _ => {}
    }
}
