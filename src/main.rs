use anyhow::{Context, Result};
use clap::Parser;
use origin_cache_proxy::cli::Cli;
use origin_cache_proxy::server::spawn_proxy_server;
use tokio::signal;
use tokio::sync::watch;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Detach before any runtime threads exist.
    #[cfg(unix)]
    if cli.daemon {
        daemonize(&cli)?;
    }

    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let shutdown_task = tokio::spawn(handle_shutdown_signal(shutdown_tx));

    spawn_proxy_server(&cli.listen_addr, &cli.proxy_settings(), shutdown_rx).await?;

    shutdown_task.abort();

    Ok(())
}

#[cfg(unix)]
fn daemonize(cli: &Cli) -> Result<()> {
    // Keep relative paths (cache dir, route config) pointing where the user meant.
    let mut daemon = daemonize::Daemonize::new().working_directory(std::env::current_dir()?);
    if let Some(pid_file) = &cli.pid_file {
        daemon = daemon.pid_file(pid_file);
    }
    // env_logger writes to stderr, which is /dev/null after detaching otherwise.
    if let Some(log_file) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("failed to open log file {}", log_file.display()))?;
        daemon = daemon.stdout(file.try_clone()?).stderr(file);
    }
    daemon
        .start()
        .map_err(|err| anyhow::anyhow!("failed to daemonize: {}", err))
}

pub async fn handle_shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    // Wait for a shutdown signal (e.g., Ctrl+C)
    if let Err(err) = signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", err);
        return;
    }

    let _ = shutdown_tx.send(true);
}
