use std::process::ExitCode;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

use primary_route_sync::cli::Args;
use primary_route_sync::{telemetry, BirdClient, CommandStatusOracle, Reconciler, Result};

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "primary-route-sync exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = args.resolve_config()?;
    info!(
        socket = %config.control_socket.display(),
        protocol = %config.protocol,
        interval_secs = config.poll_interval_secs,
        once = args.once,
        "starting primary-route-sync"
    );

    let oracle = CommandStatusOracle::new(&config.status_command, config.status_timeout())?;
    let control = BirdClient::new(&config.control_socket, config.control_timeout());
    let mut reconciler = Reconciler::new(config.reconciler_config(), oracle, control);

    if args.once {
        return Ok(reconciler.tick().await.exit_code());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    reconciler.run(shutdown_rx).await?;
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, only SIGINT will stop the loop");
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("received SIGINT, shutting down"),
                Err(e) => {
                    error!(error = %e, "cannot listen for SIGINT either, loop runs until killed");
                    std::future::pending::<()>().await;
                }
            }
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => info!("received SIGINT, shutting down"),
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGINT, waiting for SIGTERM");
                terminate.recv().await;
                info!("received SIGTERM, shutting down");
            }
        },
        _ = terminate.recv() => info!("received SIGTERM, shutting down"),
    }
}
