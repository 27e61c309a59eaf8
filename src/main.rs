use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tweet_capture_api::{
    install_prometheus_recorder, load_config, router, serve, setup_logging, AppState,
    ChromeCapture, Cli,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    info!("Starting tweet-capture-api v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;

    // Recorder must exist before metric handles are registered
    let prometheus = install_prometheus_recorder()?;

    let engine = Arc::new(ChromeCapture::new(config.clone()).await?);
    let state = AppState::new(engine.clone(), config.clone()).with_prometheus(prometheus);
    let app = router(Arc::new(state));

    let result = serve(&config, app, shutdown_signal()).await;

    info!("Shutting down...");
    engine.shutdown().await;

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("tweet-capture-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
