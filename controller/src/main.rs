use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::util::SubscriberInitExt;

use populator::NamespaceScope;
use populator_controller::{Config, Context, ControllerError, controller};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(60);

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Received shutdown signal, shutting down populator controller...");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    populator_controller::tracing::subscriber().init();
    let config = Config::load().map_err(ControllerError::from)?;

    let mut builder = populator::Client::builder();
    builder.name(&config.name);
    if let NamespaceScope::Named(namespace) = config.scope() {
        builder.namespace(namespace);
    }
    let client = builder.build().await.map_err(ControllerError::from)?;
    let ctx = Arc::new(Context::new(client, config));

    let stop = CancellationToken::new();
    let mut controller = tokio::spawn(controller::run(ctx, stop.clone().cancelled_owned()));

    tokio::select! {
        res = &mut controller => return Ok(res??),
        _ = shutdown_signal() => {}
    }
    stop.cancel();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, controller).await {
        Ok(res) => Ok(res??),
        Err(_) => {
            tracing::warn!("Shutdown timeout reached, shutting down forcefully");
            Err(ControllerError::ShutdownTimeout(SHUTDOWN_TIMEOUT).into())
        }
    }
}
