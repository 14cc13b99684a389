//! Pi-cam-server binary.

use std::sync::Arc;

use pi_cam_server::config::Config;
use pi_cam_server::recognition::RecognitionError;
use pi_cam_server::traits::CameraError;
use pi_cam_server::{router, AppState, CameraSession, RecognitionMode, V4L2Device, VisionClient};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("camera initialize failure: {0}")]
    Camera(#[from] CameraError),
    #[error("recognition client failure: {0}")]
    Recognition(#[from] RecognitionError),
    #[error("listener failure: {0}")]
    Listen(#[source] std::io::Error),
    #[error("server failure: {0}")]
    Serve(#[source] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pi_cam_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Error: {err}");
            std::process::exit(1);
        }
    };

    // Without a camera or a socket there is nothing to serve: start over.
    loop {
        match run(&config).await {
            Ok(()) => break,
            Err(err) => {
                error!(retry_in = ?config.startup_retry, "{err}");
                tokio::time::sleep(config.startup_retry).await;
            }
        }
    }

    info!("Server shutdown complete");
}

async fn run(config: &Config) -> Result<(), StartupError> {
    let device = V4L2Device::open(config.camera.device_index)?
        .with_timeout(config.camera.capture_timeout);
    let camera = CameraSession::initialize(device, &config.camera)?;
    info!("camera initialize success");

    let recognition = match &config.recognition {
        Some(settings) => {
            info!(
                endpoint = %settings.endpoint,
                every = settings.sample_every.get(),
                timeout = ?settings.timeout,
                "text recognition enabled"
            );
            Some(RecognitionMode {
                recognizer: Arc::new(VisionClient::new(settings)?),
                sample_every: settings.sample_every,
            })
        }
        None => {
            info!("text recognition disabled");
            None
        }
    };

    let app = router(AppState::new(camera, recognition));

    let listener = TcpListener::bind(config.server.addr())
        .await
        .map_err(StartupError::Listen)?;
    let addr = listener.local_addr().map_err(StartupError::Listen)?;
    info!("camera starting: http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}
