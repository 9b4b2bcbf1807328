use std::{net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, signal};
use tracing::info;

use xtts_core::{
    derive_latents, select_device, AudioPostProcessor, EnergySilenceDetector, ModelHost, ModelPaths,
    ServiceOptions, SynthesisService,
};
use xtts_server::{build_router, config::ServerConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting Wolof XTTS server...");

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, model_root={}, trim_silence={}, timeout={}s",
        config.port,
        config.model_root.display(),
        config.trim_silence,
        config.request_timeout_secs
    );

    // Model and voice loading is blocking; failures here abort startup
    let service = tokio::task::spawn_blocking({
        let config = config.clone();
        move || -> anyhow::Result<SynthesisService> {
            let paths = ModelPaths::from_root(&config.model_root);
            let device = select_device(config.device)?;
            let host = ModelHost::load(&paths, device)?;
            let latents = derive_latents(&host, &paths.reference_audio)?;
            let post = AudioPostProcessor::new(EnergySilenceDetector::new(config.silence));
            Ok(SynthesisService::new(
                host,
                latents,
                post,
                ServiceOptions {
                    trim_silence: config.trim_silence,
                    scratch_dir: config.scratch_dir.clone(),
                },
            ))
        }
    })
    .await??;

    let state = AppState {
        service: Arc::new(service),
    };
    let app = build_router(state, &config);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
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
    info!("Shutdown signal received");
}
