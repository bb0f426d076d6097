use crate::{
    config::Settings, detector::Detector, labels::load_labels, ort_detector::OrtDetector,
    routes::api_routes,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};

#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<dyn Detector>,
    pub labels: Arc<Vec<String>>,
}

pub async fn start_server(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    // Fail fast: a service without a loadable model has nothing to serve.
    let detector = OrtDetector::new(&config.model)?;
    let labels = load_labels(&config.model.get_labels_path())?;
    tracing::info!("Loaded {} class labels", labels.len());

    let state = AppState {
        detector: Arc::new(detector),
        labels: Arc::new(labels),
    };

    let router = api_routes().with_state(state);

    let addr = config.server.get_address();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Inference service listening on {}", &addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
