use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use webhooker::api::create_router;
use webhooker::error::WebhookerError;
use webhooker::logging::{TracingSink, setup_logging};
use webhooker::notify::{BarkNotifier, Notifier};
use webhooker::{AppState, load_config};

const DEFAULT_CONFIG_PATH: &str = "webhooker.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), WebhookerError> {
    dotenv::dotenv().ok();

    // An explicitly named config file must exist; the default one is optional
    let (config_path, required) = match std::env::var("WEBHOOKER_CONFIG") {
        Ok(path) => (PathBuf::from(path), true),
        Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };
    let config = load_config(&config_path, required)?;

    let _log_guard = setup_logging(&config.logging)?;

    let notifier: Option<Arc<dyn Notifier>> = if config.notify.is_enabled() {
        Some(Arc::new(BarkNotifier::new(&config.notify)?))
    } else {
        warn!("No Bark token configured (notify.token / BARK_TOKEN); notifications are disabled");
        None
    };

    let bind_address = config.server.bind_address.clone();
    let state = Arc::new(AppState {
        config,
        notifier,
        sink: Arc::new(TracingSink),
    });

    let app = create_router(state);

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", bind_address, e))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
