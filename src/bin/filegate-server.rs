use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use filegate::{FilesConfigStore, FilesGatewayState, GatewayConfig, GatewayKey, HttpFileBackend};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "filegate-server", about = "OpenAI-compatible files gateway")]
struct Args {
    /// Gateway config file (YAML) with files_settings and general_settings.
    config: Option<PathBuf>,

    #[arg(long, default_value = "127.0.0.1:4000")]
    listen: String,

    /// Default upstream base URL for the fixed-provider backend.
    #[arg(long)]
    api_base: Option<String>,

    /// Gateway key accepted as a bearer credential (repeatable).
    #[arg(long = "master-key")]
    master_keys: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => GatewayConfig::from_yaml_str(&std::fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    let store = Arc::new(FilesConfigStore::new());
    store.set_config(config.files_settings.as_ref())?;

    let mut backend = HttpFileBackend::new()?;
    if let Some(api_base) = args.api_base {
        backend = backend.with_api_base(api_base);
    }

    let mut state = FilesGatewayState::new(backend)
        .with_files_config(store)
        .with_batch_loadbalancing(
            config
                .general_settings
                .enable_loadbalancing_on_batch_endpoints,
        )
        .with_pool_models(config.general_settings.pool_models.clone());

    for (idx, token) in args
        .master_keys
        .into_iter()
        .chain(config.general_settings.master_key.into_iter())
        .enumerate()
    {
        state = state.with_gateway_key(GatewayKey::new(format!("key-{idx}"), token));
    }

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    tracing::info!(listen = %args.listen, "filegate listening");
    axum::serve(listener, filegate::http::router(state)).await?;

    Ok(())
}
