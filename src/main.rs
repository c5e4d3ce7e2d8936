use f1_mcp_server::config::ServerConfig;
use f1_mcp_server::handlers::SERVER_NAME;
use f1_mcp_server::server::McpServer;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the JSON-RPC stream; logs go to stderr only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        name = SERVER_NAME,
        version = env!("CARGO_PKG_VERSION"),
        ergast = %config.ergast_base_url,
        openf1 = %config.openf1_base_url,
        cache_enabled = config.cache_enabled,
        cache_dir = %config.cache_dir.display(),
        "starting"
    );

    let server = match McpServer::new(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("startup failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run().await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }

    tracing::info!("end of input, shutting down");
}
