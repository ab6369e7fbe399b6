use clinic_dashboard::app;
use clinic_dashboard::config::ServerConfig;
use std::env;

/// Starts the dashboard web server
///
/// Usage: `clinic-dashboard [addr] [static_dir]`, defaults `127.0.0.1:3000`
/// and `static`. Log level comes from `RUST_LOG` (default `info`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_args(env::args().skip(1));
    log::info!("Starting clinic dashboard on {}", config.addr);

    app::run(config).await
}
