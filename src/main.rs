use clap::Parser;
use gost_metrics::config::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Cli::parse().load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = gost_metrics::server::run(config) {
        tracing::error!("server exited: {err}");
        std::process::exit(1);
    }
}
