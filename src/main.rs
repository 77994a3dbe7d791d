use std::env;
use std::process::ExitCode;

use tracing::debug;

use systemd_metrics::config::Config;
use systemd_metrics::logging::init_logging;
use systemd_metrics::Engine;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = env::args().skip(1).collect();
    let Some((key, params)) = args.split_first() else {
        eprintln!("usage: systemd-metrics <item-key> [param ...]");
        return ExitCode::FAILURE;
    };
    let params: Vec<&str> = params.iter().map(String::as_str).collect();

    debug!(key = key.as_str(), ?params, "running item query");
    let engine = Engine::new(config);
    match engine.query(key, &params).await {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
