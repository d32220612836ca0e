use std::process::ExitCode;

use chrono::Local;
use tracing::{error, info};

use nova_portal::{logging, start_server, AppState, Config};

#[tokio::main]
async fn main() -> ExitCode {
    // Logging first so config defaults and warnings are recorded
    let log_dir = Config::log_dir_from_env();
    if let Err(e) = logging::init_logging(&log_dir) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Keep the last week of log files
    match logging::cleanup_old_logs(&config.log_dir, Local::now().date_naive()) {
        Ok(0) => {}
        Ok(n) => info!("Removed {n} old log files"),
        Err(e) => error!("Failed to clean up old logs: {e}"),
    }

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize state: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = start_server(state, config.port).await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
