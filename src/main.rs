use std::process::ExitCode;
use std::sync::Arc;

use storegate::config::{load_config, schema_json};
use storegate::startup;
use storegate::utils::logger::init_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    if std::env::args().any(|arg| arg == "--schema") {
        return match schema_json() {
            Ok(schema) => {
                println!("{}", schema);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to render config schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    info!(
        "{} {} starting with '{}' store",
        config.logging.service_name,
        config.logging.service_version,
        store_kind(&config)
    );

    match startup::run(Arc::new(config)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn store_kind(config: &storegate::config::ConfigV1) -> &'static str {
    match config.store.backend {
        storegate::config::StoreBackend::Memory => "memory",
        storegate::config::StoreBackend::MongoDB(_) => "mongo",
    }
}
