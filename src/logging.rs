use std::panic;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::Config;

const DEFAULT_FILTER: &str = "warn";

/// Installs the global tracing subscriber and a panic hook that logs panics.
///
/// `RUST_LOG` takes precedence over the configured filter. Logs go to the configured file, or
/// to stderr when there is none.
pub fn initialize_logger(config: &Config) -> Result<(), String> {
    let directives = filter_directives(config, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| format!("invalid log filter {:?}: {}", directives, e))?;

    let installed = match &config.log_file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {}", path.display(), e))?;
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        None => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    };
    installed.map_err(|e| format!("unable to set global default subscriber: {}", e))?;

    install_panic_hook();

    tracing::debug!(filter = %directives, "logger initialized");
    Ok(())
}

fn filter_directives(config: &Config, rust_log: Option<String>) -> String {
    rust_log
        .filter(|value| !value.trim().is_empty())
        .or_else(|| config.log_filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn install_panic_hook() {
    let default_panic_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let payload = panic_info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown");

        let location = panic_info
            .location()
            .unwrap_or_else(|| panic::Location::caller());

        tracing::error!(
            location = tracing::field::display(location),
            "Panic occurred: {}", message
        );

        default_panic_hook(panic_info);
    }));
}
