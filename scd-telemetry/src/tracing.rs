use std::sync::Once;

use scd_config::Environment;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that turns on log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

/// Crates whose events are logged at `info` unless `RUST_LOG` says otherwise.
const DEFAULT_LOG_TARGETS: &[&str] = &["scd", "scd_postgres", "scd_config"];

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for a binary.
///
/// The filter comes from `RUST_LOG` and defaults to `info` for the application and the `scd`
/// crates. Events are written as JSON in the `prod` environment and in a human-readable format
/// otherwise.
pub fn init_tracing(app_name: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(app_name));
    let registry = tracing_subscriber::registry().with(filter);

    match Environment::load() {
        Ok(Environment::Prod) => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
        _ => registry.with(fmt::layer()).try_init(),
    }
}

/// Installs a test subscriber if `ENABLE_TRACING` is set.
///
/// Safe to call from every test; only the first call has an effect. Output goes through the test
/// writer so that it is captured per test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var_os(ENABLE_TRACING_ENV_NAME).is_none() {
            return;
        }

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

fn default_filter(app_name: &str) -> EnvFilter {
    let directives = std::iter::once(app_name.replace('-', "_"))
        .chain(DEFAULT_LOG_TARGETS.iter().map(|target| target.to_string()))
        .map(|target| format!("{target}=info"))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::new(directives)
}
