//! Opt-in JSON logging to stdout.

use std::sync::Once;

use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

static INIT: Once = Once::new();

/// Installs a process-wide subscriber that writes JSON events to stdout,
/// filtered via the `LOG` environment variable (default: info). Events
/// emitted through the `log` crate are captured as well.
///
/// Only the first call has any effect; later calls return immediately.
pub fn configure(service_name: impl Into<String>) {
    let service_name = service_name.into();
    INIT.call_once(move || {
        LogTracer::init().expect("Installing log bridge");

        let filter = EnvFilter::try_from_env("LOG").unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(service_name, std::io::stdout));

        set_global_default(subscriber).expect("Installing subscriber");
    });
}
