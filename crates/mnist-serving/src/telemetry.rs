//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Install the global subscriber. `RUST_LOG` overrides the default level.
pub fn init(format: LogFormat, verbose: bool) {
    let default_directive = if verbose {
        "mnist_serving=debug,tower_http=debug"
    } else {
        "mnist_serving=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = installed {
        eprintln!("tracing subscriber already installed: {e}");
    }
}
