// Diagnostics go to stderr so they never mix with prompts or command output.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins when set; otherwise only
/// warnings are shown, or everything from this crate at debug level when
/// `debug` is true.
pub fn init(debug: bool) {
    let fallback = if debug { "warn,skectl=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
