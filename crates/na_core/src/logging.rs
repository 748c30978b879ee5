use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install the fmt subscriber on stderr, once per process.
///
/// `level` overrides `RUST_LOG`; both fall back to `info`. An invalid
/// directive falls back to `info` as well.
pub fn init_logging(level: Option<&str>) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    INIT.call_once(|| {
        let filter = match level {
            Some(level) => EnvFilter::try_new(level).ok(),
            None => EnvFilter::try_from_default_env().ok(),
        }
        .unwrap_or_else(|| EnvFilter::new("info"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
