//! Process-wide `tracing` subscriber setup.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the filter directives, e.g. `nnadapt=trace`.
pub const ENV_LOG: &str = "NNADAPT_LOG";

const DEFAULT_LOG_LEVEL: &str = "warn";

static LOGGING_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Installs a fmt subscriber filtered by `NNADAPT_LOG`.
///
/// Calling it more than once, or after another subscriber was installed by
/// the host application, leaves the existing subscriber in place.
pub fn init_logging() {
    LOGGING_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_env(ENV_LOG)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
        let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_keeps_first_subscriber() {
        init_logging();
        init_logging();
        assert!(LOGGING_INITIALIZED.get().is_some());
        tracing::warn!(target: "nnadapt::logging", "subscriber installed once");
    }
}
