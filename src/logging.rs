//! Diagnostic output for the `skein` binary and for embedders.
//!
//! Events go to stderr through a `fmt` subscriber so query results on
//! stdout stay parseable. The filter takes `EnvFilter` directives, for
//! example `warn`, `skein::net=debug` or `info,skein::graph=trace`.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{GraphError, Result};

/// Parses `directives` into a filter, naming the bad directive on failure.
pub fn log_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|err| GraphError::Config(format!("log level '{directives}': {err}")))
}

/// Installs the process-wide subscriber filtered by `directives`.
///
/// Fails if the directives do not parse or a subscriber is already set.
pub fn init_logging(directives: &str) -> Result<()> {
    fmt()
        .with_env_filter(log_filter(directives)?)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|err| GraphError::IllegalState(format!("logging already initialised: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse_per_module() {
        let filter = log_filter("warn,skein::net=debug").unwrap();
        assert!(filter.to_string().contains("skein::net=debug"));
        assert!(log_filter("off").is_ok());
    }

    #[test]
    fn bad_directives_name_the_input() {
        let err = log_filter("skein=loud").unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
        assert!(err.to_string().contains("skein=loud"), "got {err}");
    }
}
