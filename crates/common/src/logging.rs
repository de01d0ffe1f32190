//! Log output for vidjoin binaries.
//!
//! Events go to stderr so stdout stays free for command output. The filter
//! is `RUST_LOG` when set, otherwise [`filter_directives`].

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Target prefix shared by every workspace crate and the `vidjoin` binary.
const WORKSPACE_TARGET: &str = "vidjoin";

/// Filter string for `config`.
///
/// `verbose` raises vidjoin's own crates to `debug` while third-party
/// crates stay at the configured level. Per-crate directives already in
/// `config.level` are more specific and keep their level.
pub fn filter_directives(config: &LoggingConfig, verbose: bool) -> String {
    let level = config.level.trim();
    if !verbose || matches!(level, "debug" | "trace") {
        return level.to_string();
    }
    if level.is_empty() {
        return format!("{WORKSPACE_TARGET}=debug");
    }
    format!("{level},{WORKSPACE_TARGET}=debug")
}

/// Install the global subscriber. A second call leaves the first in place.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config, verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.with_target(verbose).try_init()
    };
    if installed.is_err() {
        tracing::debug!("Log subscriber already installed");
    }
}
