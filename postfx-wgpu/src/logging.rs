//! Logger setup for hosts and tests that do not install their own `log` backend.

use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` names one. Target creation and pipeline
/// builds log at info; wgpu's own crates are noisy below warn.
pub const DEFAULT_FILTER: &str = "postfx_wgpu=info,wgpu_core=warn,wgpu_hal=warn";

/// `env_filter` uses the `env_logger` filter syntax, e.g. "postfx_wgpu=debug,wgpu_core=warn".
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            env_filter: Some(filter.into()),
            ..Self::default()
        }
    }
}

/// Pick the filter string: the config's, then a non-empty `env`, then [`DEFAULT_FILTER`].
pub fn resolve_filter(config: &LoggingConfig, env: Option<String>) -> String {
    config
        .env_filter
        .clone()
        .or_else(|| env.filter(|f| !f.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

static INIT: Once = Once::new();

/// Install `env_logger` once per process. A logger the host installed first wins.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = resolve_filter(&config, std::env::var("RUST_LOG").ok());
        let installed = env_logger::Builder::new()
            .parse_filters(&filter)
            .write_style(config.write_style)
            .format_timestamp_millis()
            .try_init()
            .is_ok();
        if installed {
            log::debug!("postfx logging filter: {filter}");
        }
    });
}
