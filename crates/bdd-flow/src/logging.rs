//! `tracing` subscriber setup for hosts embedding the run orchestrator.
//!
//! Logs go to stderr so they never interleave with reports a host writes to
//! stdout.

use tracing_subscriber::EnvFilter;

use crate::config::RunnerConfig;

fn filter_from_config(config: &RunnerConfig) -> EnvFilter {
    EnvFilter::new(config.log_level.as_filter_str())
}

/// Installs a compact stderr subscriber filtered at the configured level.
///
/// The level comes from [`RunnerConfig::log_level`], which
/// [`RunnerConfig::from_env`] reads from `BDD_FLOW_LOG_LEVEL` and
/// [`RunnerConfig::apply_overrides`] may replace.
///
/// If a global subscriber is already set this function leaves it in place;
/// the first subscriber wins.
pub fn init_logging(config: &RunnerConfig) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_from_config(config))
        .with_writer(std::io::stderr)
        .compact()
        .with_target(true)
        .without_time()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
