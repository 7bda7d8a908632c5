//! Startup helpers: logging setup and filter construction from config.

use crate::config::{Config, LoggingConfig};
use crate::engine::{FilterEngine, RuleSource};
use crate::filter::BlockFilter;
use anyhow::{Context, Result};
use tracing::info;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Builds one engine and adapter per configured filter stanza.
///
/// Construction compiles each initial ruleset; any failure aborts startup,
/// so the hosting resolver never runs a filter with no ruleset behind it.
pub async fn build_filters(config: &Config) -> Result<Vec<BlockFilter>> {
    let mut filters = Vec::with_capacity(config.filters.len());

    for stanza in &config.filters {
        let period = stanza.refresh_period()?;
        let source = RuleSource::new(&stanza.source, stanza.cache_dir.as_deref(), stanza.base64);
        let engine = FilterEngine::new(source, period)
            .await
            .with_context(|| format!("failed to initialize filter for {}", stanza.source))?;

        info!(source = %stanza.source, period = ?period, "filter initialized");
        filters.push(BlockFilter::new(stanza.source.clone(), engine));
    }

    Ok(filters)
}
