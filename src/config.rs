use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One blocklist filter stanza.
#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    /// Local path or URL of the ruleset.
    pub source: String,

    /// Refresh period as a duration literal (`50ms`, `30s`, `5m`, `1h`,
    /// or bare seconds). Unset disables periodic refresh.
    #[serde(default)]
    pub period: Option<String>,

    /// Where remote payloads are persisted. Defaults to a uniquely named
    /// file in the system temp directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Whether the remote payload is base64-encoded.
    #[serde(default)]
    pub base64: bool,
}

impl FilterConfig {
    pub fn refresh_period(&self) -> Result<Duration> {
        match &self.period {
            Some(text) => parse_duration(text)
                .with_context(|| format!("invalid period {text:?} for source {}", self.source)),
            None => Ok(Duration::ZERO),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub filters: Vec<FilterConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        Ok(config)
    }
}

/// Parses Go-style duration literals: `300ms`, `10s`, `5m`, `2h`, or a bare
/// number of seconds.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    if text.is_empty() {
        bail!("empty duration");
    }

    let (value, unit) = match text.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => text.split_at(idx),
        None => (text, "s"),
    };
    let value: f64 = value.parse().context("duration has no numeric value")?;

    let unit_ms = match unit {
        "ms" => 1.0,
        "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        other => bail!("unknown duration unit {other:?}"),
    };

    Ok(Duration::from_millis((value * unit_ms) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("50ms").unwrap(), Duration::from_millis(50));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10y").is_err());
    }

    #[test]
    fn test_filter_config_defaults() {
        let config: Config = toml::from_str(
            r#"
            [[filters]]
            source = "https://lists.example/ads.txt"
            "#,
        )
        .unwrap();

        let filter = &config.filters[0];
        assert_eq!(filter.source, "https://lists.example/ads.txt");
        assert_eq!(filter.refresh_period().unwrap(), Duration::ZERO);
        assert!(filter.cache_dir.is_none());
        assert!(!filter.base64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_stanza() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            level = "debug"

            [[filters]]
            source = "https://lists.example/ads.b64"
            period = "12h"
            cache_dir = "/var/cache/rulegate"
            base64 = true
            "#,
        )
        .unwrap();

        let filter = &config.filters[0];
        assert_eq!(
            filter.refresh_period().unwrap(),
            Duration::from_secs(12 * 3600)
        );
        assert_eq!(
            filter.cache_dir.as_deref(),
            Some(Path::new("/var/cache/rulegate"))
        );
        assert!(filter.base64);
        assert_eq!(config.logging.level, "debug");
    }
}
