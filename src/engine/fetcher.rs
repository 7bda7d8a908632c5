use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::StreamExt;
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio_util::io::StreamReader;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport failure fetching {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected status {status} fetching {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("base64 decode of remote payload failed: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("failed to persist ruleset to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a ruleset comes from. Immutable after construction.
#[derive(Debug, Clone)]
pub enum RuleSource {
    /// A file already on disk; the path doubles as the cache path.
    Local { path: PathBuf },
    /// A remote list, persisted to `cache_path` on every fetch.
    Remote {
        url: Url,
        cache_path: PathBuf,
        base64: bool,
    },
}

impl RuleSource {
    /// Decides local vs remote from `source`: anything that parses as a URL
    /// with a scheme is remote, everything else is a local path.
    ///
    /// For remote sources the cache path is `cache_dir/<basename of url>`
    /// when a cache directory was configured, otherwise a uniquely named
    /// file in the system temp directory. The file is never deleted; it is
    /// reused as a boot-time fallback across restarts.
    pub fn new(source: &str, cache_dir: Option<&Path>, base64: bool) -> Self {
        let url = match Url::parse(source) {
            Ok(url) if !url.scheme().is_empty() && url.has_host() => url,
            _ => {
                return RuleSource::Local {
                    path: PathBuf::from(source),
                }
            }
        };

        let cache_path = match cache_dir {
            Some(dir) => {
                let basename = url
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|s| !s.is_empty())
                    .unwrap_or("rules.txt");
                dir.join(basename)
            }
            None => {
                let tag: u64 = rand::rng().random();
                std::env::temp_dir().join(format!("rulegate-{tag:016x}.txt"))
            }
        };

        RuleSource::Remote {
            url,
            cache_path,
            base64,
        }
    }

    /// The durable local copy later stages compile from.
    pub fn cache_path(&self) -> &Path {
        match self {
            RuleSource::Local { path } => path,
            RuleSource::Remote { cache_path, .. } => cache_path,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RuleSource::Remote { .. })
    }

    /// The configured origin, for diagnostics.
    pub fn origin(&self) -> String {
        match self {
            RuleSource::Local { path } => path.display().to_string(),
            RuleSource::Remote { url, .. } => url.to_string(),
        }
    }
}

/// Obtains ruleset bytes and persists them at the source's cache path.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("dns-rulegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Ensures an up-to-date local copy of the ruleset and returns its path.
    ///
    /// Local sources are passed through untouched. Remote sources are
    /// downloaded, optionally base64-decoded, and moved onto the cache path
    /// only once fully written, so a failed fetch never leaves a truncated
    /// or corrupt cache file behind.
    pub async fn acquire(&self, source: &RuleSource) -> Result<PathBuf, FetchError> {
        let (url, cache_path, base64) = match source {
            RuleSource::Local { path } => return Ok(path.clone()),
            RuleSource::Remote {
                url,
                cache_path,
                base64,
            } => (url, cache_path, *base64),
        };

        info!(url = %url, "downloading ruleset");
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        if let Some(parent) = cache_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Persist {
                    path: cache_path.clone(),
                    source,
                })?;
        }

        let part_path = cache_path.with_extension("part");
        let result = self.write_body(resp, &part_path, base64).await;
        if let Err(err) = result {
            // Never commit a partial download.
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(err);
        }

        tokio::fs::rename(&part_path, cache_path)
            .await
            .map_err(|source| FetchError::Persist {
                path: cache_path.clone(),
                source,
            })?;

        debug!(path = %cache_path.display(), "ruleset persisted");
        Ok(cache_path.clone())
    }

    async fn write_body(
        &self,
        resp: reqwest::Response,
        part_path: &Path,
        base64: bool,
    ) -> Result<(), FetchError> {
        let persist_err = |source: std::io::Error| FetchError::Persist {
            path: part_path.to_path_buf(),
            source,
        };

        if base64 {
            // Decode in one pass; remote encoders routinely wrap lines, so
            // strip ASCII whitespace first.
            let url = resp.url().to_string();
            let body = resp
                .bytes()
                .await
                .map_err(|source| FetchError::Transport { url, source })?;
            let mut encoded = Vec::with_capacity(body.len());
            encoded.extend(body.iter().filter(|b| !b.is_ascii_whitespace()));
            let decoded = STANDARD.decode(&encoded)?;
            tokio::fs::write(part_path, &decoded)
                .await
                .map_err(persist_err)?;
        } else {
            let stream = resp
                .bytes_stream()
                .map(|result| result.map_err(std::io::Error::other));
            let mut reader = BufReader::new(StreamReader::new(stream));
            let mut file = tokio::fs::File::create(part_path)
                .await
                .map_err(persist_err)?;
            tokio::io::copy_buf(&mut reader, &mut file)
                .await
                .map_err(persist_err)?;
            file.flush().await.map_err(persist_err)?;
        }

        Ok(())
    }
}
