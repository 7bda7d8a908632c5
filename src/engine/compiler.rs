use super::matcher::HostMatcher;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("failed to read ruleset file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Handle on the storage backing a compiled ruleset.
///
/// Held by exactly one [`CompiledRuleSet`] and released when that set is
/// dropped, which happens only after it has been superseded and the last
/// concurrent lookup has let go of it.
#[derive(Debug)]
pub struct RuleStorage {
    paths: Vec<PathBuf>,
    bytes: u64,
}

impl RuleStorage {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for RuleStorage {
    fn drop(&mut self) {
        debug!(paths = ?self.paths, bytes = self.bytes, "releasing ruleset storage");
    }
}

/// An immutable compiled ruleset. Exactly one is current per engine.
#[derive(Debug)]
pub struct CompiledRuleSet {
    matcher: HostMatcher,
    storage: RuleStorage,
    generation: u64,
}

impl CompiledRuleSet {
    pub(crate) fn new(matcher: HostMatcher, storage: RuleStorage, generation: u64) -> Self {
        Self {
            matcher,
            storage,
            generation,
        }
    }

    pub fn matcher(&self) -> &HostMatcher {
        &self.matcher
    }

    pub fn storage(&self) -> &RuleStorage {
        &self.storage
    }

    /// Monotonic id assigned by the owning engine at swap time.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Compiles ruleset files into a matcher and its storage handle.
///
/// Pure beyond reading the given files; callers run this outside any lock so
/// large rulesets never stall concurrent lookups.
pub async fn compile(paths: &[PathBuf]) -> Result<(HostMatcher, RuleStorage), CompileError> {
    let mut text = String::new();
    let mut bytes = 0u64;

    for path in paths {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CompileError::Read {
                path: path.clone(),
                source,
            })?;
        bytes += contents.len() as u64;
        text.push_str(&contents);
        if !text.ends_with('\n') {
            text.push('\n');
        }
    }

    let matcher = HostMatcher::from_lines(text.lines());
    debug!(
        rules = matcher.len(),
        bytes,
        files = paths.len(),
        "compiled ruleset"
    );

    let storage = RuleStorage {
        paths: paths.to_vec(),
        bytes,
    };
    Ok((matcher, storage))
}
