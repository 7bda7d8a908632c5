mod compiler;
mod fetcher;
mod manager;
mod matcher;
mod traits;

pub use compiler::{compile, CompileError, CompiledRuleSet, RuleStorage};
pub use fetcher::{FetchError, RuleSource, SourceFetcher};
pub use manager::{EngineError, FilterEngine};
pub use matcher::HostMatcher;
pub use traits::RuleEngine;
