//! Blocklist rule engine for DNS resolvers.
//!
//! `dns-rulegate` manages the lifecycle of a domain blocklist inside a
//! hickory-based resolver: it acquires a ruleset from a local file or a
//! remote URL, compiles it into a fast hostname matcher, serves concurrent
//! lookups against the current matcher, and hot-swaps in freshly fetched
//! rulesets on a schedule without stalling in-flight lookups.
//!
//! The hosting resolver talks to a [`filter::BlockFilter`]: it asks
//! `should_filter(msg)` per query and calls `start()`/`stop()` around the
//! server lifecycle. Everything behind that surface (fetching, compiling,
//! swapping) lives in [`engine`].

pub mod config;
pub mod engine;
pub mod filter;
pub mod init;

pub use config::{Config, FilterConfig};
pub use engine::{FilterEngine, RuleEngine};
pub use filter::BlockFilter;
