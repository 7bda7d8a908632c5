use crate::engine::RuleEngine;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use std::sync::Arc;
use tracing::debug;

/// The decision point the hosting resolver plugs in front of its pipeline.
///
/// Only address questions (`A`/`AAAA`) are eligible for filtering; every
/// other question type passes through without consulting the engine.
/// Carries no state of its own beyond the rule origin used as a
/// correlation token in diagnostics.
pub struct BlockFilter {
    rule: String,
    engine: Arc<dyn RuleEngine>,
}

impl BlockFilter {
    pub fn new(rule: impl Into<String>, engine: Arc<dyn RuleEngine>) -> Self {
        Self {
            rule: rule.into(),
            engine,
        }
    }

    /// Whether the hosting resolver should short-circuit this query.
    pub fn should_filter(&self, msg: &Message) -> bool {
        let Some(query) = msg.queries().first() else {
            return false;
        };
        match query.query_type() {
            RecordType::A | RecordType::AAAA => {}
            _ => return false,
        }

        let matched = self.engine.lookup(msg);
        debug!(filter = %self.view_name(), name = %query.name(), matched, "filter decision");
        matched
    }

    /// Identification token for per-instance diagnostics.
    pub fn view_name(&self) -> String {
        format!("rulegate/{}", self.rule)
    }

    /// Starts the engine's background refresh loop.
    pub fn start(&self) {
        self.engine.run();
    }

    /// Shuts the engine down; subsequent queries pass through unfiltered.
    pub fn stop(&self) {
        self.engine.shutdown();
    }
}
