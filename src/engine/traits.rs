use hickory_proto::op::Message;

/// Capability surface the filter adapter needs from a rule engine.
///
/// Kept narrow so adapters can be exercised against test doubles without
/// standing up a fetcher or compiling a real ruleset.
#[async_trait::async_trait]
pub trait RuleEngine: Send + Sync {
    /// Returns true if the query's hostname is present in the current ruleset.
    fn lookup(&self, msg: &Message) -> bool;

    /// Starts the background refresh loop, if a refresh period is configured.
    fn run(&self);

    /// Fetches, compiles and swaps in a fresh ruleset.
    async fn reload(&self) -> anyhow::Result<()>;

    /// Cancels the lifecycle token; background tasks exit.
    fn shutdown(&self);
}
