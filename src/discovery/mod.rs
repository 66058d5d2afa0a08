mod agent;
mod dedup;
mod stats;

pub use agent::{AgentSettings, DiscoveryAgent, DiscoveryRun, RunMode};
pub use stats::DiscoveryStats;
