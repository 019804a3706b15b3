//! Smart router and turn orchestration

pub mod discovery;
pub mod nudge;
pub mod router;

pub use discovery::{discovery_meta_tool, DiscoveryPort, RouterDiscovery, DISCOVER_TOOLS_NAME};
pub use router::SmartRouter;
