pub mod presence;
pub mod region_stats;
pub mod registry;

pub use presence::{PresenceHandle, PresenceHub, StatsOverview};
pub use region_stats::RegionStatsStore;
pub use registry::{PeerSender, Registry, SendFailed, Session};
