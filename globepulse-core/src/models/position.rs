use serde::{Deserialize, Serialize};

use super::SessionId;

/// Region code substituted when the upstream edge could not resolve one.
pub const UNKNOWN_REGION: &str = "Unknown";

/// A session's geographic position, set exactly once at admission and
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: SessionId,
    pub lat: f64,
    pub lng: f64,
    pub region: String,
}

/// Geolocation input supplied by the upstream edge for one inbound
/// connection. Every field may be absent; a geolocation failure must not
/// prevent participation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInput {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub region: Option<String>,
}

impl GeoInput {
    /// Build the immutable position record, substituting sentinels for
    /// anything the edge failed to resolve.
    #[must_use]
    pub fn into_position(self, id: SessionId) -> Position {
        Position {
            id,
            lat: self.latitude.unwrap_or(0.0),
            lng: self.longitude.unwrap_or(0.0),
            region: self
                .region
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| UNKNOWN_REGION.to_string()),
        }
    }

    /// The region to count a visit against, or `None` when it is
    /// unresolved. Unresolved regions must not pollute aggregate counts,
    /// and an empty string counts as unresolved.
    #[must_use]
    pub fn resolved_region(&self) -> Option<&str> {
        self.region.as_deref().filter(|r| !r.is_empty())
    }
}
