use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Position, SessionId};

/// Messages fanned out to connected peers to keep their roster view in
/// sync with the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutgoingMessage {
    /// A session joined; carries its full position record.
    AddMarker { position: Position },

    /// A session left; peers drop it from their roster by id.
    RemoveMarker { id: SessionId },

    /// Snapshot of the all-time per-region visit counters.
    RegionStats { stats: HashMap<String, u64> },
}

impl OutgoingMessage {
    /// Message kind discriminant, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddMarker { .. } => "add-marker",
            Self::RemoveMarker { .. } => "remove-marker",
            Self::RegionStats { .. } => "region-stats",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_marker_wire_shape() {
        let msg = OutgoingMessage::AddMarker {
            position: Position {
                id: SessionId::from("abc"),
                lat: 1.5,
                lng: -2.5,
                region: "US".to_string(),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "add-marker");
        assert_eq!(json["position"]["id"], "abc");
        assert_eq!(json["position"]["region"], "US");
    }

    #[test]
    fn test_remove_marker_wire_shape() {
        let msg = OutgoingMessage::RemoveMarker {
            id: SessionId::from("abc"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "remove-marker");
        assert_eq!(json["id"], "abc");
    }

    #[test]
    fn test_region_stats_wire_shape() {
        let mut stats = HashMap::new();
        stats.insert("US".to_string(), 3u64);
        let msg = OutgoingMessage::RegionStats { stats };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "region-stats");
        assert_eq!(json["stats"]["US"], 3);
    }
}
