//! WebSocket endpoint for visitor presence.
//!
//! Each accepted upgrade becomes one session: geolocation is taken from
//! the headers the upstream edge sets, the session is admitted through
//! the presence hub, and the socket is split into a writer task fed by
//! the hub and a read loop that only watches for close or error.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use globepulse_core::models::{GeoInput, SessionId};

use crate::server::AppState;

/// Geolocation headers set by the upstream network edge.
pub const GEO_LATITUDE_HEADER: &str = "x-geo-latitude";
pub const GEO_LONGITUDE_HEADER: &str = "x-geo-longitude";
pub const GEO_REGION_HEADER: &str = "x-geo-region";

/// WebSocket handler for the live presence roster
pub async fn websocket_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let geo = geo_from_headers(&headers);
    ws.max_message_size(state.presence.max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, geo))
}

/// Extract geolocation input from edge headers.
///
/// Absent, blank or unparsable values become `None`; a geolocation
/// failure must never reject the connection.
fn geo_from_headers(headers: &HeaderMap) -> GeoInput {
    let field = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    GeoInput {
        latitude: field(GEO_LATITUDE_HEADER).and_then(|v| v.parse().ok()),
        longitude: field(GEO_LONGITUDE_HEADER).and_then(|v| v.parse().ok()),
        region: field(GEO_REGION_HEADER).map(str::to_string),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, geo: GeoInput) {
    let id = SessionId::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    if let Err(e) = state.hub.connect(id.clone(), geo, tx).await {
        warn!(session_id = %id, error = %e, "Admission failed, dropping connection");
        return;
    }
    info!(session_id = %id, "WebSocket session established");

    let (mut sink, mut stream) = socket.split();
    let send_timeout = Duration::from_millis(state.presence.send_timeout_ms);

    // Writer: forwards hub messages to the socket. Each write is bounded
    // by the send timeout so an unresponsive peer stalls nobody; the task
    // ends once the hub drops this session's sender.
    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let kind = msg.kind();
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    warn!(session_id = %writer_id, message_kind = kind, error = %e, "Failed to encode outgoing message");
                    continue;
                }
            };
            match tokio::time::timeout(send_timeout, sink.send(Message::Text(text.into()))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(session_id = %writer_id, message_kind = kind, error = %e, "WebSocket send failed");
                    break;
                }
                Err(_) => {
                    warn!(session_id = %writer_id, message_kind = kind, "WebSocket send timed out, treating peer as unresponsive");
                    break;
                }
            }
        }
    });

    // The presence protocol has no inbound messages; the read loop only
    // watches for close or transport error.
    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    debug!(session_id = %id, "WebSocket closed by peer");
                    break;
                }
                Some(Err(e)) => {
                    debug!(session_id = %id, error = %e, "WebSocket transport error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = &mut writer => break,
        }
    }

    state.hub.disconnect(id);
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_geo_from_full_headers() {
        let geo = geo_from_headers(&headers(&[
            (GEO_LATITUDE_HEADER, "52.52"),
            (GEO_LONGITUDE_HEADER, "-13.40"),
            (GEO_REGION_HEADER, "DE"),
        ]));
        assert_eq!(geo.latitude, Some(52.52));
        assert_eq!(geo.longitude, Some(-13.40));
        assert_eq!(geo.region.as_deref(), Some("DE"));
    }

    #[test]
    fn test_geo_from_missing_headers() {
        assert_eq!(geo_from_headers(&HeaderMap::new()), GeoInput::default());
    }

    #[test]
    fn test_geo_tolerates_unparsable_coordinates() {
        let geo = geo_from_headers(&headers(&[
            (GEO_LATITUDE_HEADER, "not-a-number"),
            (GEO_LONGITUDE_HEADER, "  "),
            (GEO_REGION_HEADER, "US"),
        ]));
        assert_eq!(geo.latitude, None);
        assert_eq!(geo.longitude, None);
        assert_eq!(geo.region.as_deref(), Some("US"));
    }
}
