//! Ephemeral per-peer presence: names, colors and live cursors.
//!
//! Presence never goes through the document store. Peers broadcast
//! [`PresenceMessage`]s over whatever channel the host provides and the
//! roster keeps the latest state per peer. Time is passed in explicitly so
//! the roster stays deterministic.

use crate::config::EngineConfig;
use crate::shapes::SerializableColor;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opacity a stale cursor fades down to.
pub const STALE_CURSOR_OPACITY: f64 = 0.3;

/// What a peer shares about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceState {
    pub peer_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "SerializableColor::black")]
    pub color: SerializableColor,
    /// Cursor in world coordinates, if the pointer is over the canvas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
}

impl PresenceState {
    pub fn new(peer_id: u64, name: impl Into<String>, color: SerializableColor) -> Self {
        Self {
            peer_id,
            name: name.into(),
            color,
            cursor: None,
        }
    }
}

/// Messages exchanged on the presence channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceMessage {
    Update {
        #[serde(flatten)]
        state: PresenceState,
    },
    Leave {
        #[serde(rename = "peerId")]
        peer_id: u64,
    },
}

impl PresenceMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone)]
struct PeerEntry {
    state: PresenceState,
    last_seen_ms: u64,
}

/// A remote cursor ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorView {
    pub peer_id: u64,
    pub name: String,
    pub color: SerializableColor,
    pub position: Point,
    pub opacity: f64,
}

/// Remote peers keyed by peer id.
#[derive(Debug, Clone)]
pub struct PresenceRoster {
    local_peer: u64,
    peers: HashMap<u64, PeerEntry>,
    stale_ms: u64,
    fade_ms: u64,
    timeout_ms: u64,
}

impl PresenceRoster {
    /// Create a roster that ignores messages from `local_peer`.
    pub fn new(local_peer: u64, config: &EngineConfig) -> Self {
        Self {
            local_peer,
            peers: HashMap::new(),
            stale_ms: config.presence_stale_ms,
            fade_ms: config.presence_fade_ms,
            timeout_ms: config.presence_timeout_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn get(&self, peer_id: u64) -> Option<&PresenceState> {
        self.peers.get(&peer_id).map(|p| &p.state)
    }

    /// Record a peer's latest state.
    pub fn update(&mut self, state: PresenceState, now_ms: u64) {
        if state.peer_id == self.local_peer {
            return;
        }
        let entry = self.peers.entry(state.peer_id).or_insert_with(|| {
            log::debug!("Peer {} joined presence", state.peer_id);
            PeerEntry {
                state: state.clone(),
                last_seen_ms: now_ms,
            }
        });
        entry.state = state;
        entry.last_seen_ms = entry.last_seen_ms.max(now_ms);
    }

    pub fn remove(&mut self, peer_id: u64) -> bool {
        self.peers.remove(&peer_id).is_some()
    }

    /// Apply a message received on the presence channel.
    pub fn handle(&mut self, message: PresenceMessage, now_ms: u64) {
        match message {
            PresenceMessage::Update { state } => self.update(state, now_ms),
            PresenceMessage::Leave { peer_id } => {
                self.remove(peer_id);
            }
        }
    }

    /// Drop peers not heard from within the timeout. Returns their ids.
    pub fn prune(&mut self, now_ms: u64) -> Vec<u64> {
        let timeout = self.timeout_ms;
        let expired: Vec<u64> = self
            .peers
            .iter()
            .filter(|(_, p)| now_ms.saturating_sub(p.last_seen_ms) > timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            log::debug!("Peer {id} timed out");
            self.peers.remove(id);
        }
        expired
    }

    /// Cursor opacity for a peer: 1 while fresh, then a linear fade to
    /// [`STALE_CURSOR_OPACITY`].
    pub fn opacity(&self, peer_id: u64, now_ms: u64) -> Option<f64> {
        let peer = self.peers.get(&peer_id)?;
        let age = now_ms.saturating_sub(peer.last_seen_ms);
        if age <= self.stale_ms {
            return Some(1.0);
        }
        if age >= self.stale_ms.saturating_add(self.fade_ms) {
            return Some(STALE_CURSOR_OPACITY);
        }
        let t = (age - self.stale_ms) as f64 / self.fade_ms as f64;
        Some(1.0 - t * (1.0 - STALE_CURSOR_OPACITY))
    }

    /// Cursors of live peers, ordered by peer id.
    pub fn cursors(&self, now_ms: u64) -> Vec<CursorView> {
        let mut views: Vec<CursorView> = self
            .peers
            .values()
            .filter(|p| now_ms.saturating_sub(p.last_seen_ms) <= self.timeout_ms)
            .filter_map(|p| {
                let position = p.state.cursor?;
                Some(CursorView {
                    peer_id: p.state.peer_id,
                    name: p.state.name.clone(),
                    color: p.state.color,
                    position,
                    opacity: self.opacity(p.state.peer_id, now_ms)?,
                })
            })
            .collect();
        views.sort_by_key(|v| v.peer_id);
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> PresenceRoster {
        PresenceRoster::new(1, &EngineConfig::default())
    }

    fn peer(id: u64, x: f64) -> PresenceState {
        let mut state = PresenceState::new(id, format!("peer {id}"), SerializableColor::white());
        state.cursor = Some(Point::new(x, 10.0));
        state
    }

    #[test]
    fn test_ignores_local_peer() {
        let mut r = roster();
        r.update(peer(1, 0.0), 0);
        assert!(r.is_empty());
    }

    #[test]
    fn test_cursor_fades_then_drops() {
        let mut r = roster();
        r.update(peer(2, 5.0), 1_000);

        assert_eq!(r.opacity(2, 3_000), Some(1.0));
        // Halfway through the fade window.
        let mid = r.opacity(2, 1_000 + 3_000 + 2_500).unwrap();
        assert!((mid - 0.65).abs() < 1e-9);
        assert_eq!(r.opacity(2, 20_000), Some(STALE_CURSOR_OPACITY));

        assert!(r.prune(20_000).is_empty());
        assert_eq!(r.prune(40_000), vec![2]);
        assert!(r.cursors(40_000).is_empty());
    }

    #[test]
    fn test_cursors_sorted_and_skip_hidden() {
        let mut r = roster();
        r.update(peer(5, 1.0), 0);
        r.update(peer(3, 2.0), 0);
        r.update(PresenceState::new(4, "idle", SerializableColor::black()), 0);
        let ids: Vec<u64> = r.cursors(100).iter().map(|c| c.peer_id).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn test_out_of_order_update_keeps_latest_time() {
        let mut r = roster();
        r.update(peer(2, 0.0), 5_000);
        r.update(peer(2, 9.0), 4_000);
        assert_eq!(r.opacity(2, 8_000), Some(1.0));
        assert_eq!(r.get(2).unwrap().cursor, Some(Point::new(9.0, 10.0)));
    }

    #[test]
    fn test_message_json() {
        let msg = PresenceMessage::Update { state: peer(7, 1.5) };
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"update\""));
        assert!(json.contains("\"peerId\":7"));
        assert_eq!(PresenceMessage::from_json(&json).unwrap(), msg);

        let mut r = roster();
        r.handle(msg, 0);
        r.handle(PresenceMessage::from_json(r#"{"type":"leave","peerId":7}"#).unwrap(), 1);
        assert!(r.is_empty());
    }
}
