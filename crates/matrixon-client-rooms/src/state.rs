//! Room-state collaborator boundary
//!
//! The power-level evaluator and upgrade walker only need two lookups:
//! a room's full state and a single state event's content. Production
//! clients back this with homeserver calls; tests and tooling use the
//! in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use ruma::{OwnedRoomId, RoomId};
use serde_json::Value;
use tokio::sync::RwLock;

use matrixon_client_common::{Error, Result};

/// Read access to room state.
#[async_trait]
pub trait RoomStateAccess: Send + Sync {
    /// The room's full current state as raw state events. Fails when the
    /// room's state is unavailable (unknown room, empty state).
    async fn get_room_state(&self, room_id: &RoomId) -> Result<Vec<Value>>;

    /// The content of one state event. Fails when no event matches
    /// `(event_type, state_key)`.
    async fn get_room_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Result<Value>;
}

/// Locate a state event in a raw state batch by `(type, state_key)`.
pub(crate) fn find_state_event<'a>(
    state: &'a [Value],
    event_type: &str,
    state_key: &str,
) -> Option<&'a Value> {
    state.iter().find(|event| {
        event.get("type").and_then(Value::as_str) == Some(event_type)
            && event.get("state_key").and_then(Value::as_str) == Some(state_key)
    })
}

/// In-memory room state, keyed by room id.
#[derive(Default)]
pub struct MemoryRoomState {
    rooms: RwLock<HashMap<OwnedRoomId, Vec<Value>>>,
}

impl MemoryRoomState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a room's state with the given raw state events.
    pub async fn set_room_state(&self, room_id: OwnedRoomId, state: Vec<Value>) {
        self.rooms.write().await.insert(room_id, state);
    }
}

#[async_trait]
impl RoomStateAccess for MemoryRoomState {
    async fn get_room_state(&self, room_id: &RoomId) -> Result<Vec<Value>> {
        let rooms = self.rooms.read().await;
        match rooms.get(room_id) {
            Some(state) if !state.is_empty() => Ok(state.clone()),
            _ => Err(Error::StateUnavailable(room_id.to_string())),
        }
    }

    async fn get_room_state_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        state_key: &str,
    ) -> Result<Value> {
        let rooms = self.rooms.read().await;
        let state = rooms
            .get(room_id)
            .ok_or_else(|| Error::StateUnavailable(room_id.to_string()))?;
        find_state_event(state, event_type, state_key)
            .and_then(|event| event.get("content"))
            .cloned()
            .ok_or_else(|| {
                Error::StateNotFound(format!("{event_type}/{state_key} in {room_id}"))
            })
    }
}
