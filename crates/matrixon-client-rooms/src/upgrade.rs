// =============================================================================
// Matrixon Client SDK - Room Upgrade History Module
// =============================================================================
//
// Project: Matrixon Client SDK - High Performance Matrix Client Sync Engine
// Author: arkSong (arksong2018@gmail.com) - Founder of Matrixon Innovation Project
// Contributors: Matrixon Development Team
// Date: 2025-06-15
// Version: 0.11.0-alpha
// License: Apache 2.0 / MIT
//
// Description:
//   Resolves a room's upgrade lineage by walking the predecessor chain
//   backward through m.room.create events and the replacement chain forward
//   through m.room.tombstone events. Room graphs in the wild contain cycles
//   and self-references, so both walks carry a visited set and truncate with
//   a single terminal marker when a room repeats.
//
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use ruma::{EventId, OwnedEventId, OwnedRoomId, RoomId};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use matrixon_client_common::Result;

use crate::state::{find_state_event, RoomStateAccess};

/// Safety cap on chain length. Legitimate chains are bounded by the visited
/// set; this only guards against pathological state payloads.
const MAX_CHAIN_LENGTH: usize = 512;

/// One node in a room's upgrade lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUpgradeLink {
    pub room_id: OwnedRoomId,
    /// Room version from the node's creation event ("1" when unspecified).
    pub version: String,
    /// The event evidencing the transition into this node: the tombstone of
    /// a predecessor when walking backward, the creation event of a
    /// successor when walking forward. `None` at the end of a chain and on
    /// cycle-truncating terminal nodes.
    pub ref_event_id: Option<OwnedEventId>,
}

/// A room's resolved upgrade lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUpgradeHistory {
    /// Predecessors, nearest first.
    pub previous: Vec<RoomUpgradeLink>,
    pub current: RoomUpgradeLink,
    /// Successors, nearest first.
    pub newer: Vec<RoomUpgradeLink>,
}

fn version_of(create_content: &Value) -> String {
    create_content
        .get("room_version")
        .and_then(Value::as_str)
        .unwrap_or("1")
        .to_owned()
}

fn room_id_at(value: Option<&Value>) -> Option<OwnedRoomId> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| RoomId::parse(raw).ok())
}

fn event_id_of(event: &Value) -> Option<OwnedEventId> {
    event
        .get("event_id")
        .and_then(Value::as_str)
        .and_then(|raw| EventId::parse(raw).ok())
}

/// Walks room upgrade graphs through the room-state collaborator.
pub struct UpgradeWalker {
    state: Arc<dyn RoomStateAccess>,
}

impl UpgradeWalker {
    pub fn new(state: Arc<dyn RoomStateAccess>) -> Self {
        Self { state }
    }

    /// Resolve the full upgrade lineage of `starting_room_id`.
    ///
    /// Failing to read the state of a predecessor or successor ends that
    /// side of the chain without error; only a missing creation event on the
    /// starting room itself fails the whole call.
    #[instrument(skip(self))]
    pub async fn get_room_upgrade_history(
        &self,
        starting_room_id: &RoomId,
    ) -> Result<RoomUpgradeHistory> {
        let create = self
            .state
            .get_room_state_event(starting_room_id, "m.room.create", "")
            .await?;
        let version = version_of(&create);
        let current = RoomUpgradeLink {
            room_id: starting_room_id.to_owned(),
            version: version.clone(),
            ref_event_id: None,
        };

        let first_predecessor = room_id_at(create.pointer("/predecessor/room_id"));
        let previous = self
            .walk_backward(starting_room_id, &version, first_predecessor)
            .await;
        let newer = self.walk_forward(starting_room_id, &version).await;

        debug!(
            "✅ Upgrade history for {}: {} older, {} newer",
            starting_room_id,
            previous.len(),
            newer.len()
        );
        Ok(RoomUpgradeHistory {
            previous,
            current,
            newer,
        })
    }

    async fn walk_backward(
        &self,
        starting_room_id: &RoomId,
        starting_version: &str,
        first_predecessor: Option<OwnedRoomId>,
    ) -> Vec<RoomUpgradeLink> {
        let mut visited: HashMap<OwnedRoomId, String> = HashMap::new();
        visited.insert(starting_room_id.to_owned(), starting_version.to_owned());

        let mut previous = Vec::new();
        let mut next = first_predecessor;

        while let Some(room_id) = next.take() {
            if previous.len() >= MAX_CHAIN_LENGTH {
                warn!("⚠️ Predecessor chain exceeded {} rooms, stopping", MAX_CHAIN_LENGTH);
                break;
            }
            if let Some(version) = visited.get(&room_id) {
                // Cycle: include the repeating room once as a terminal
                // marker, then stop.
                previous.push(RoomUpgradeLink {
                    room_id: room_id.clone(),
                    version: version.clone(),
                    ref_event_id: None,
                });
                break;
            }

            let state = match self.state.get_room_state(&room_id).await {
                Ok(state) => state,
                Err(err) => {
                    debug!("🔧 Predecessor chain ends at {}: {}", room_id, err);
                    break;
                }
            };

            let ref_event_id =
                find_state_event(&state, "m.room.tombstone", "").and_then(event_id_of);
            let create = find_state_event(&state, "m.room.create", "");
            let version = create
                .and_then(|event| event.get("content"))
                .map(version_of)
                .unwrap_or_else(|| "1".to_owned());
            next = create
                .and_then(|event| event.pointer("/content/predecessor/room_id"))
                .and_then(Value::as_str)
                .and_then(|raw| RoomId::parse(raw).ok());

            visited.insert(room_id.clone(), version.clone());
            previous.push(RoomUpgradeLink {
                room_id,
                version,
                ref_event_id,
            });
        }
        previous
    }

    async fn walk_forward(
        &self,
        starting_room_id: &RoomId,
        starting_version: &str,
    ) -> Vec<RoomUpgradeLink> {
        let mut visited: HashMap<OwnedRoomId, String> = HashMap::new();
        visited.insert(starting_room_id.to_owned(), starting_version.to_owned());

        let mut newer = Vec::new();
        let mut next = match self
            .state
            .get_room_state_event(starting_room_id, "m.room.tombstone", "")
            .await
        {
            Ok(tombstone) => room_id_at(tombstone.get("replacement_room")),
            Err(_) => None,
        };

        while let Some(room_id) = next.take() {
            if newer.len() >= MAX_CHAIN_LENGTH {
                warn!("⚠️ Replacement chain exceeded {} rooms, stopping", MAX_CHAIN_LENGTH);
                break;
            }
            if let Some(version) = visited.get(&room_id) {
                newer.push(RoomUpgradeLink {
                    room_id: room_id.clone(),
                    version: version.clone(),
                    ref_event_id: None,
                });
                break;
            }

            let state = match self.state.get_room_state(&room_id).await {
                Ok(state) => state,
                Err(err) => {
                    debug!("🔧 Replacement chain ends at {}: {}", room_id, err);
                    break;
                }
            };

            // Creating the successor room is what evidences the forward
            // link, so the reference is its creation event.
            let create = find_state_event(&state, "m.room.create", "");
            let ref_event_id = create.and_then(event_id_of);
            let version = create
                .and_then(|event| event.get("content"))
                .map(version_of)
                .unwrap_or_else(|| "1".to_owned());
            next = find_state_event(&state, "m.room.tombstone", "")
                .and_then(|event| event.pointer("/content/replacement_room"))
                .and_then(Value::as_str)
                .and_then(|raw| RoomId::parse(raw).ok());

            visited.insert(room_id.clone(), version.clone());
            newer.push(RoomUpgradeLink {
                room_id,
                version,
                ref_event_id,
            });
        }
        newer
    }
}
