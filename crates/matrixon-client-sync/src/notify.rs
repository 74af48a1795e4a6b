// =============================================================================
// Matrixon Client SDK - Notification Channels Module
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
//   Domain notifications derived from sync deltas, broadcast to subscribers.
//   Each variant corresponds to one named channel of the client's event
//   surface.
//
// =============================================================================

use ruma::OwnedRoomId;
use serde_json::Value;

use matrixon_client_events::RoomEvent;

/// A domain notification emitted by the sync engine.
#[derive(Debug, Clone)]
pub enum ClientNotification {
    /// Non-room account data (`account_data`)
    AccountData { event: Value },
    /// Per-room account data (`room.account_data`)
    RoomAccountData { room_id: OwnedRoomId, event: Value },
    /// The client left (or was removed from) a room (`room.leave`)
    RoomLeave {
        room_id: OwnedRoomId,
        event: RoomEvent,
    },
    /// The client was invited to a room (`room.invite`)
    RoomInvite {
        room_id: OwnedRoomId,
        event: RoomEvent,
    },
    /// The client joined a room (`room.join`), at most once per room per
    /// client instance
    RoomJoin { room_id: OwnedRoomId },
    /// Any timeline event in a joined room (`room.event`)
    RoomEvent {
        room_id: OwnedRoomId,
        event: RoomEvent,
    },
    /// An `m.room.message` timeline event (`room.message`)
    RoomMessage {
        room_id: OwnedRoomId,
        event: RoomEvent,
    },
    /// The room was tombstoned (`room.archived`)
    RoomArchived {
        room_id: OwnedRoomId,
        event: RoomEvent,
    },
    /// The room is the successor of an upgraded room (`room.upgraded`)
    RoomUpgraded {
        room_id: OwnedRoomId,
        event: RoomEvent,
    },
    /// Unstable group membership (`unstable.group.join`)
    GroupJoin { group_id: String, info: Value },
    /// Unstable group membership (`unstable.group.leave`)
    GroupLeave { group_id: String, info: Value },
    /// Unstable group membership (`unstable.group.invite`)
    GroupInvite { group_id: String, info: Value },
}

impl ClientNotification {
    /// The wire name of the channel this notification belongs to.
    pub fn channel(&self) -> &'static str {
        match self {
            ClientNotification::AccountData { .. } => "account_data",
            ClientNotification::RoomAccountData { .. } => "room.account_data",
            ClientNotification::RoomLeave { .. } => "room.leave",
            ClientNotification::RoomInvite { .. } => "room.invite",
            ClientNotification::RoomJoin { .. } => "room.join",
            ClientNotification::RoomEvent { .. } => "room.event",
            ClientNotification::RoomMessage { .. } => "room.message",
            ClientNotification::RoomArchived { .. } => "room.archived",
            ClientNotification::RoomUpgraded { .. } => "room.upgraded",
            ClientNotification::GroupJoin { .. } => "unstable.group.join",
            ClientNotification::GroupLeave { .. } => "unstable.group.leave",
            ClientNotification::GroupInvite { .. } => "unstable.group.invite",
        }
    }
}
