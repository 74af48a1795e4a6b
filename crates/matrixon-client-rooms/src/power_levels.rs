// =============================================================================
// Matrixon Client SDK - Power Level Evaluation Module
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
//   Stateless permission checks against a room's m.room.power_levels state
//   event. Homeservers are not trusted to produce well-typed levels: any
//   stored value that is not a finite number is treated as absent and the
//   applicable default applies instead.
//
// =============================================================================

use std::sync::Arc;

use ruma::{OwnedUserId, RoomId, UserId};
use serde_json::Value;
use tracing::{debug, instrument};

use matrixon_client_common::{Error, Result};

use crate::state::RoomStateAccess;

/// Moderation and notification actions gated by top-level power-level fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevelAction {
    /// Ban a user (`ban`, default 50)
    Ban,
    /// Invite a user (`invite`, default 0)
    Invite,
    /// Kick a user (`kick`, default 50)
    Kick,
    /// Redact events sent by others (`redact`, default 50)
    RedactEvents,
    /// Send state events generally (`state_default`, default 50)
    SendState,
    /// Send timeline events generally (`events_default`, default 50)
    SendEvents,
    /// Trigger an @room notification (`notifications.room`, default 50)
    NotifyRoom,
}

impl PowerLevelAction {
    fn field(&self) -> &'static str {
        match self {
            PowerLevelAction::Ban => "ban",
            PowerLevelAction::Invite => "invite",
            PowerLevelAction::Kick => "kick",
            PowerLevelAction::RedactEvents => "redact",
            PowerLevelAction::SendState => "state_default",
            PowerLevelAction::SendEvents => "events_default",
            PowerLevelAction::NotifyRoom => "room",
        }
    }

    fn default_level(&self) -> f64 {
        match self {
            PowerLevelAction::Invite => 0.0,
            _ => 50.0,
        }
    }
}

/// Result of a power-level change-bounds calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLevelBounds {
    /// Whether the caller may modify the target's power level at all.
    pub can_modify: bool,
    /// Highest level the caller may assign to the target (0 when
    /// modification is denied, except when self-targeting).
    pub maximum_possible_level: f64,
}

/// A stored level is usable only when it is a finite number; anything else
/// (quoted strings, objects, null) falls through to the default.
fn finite_level(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|level| level.is_finite())
}

fn resolved_user_level(power_levels: &Value, user_id: &UserId) -> f64 {
    finite_level(
        power_levels
            .get("users")
            .and_then(|users| users.get(user_id.as_str())),
    )
    .or_else(|| finite_level(power_levels.get("users_default")))
    .unwrap_or(0.0)
}

/// Power-level permission evaluation for a client instance.
pub struct RoomPermissions {
    state: Arc<dyn RoomStateAccess>,
    user_id: OwnedUserId,
}

impl RoomPermissions {
    /// `user_id` is the client's own user, used as the caller in
    /// change-bounds calculations.
    pub fn new(state: Arc<dyn RoomStateAccess>, user_id: OwnedUserId) -> Self {
        Self { state, user_id }
    }

    async fn power_levels(&self, room_id: &RoomId) -> Result<Value> {
        self.state
            .get_room_state_event(room_id, "m.room.power_levels", "")
            .await
            .map_err(|_| Error::NoPowerLevelEvent)
    }

    /// Whether `user_id` may send `event_type` in `room_id`.
    ///
    /// Required level resolution: `events[event_type]` when numeric, else
    /// `state_default`/`events_default` when numeric, else 50.
    #[instrument(skip(self))]
    pub async fn user_has_power_level_for(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        event_type: &str,
        is_state: bool,
    ) -> Result<bool> {
        let power_levels = self.power_levels(room_id).await?;

        let default_field = if is_state { "state_default" } else { "events_default" };
        let required = finite_level(
            power_levels
                .get("events")
                .and_then(|events| events.get(event_type)),
        )
        .or_else(|| finite_level(power_levels.get(default_field)))
        .unwrap_or(50.0);
        let user_level = resolved_user_level(&power_levels, user_id);

        debug!(
            "🔧 Power check: {} at {} needs {} for {}",
            user_id, user_level, required, event_type
        );
        Ok(user_level >= required)
    }

    /// Whether `user_id` may perform `action` in `room_id`.
    #[instrument(skip(self))]
    pub async fn user_has_power_level_for_action(
        &self,
        user_id: &UserId,
        room_id: &RoomId,
        action: PowerLevelAction,
    ) -> Result<bool> {
        let power_levels = self.power_levels(room_id).await?;

        let stored = match action {
            PowerLevelAction::NotifyRoom => {
                power_levels.pointer("/notifications/room")
            }
            _ => power_levels.get(action.field()),
        };
        let required = finite_level(stored).unwrap_or_else(|| action.default_level());
        let user_level = resolved_user_level(&power_levels, user_id);

        Ok(user_level >= required)
    }

    /// The bounds within which the calling user may change the power level
    /// of `target_user_id`.
    ///
    /// Self-targeting is always permitted up to the caller's own level (this
    /// is what enables self-demotion); modifying anyone else additionally
    /// requires a strictly higher level than the target's.
    #[instrument(skip(self))]
    pub async fn calculate_power_level_change_bounds_on(
        &self,
        target_user_id: &UserId,
        room_id: &RoomId,
    ) -> Result<PowerLevelBounds> {
        let power_levels = self.power_levels(room_id).await?;

        let my_level = resolved_user_level(&power_levels, &self.user_id);
        let target_level = resolved_user_level(&power_levels, target_user_id);
        let required_to_modify =
            finite_level(power_levels.get("state_default")).unwrap_or(50.0);

        if target_user_id.as_str() == self.user_id.as_str() {
            return Ok(PowerLevelBounds {
                can_modify: my_level >= required_to_modify,
                maximum_possible_level: my_level,
            });
        }

        if my_level < required_to_modify {
            return Ok(PowerLevelBounds {
                can_modify: false,
                maximum_possible_level: 0.0,
            });
        }

        // Allowed to send the power-levels event at all; modifying a peer
        // additionally requires outranking them, but the assignable ceiling
        // stays at the caller's own level either way.
        Ok(PowerLevelBounds {
            can_modify: my_level > target_level,
            maximum_possible_level: my_level,
        })
    }
}
