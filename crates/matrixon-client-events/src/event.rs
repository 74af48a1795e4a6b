// =============================================================================
// Matrixon Client SDK - Event Envelope Module
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
//   Immutable envelope around raw room-event payloads. The homeserver is not
//   trusted to produce well-typed fields, so every accessor is total: a
//   missing or mistyped field reads as absent, never as an error.
//
// =============================================================================

use serde_json::Value;

/// Immutable envelope around a raw room-event payload.
///
/// The raw form stays retrievable for the lifetime of the envelope, even
/// after a decryption pass has rewritten the logical type and content of the
/// event elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    raw: Value,
}

impl RoomEvent {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The raw payload as received (and possibly annotated by the
    /// preprocessing pipeline before this envelope was created).
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn event_type(&self) -> Option<&str> {
        self.raw.get("type").and_then(Value::as_str)
    }

    pub fn state_key(&self) -> Option<&str> {
        self.raw.get("state_key").and_then(Value::as_str)
    }

    pub fn sender(&self) -> Option<&str> {
        self.raw.get("sender").and_then(Value::as_str)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.raw.get("event_id").and_then(Value::as_str)
    }

    pub fn content(&self) -> Option<&Value> {
        self.raw.get("content")
    }

    /// `content.membership`, for `m.room.member` events.
    pub fn membership(&self) -> Option<&str> {
        self.raw
            .pointer("/content/membership")
            .and_then(Value::as_str)
    }

    /// `unsigned.age` in milliseconds. Non-numeric values read as absent.
    pub fn unsigned_age(&self) -> Option<f64> {
        self.raw.pointer("/unsigned/age").and_then(Value::as_f64)
    }

    /// Whether this is a state event (any `state_key`, including "").
    pub fn is_state(&self) -> bool {
        self.raw.get("state_key").map_or(false, Value::is_string)
    }
}

fn age_of(event: &Value) -> Option<f64> {
    event.pointer("/unsigned/age").and_then(Value::as_f64)
}

/// Select the most recent `m.room.member` event for `user_id` from a batch.
///
/// Candidates are membership events whose `state_key` equals `user_id` and
/// which pass the extra `accept` filter. `unsigned.age` counts milliseconds
/// since the event occurred, so the smallest age wins; ties go to the first
/// occurrence in the batch. An event without `unsigned.age` stays eligible
/// (it compares as oldest), so a lone ageless candidate is still selected.
pub fn most_recent_membership_event<'a>(
    events: &'a [Value],
    user_id: &str,
    accept: impl Fn(&Value) -> bool,
) -> Option<&'a Value> {
    let mut best: Option<(&Value, f64)> = None;
    for event in events {
        if event.get("type").and_then(Value::as_str) != Some("m.room.member") {
            continue;
        }
        if event.get("state_key").and_then(Value::as_str) != Some(user_id) {
            continue;
        }
        if !accept(event) {
            continue;
        }
        let age = age_of(event).unwrap_or(f64::INFINITY);
        match best {
            Some((_, best_age)) if age >= best_age => {}
            _ => best = Some((event, age)),
        }
    }
    best.map(|(event, _)| event)
}
