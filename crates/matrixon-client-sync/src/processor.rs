// =============================================================================
// Matrixon Client SDK - Sync Delta Processor Module
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
//   Turns one raw /sync response into a deterministic, deduplicated stream
//   of domain notifications. Every substructure of the body is optional:
//   missing objects and empty arrays are normal, never errors. Processing
//   order is fixed: account data, groups, left rooms, invited rooms, joined
//   rooms, then the device-data hand-off to the encryption engine.
//
// =============================================================================

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use ruma::{OwnedRoomId, OwnedUserId, RoomId};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use matrixon_client_common::Result;
use matrixon_client_e2ee::{CryptoEngine, EncryptionGate, SyncCryptoUpdate};
use matrixon_client_events::{
    most_recent_membership_event, EventKind, EventPreprocessor, PreprocessorChain, RoomEvent,
};

use crate::notify::ClientNotification;

const EMPTY_EVENTS: &[Value] = &[];

fn events_at<'a>(value: &'a Value, pointer: &str) -> &'a [Value] {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map_or(EMPTY_EVENTS, Vec::as_slice)
}

fn section_rooms<'a>(
    raw: &'a Value,
    section: &str,
) -> impl Iterator<Item = (OwnedRoomId, &'a Value)> {
    raw.pointer(&format!("/rooms/{section}"))
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(key, room)| match RoomId::parse(key) {
            Ok(room_id) => Some((room_id, room)),
            Err(err) => {
                warn!("⚠️ Ignoring malformed room id {key}: {err}");
                None
            }
        })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Sequential, non-reentrant processor for /sync response bodies.
///
/// Owns the joined-room tracking set that makes `room.join` an at-most-once
/// notification per room id for the lifetime of the client instance. The set
/// is insert-only: leaving a room does not evict it, so a later re-join
/// within the same instance is intentionally not re-announced.
pub struct SyncProcessor {
    user_id: OwnedUserId,
    preprocessors: PreprocessorChain,
    joined_rooms: HashSet<OwnedRoomId>,
    notifier: broadcast::Sender<ClientNotification>,
    crypto: EncryptionGate,
}

impl SyncProcessor {
    pub fn new(user_id: OwnedUserId, notification_buffer: usize) -> Self {
        let (notifier, _) = broadcast::channel(notification_buffer);
        Self {
            user_id,
            preprocessors: PreprocessorChain::new(),
            joined_rooms: HashSet::new(),
            notifier,
            crypto: EncryptionGate::disabled(),
        }
    }

    /// Attach an encryption engine; enables the per-sync device-data
    /// hand-off.
    pub fn set_crypto(&mut self, crypto: Arc<dyn CryptoEngine>) {
        self.crypto = EncryptionGate::with_engine(crypto);
    }

    pub fn add_preprocessor(&mut self, preprocessor: Box<dyn EventPreprocessor>) {
        self.preprocessors.add_preprocessor(preprocessor);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientNotification> {
        self.notifier.subscribe()
    }

    /// Record a room as already joined, suppressing a future `room.join`
    /// notification for it. Returns false when the room was already known.
    pub fn mark_joined(&mut self, room_id: OwnedRoomId) -> bool {
        self.joined_rooms.insert(room_id)
    }

    pub fn is_joined(&self, room_id: &RoomId) -> bool {
        self.joined_rooms.contains(room_id)
    }

    fn emit(&self, notification: ClientNotification) {
        debug!("🔧 Emitting {} notification", notification.channel());
        // Nobody listening is fine; the send only fails without receivers.
        let _ = self.notifier.send(notification);
    }

    /// Process one raw /sync response body.
    ///
    /// Safe to call with any subset of top-level keys present, nested
    /// objects present but empty, or events arrays present but empty.
    #[instrument(skip_all)]
    pub async fn process_sync(&mut self, raw: &Value) -> Result<()> {
        self.process_account_data(raw);
        self.process_groups(raw);
        self.process_left_rooms(raw);
        self.process_invited_rooms(raw);
        self.process_joined_rooms(raw).await;
        self.forward_crypto_data(raw).await
    }

    fn process_account_data(&self, raw: &Value) {
        for event in events_at(raw, "/account_data/events") {
            self.emit(ClientNotification::AccountData {
                event: event.clone(),
            });
        }
    }

    fn process_groups(&self, raw: &Value) {
        let sections: [(&str, fn(String, Value) -> ClientNotification); 3] = [
            ("leave", |group_id, info| ClientNotification::GroupLeave {
                group_id,
                info,
            }),
            ("join", |group_id, info| ClientNotification::GroupJoin {
                group_id,
                info,
            }),
            ("invite", |group_id, info| ClientNotification::GroupInvite {
                group_id,
                info,
            }),
        ];
        for (section, notification) in sections {
            let groups = raw
                .pointer(&format!("/groups/{section}"))
                .and_then(Value::as_object);
            for (group_id, info) in groups.into_iter().flatten() {
                self.emit(notification(group_id.clone(), info.clone()));
            }
        }
    }

    fn process_left_rooms(&self, raw: &Value) {
        for (room_id, room) in section_rooms(raw, "leave") {
            let timeline = events_at(room, "/timeline/events");
            if let Some(event) =
                most_recent_membership_event(timeline, self.user_id.as_str(), |_| true)
            {
                self.emit(ClientNotification::RoomLeave {
                    room_id: room_id.clone(),
                    event: RoomEvent::new(event.clone()),
                });
            }
            for event in events_at(room, "/account_data/events") {
                self.emit(ClientNotification::RoomAccountData {
                    room_id: room_id.clone(),
                    event: event.clone(),
                });
            }
        }
    }

    fn process_invited_rooms(&self, raw: &Value) {
        for (room_id, room) in section_rooms(raw, "invite") {
            let invite_state = events_at(room, "/invite_state/events");
            let invite =
                most_recent_membership_event(invite_state, self.user_id.as_str(), |event| {
                    event.pointer("/content/membership").and_then(Value::as_str)
                        == Some("invite")
                });
            if let Some(event) = invite {
                self.emit(ClientNotification::RoomInvite {
                    room_id,
                    event: RoomEvent::new(event.clone()),
                });
            }
        }
    }

    async fn process_joined_rooms(&mut self, raw: &Value) {
        for (room_id, room) in section_rooms(raw, "join") {
            if self.joined_rooms.insert(room_id.clone()) {
                self.emit(ClientNotification::RoomJoin {
                    room_id: room_id.clone(),
                });
            }

            for event in events_at(room, "/account_data/events") {
                self.emit(ClientNotification::RoomAccountData {
                    room_id: room_id.clone(),
                    event: event.clone(),
                });
            }

            for event in events_at(room, "/timeline/events") {
                let mut annotated = event.clone();
                if let Err(err) = self
                    .preprocessors
                    .process_event(&mut annotated, EventKind::RoomEvent)
                    .await
                {
                    warn!("⚠️ Preprocessor failed for event in {room_id}: {err}");
                }
                let event = RoomEvent::new(annotated);

                self.emit(ClientNotification::RoomEvent {
                    room_id: room_id.clone(),
                    event: event.clone(),
                });

                match event.event_type() {
                    Some("m.room.message") => {
                        self.emit(ClientNotification::RoomMessage {
                            room_id: room_id.clone(),
                            event: event.clone(),
                        });
                    }
                    Some("m.room.tombstone") if event.state_key() == Some("") => {
                        self.emit(ClientNotification::RoomArchived {
                            room_id: room_id.clone(),
                            event: event.clone(),
                        });
                    }
                    Some("m.room.create") => {
                        let has_predecessor = event
                            .raw()
                            .pointer("/content/predecessor")
                            .map_or(false, |predecessor| !predecessor.is_null());
                        if has_predecessor {
                            self.emit(ClientNotification::RoomUpgraded {
                                room_id: room_id.clone(),
                                event: event.clone(),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// Forward device-related sync data to the encryption engine. Invoked
    /// whenever an engine is configured, with empty values when the body
    /// carries none, and awaited before `process_sync` returns.
    async fn forward_crypto_data(&self, raw: &Value) -> Result<()> {
        if !self.crypto.is_enabled() {
            return Ok(());
        }

        let mut one_time_key_counts = BTreeMap::new();
        if let Some(counts) = raw
            .get("device_one_time_keys_count")
            .and_then(Value::as_object)
        {
            for (algorithm, count) in counts {
                if let Some(count) = count.as_u64() {
                    one_time_key_counts.insert(algorithm.clone(), count);
                }
            }
        }

        let update = SyncCryptoUpdate {
            to_device_events: events_at(raw, "/to_device/events").to_vec(),
            one_time_key_counts,
            unused_fallback_key_types: string_list(raw.get("device_unused_fallback_key_types")),
            changed_device_users: string_list(raw.pointer("/device_lists/changed")),
            left_device_users: string_list(raw.pointer("/device_lists/left")),
        };
        self.crypto.update_sync_data(update).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ruma::{room_id, user_id};
    use serde_json::json;
    use tokio::sync::Mutex;

    use super::*;

    fn processor() -> SyncProcessor {
        SyncProcessor::new(user_id!("@me:example.org").to_owned(), 256)
    }

    fn drain(
        receiver: &mut broadcast::Receiver<ClientNotification>,
    ) -> Vec<ClientNotification> {
        let mut notifications = Vec::new();
        while let Ok(notification) = receiver.try_recv() {
            notifications.push(notification);
        }
        notifications
    }

    fn channels(notifications: &[ClientNotification]) -> Vec<&'static str> {
        notifications.iter().map(|n| n.channel()).collect()
    }

    fn member_event(user: &str, membership: &str, age: Option<i64>) -> Value {
        let mut event = json!({
            "type": "m.room.member",
            "state_key": user,
            "sender": user,
            "content": { "membership": membership },
        });
        if let Some(age) = age {
            event["unsigned"] = json!({ "age": age });
        }
        event
    }

    #[tokio::test]
    async fn test_empty_and_partial_bodies_are_fine() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor.process_sync(&json!({})).await.unwrap();
        processor
            .process_sync(&json!({
                "rooms": {},
                "account_data": {},
                "groups": { "join": {} },
            }))
            .await
            .unwrap();
        processor
            .process_sync(&json!({
                "rooms": { "join": { "!a:example.org": { "timeline": { "events": [] } } } },
            }))
            .await
            .unwrap();

        // The only emission is the join for !a.
        let notifications = drain(&mut receiver);
        assert_eq!(channels(&notifications), vec!["room.join"]);
    }

    #[tokio::test]
    async fn test_join_notified_at_most_once() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        let body = json!({
            "rooms": { "join": { "!dup:example.org": {} } },
        });
        processor.process_sync(&body).await.unwrap();
        processor.process_sync(&body).await.unwrap();

        let notifications = drain(&mut receiver);
        assert_eq!(channels(&notifications), vec!["room.join"]);
    }

    #[tokio::test]
    async fn test_prepopulated_join_is_suppressed() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        assert!(processor.mark_joined(room_id!("!known:example.org").to_owned()));
        assert!(processor.is_joined(room_id!("!known:example.org")));

        processor
            .process_sync(&json!({
                "rooms": { "join": { "!known:example.org": {} } },
            }))
            .await
            .unwrap();

        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn test_leave_selects_smallest_age() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "rooms": { "leave": { "!bye:example.org": { "timeline": { "events": [
                    member_event("@me:example.org", "leave", Some(2)),
                    member_event("@me:example.org", "leave", Some(1)),
                    member_event("@me:example.org", "leave", Some(3)),
                ] } } } },
            }))
            .await
            .unwrap();

        let notifications = drain(&mut receiver);
        assert_eq!(channels(&notifications), vec!["room.leave"]);
        let ClientNotification::RoomLeave { event, .. } = &notifications[0] else {
            panic!("expected a leave notification");
        };
        assert_eq!(event.unsigned_age(), Some(1.0));
    }

    #[tokio::test]
    async fn test_no_matching_member_event_no_leave() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "rooms": { "leave": { "!bye:example.org": { "timeline": { "events": [
                    member_event("@other:example.org", "leave", Some(1)),
                    { "type": "m.room.message", "content": { "body": "bye" } },
                ] } } } },
            }))
            .await
            .unwrap();

        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn test_leave_room_account_data_still_emitted() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "rooms": { "leave": { "!bye:example.org": {
                    "timeline": { "events": [] },
                    "account_data": { "events": [
                        { "type": "m.tag", "content": { "tags": {} } },
                    ] },
                } } },
            }))
            .await
            .unwrap();

        let notifications = drain(&mut receiver);
        assert_eq!(channels(&notifications), vec!["room.account_data"]);
    }

    #[tokio::test]
    async fn test_invite_requires_invite_membership() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "rooms": { "invite": {
                    "!come:example.org": { "invite_state": { "events": [
                        member_event("@me:example.org", "join", Some(1)),
                        member_event("@me:example.org", "invite", Some(5)),
                    ] } },
                    "!nothing:example.org": { "invite_state": { "events": [
                        member_event("@other:example.org", "invite", Some(1)),
                    ] } },
                } },
            }))
            .await
            .unwrap();

        let notifications = drain(&mut receiver);
        assert_eq!(channels(&notifications), vec!["room.invite"]);
        let ClientNotification::RoomInvite { room_id, event } = &notifications[0] else {
            panic!("expected an invite notification");
        };
        assert_eq!(room_id.as_str(), "!come:example.org");
        assert_eq!(event.membership(), Some("invite"));
    }

    #[tokio::test]
    async fn test_joined_timeline_emissions() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "rooms": { "join": { "!active:example.org": { "timeline": { "events": [
                    { "type": "m.room.message", "content": { "msgtype": "m.text", "body": "hi" } },
                    { "type": "m.room.topic", "state_key": "", "content": { "topic": "x" } },
                    { "type": "m.room.tombstone", "state_key": "",
                      "content": { "replacement_room": "!next:example.org" } },
                    { "type": "m.room.create", "state_key": "",
                      "content": { "predecessor": { "room_id": "!prev:example.org" } } },
                ] } } } },
            }))
            .await
            .unwrap();

        let notifications = drain(&mut receiver);
        assert_eq!(
            channels(&notifications),
            vec![
                "room.join",
                "room.event",
                "room.message",
                "room.event",
                "room.event",
                "room.archived",
                "room.event",
                "room.upgraded",
            ]
        );
    }

    #[tokio::test]
    async fn test_tombstone_without_empty_state_key_not_archival() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "rooms": { "join": { "!odd:example.org": { "timeline": { "events": [
                    { "type": "m.room.tombstone", "state_key": "not-empty", "content": {} },
                    { "type": "m.room.create", "state_key": "", "content": { "predecessor": null } },
                ] } } } },
            }))
            .await
            .unwrap();

        let notifications = drain(&mut receiver);
        assert_eq!(
            channels(&notifications),
            vec!["room.join", "room.event", "room.event"]
        );
    }

    #[tokio::test]
    async fn test_preprocessor_runs_before_inspection() {
        struct Upgrader;

        #[async_trait]
        impl EventPreprocessor for Upgrader {
            fn supported_event_types(&self) -> Vec<String> {
                vec!["m.custom.wrapped".to_string()]
            }

            async fn process_event(&self, event: &mut Value, _kind: EventKind) -> Result<()> {
                event["type"] = json!("m.room.message");
                event["content"] = json!({ "msgtype": "m.text", "body": "unwrapped" });
                Ok(())
            }
        }

        let mut processor = processor();
        processor.add_preprocessor(Box::new(Upgrader));
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "rooms": { "join": { "!wrapped:example.org": { "timeline": { "events": [
                    { "type": "m.custom.wrapped", "content": {} },
                ] } } } },
            }))
            .await
            .unwrap();

        let notifications = drain(&mut receiver);
        // The rewritten type makes the event count as a message.
        assert_eq!(
            channels(&notifications),
            vec!["room.join", "room.event", "room.message"]
        );
    }

    #[tokio::test]
    async fn test_account_data_and_groups_order() {
        let mut processor = processor();
        let mut receiver = processor.subscribe();

        processor
            .process_sync(&json!({
                "account_data": { "events": [
                    { "type": "m.direct", "content": {} },
                ] },
                "groups": {
                    "leave": { "+bye:example.org": { "profile": {} } },
                    "join": { "+hi:example.org": { "profile": {} } },
                    "invite": { "+maybe:example.org": { "profile": {} } },
                },
            }))
            .await
            .unwrap();

        let notifications = drain(&mut receiver);
        assert_eq!(
            channels(&notifications),
            vec![
                "account_data",
                "unstable.group.leave",
                "unstable.group.join",
                "unstable.group.invite",
            ]
        );
    }

    struct RecordingCrypto {
        updates: Mutex<Vec<SyncCryptoUpdate>>,
    }

    #[async_trait]
    impl CryptoEngine for RecordingCrypto {
        async fn is_room_encrypted(&self, _room_id: &RoomId) -> Result<bool> {
            Ok(false)
        }

        async fn decrypt_room_event(&self, event: &Value, _room_id: &RoomId) -> Result<Value> {
            Ok(event.clone())
        }

        async fn encrypt_room_event(
            &self,
            _room_id: &RoomId,
            _event_type: &str,
            content: &Value,
        ) -> Result<Value> {
            Ok(content.clone())
        }

        async fn update_sync_data(&self, update: SyncCryptoUpdate) -> Result<()> {
            self.updates.lock().await.push(update);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_crypto_handoff_always_invoked() {
        let crypto = Arc::new(RecordingCrypto {
            updates: Mutex::new(Vec::new()),
        });
        let mut processor = processor();
        processor.set_crypto(crypto.clone());

        // Body with no device data at all: the engine is still called.
        processor.process_sync(&json!({})).await.unwrap();

        processor
            .process_sync(&json!({
                "to_device": { "events": [ { "type": "m.room_key_request", "content": {} } ] },
                "device_one_time_keys_count": { "signed_curve25519": 49, "bogus": "nope" },
                "device_unused_fallback_key_types": ["signed_curve25519"],
                "device_lists": {
                    "changed": ["@friend:example.org"],
                    "left": ["@gone:example.org"],
                },
            }))
            .await
            .unwrap();

        let updates = crypto.updates.lock().await;
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], SyncCryptoUpdate::default());

        assert_eq!(updates[1].to_device_events.len(), 1);
        assert_eq!(updates[1].one_time_key_counts["signed_curve25519"], 49);
        assert!(!updates[1].one_time_key_counts.contains_key("bogus"));
        assert_eq!(updates[1].changed_device_users, vec!["@friend:example.org"]);
        assert_eq!(updates[1].left_device_users, vec!["@gone:example.org"]);
    }

    #[tokio::test]
    async fn test_full_body_emission_order_is_deterministic() {
        let body = json!({
            "next_batch": "s1",
            "account_data": { "events": [ { "type": "m.push_rules", "content": {} } ] },
            "groups": { "join": { "+g:example.org": {} } },
            "rooms": {
                "leave": { "!left:example.org": {
                    "timeline": { "events": [ member_event("@me:example.org", "leave", Some(1)) ] },
                    "account_data": { "events": [ { "type": "m.tag", "content": {} } ] },
                } },
                "invite": { "!asked:example.org": {
                    "invite_state": { "events": [ member_event("@me:example.org", "invite", None) ] },
                } },
                "join": { "!home:example.org": {
                    "account_data": { "events": [ { "type": "m.fully_read", "content": {} } ] },
                    "timeline": { "events": [
                        { "type": "m.room.message", "content": { "body": "hello" } },
                    ] },
                } },
            },
            "to_device": { "events": [] },
        });

        let expected = vec![
            "account_data",
            "unstable.group.join",
            "room.leave",
            "room.account_data",
            "room.invite",
            "room.join",
            "room.account_data",
            "room.event",
            "room.message",
        ];

        for _ in 0..2 {
            let mut processor = processor();
            let mut receiver = processor.subscribe();
            processor.process_sync(&body).await.unwrap();
            assert_eq!(channels(&drain(&mut receiver)), expected);
        }
    }
}
