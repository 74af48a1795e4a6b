// =============================================================================
// Matrixon Client SDK - E2EE Capability Library
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
//   Narrow encryption capability consumed by the sync engine and room
//   operations. The actual olm/megolm machinery (key upload, device-list
//   tracking, session management) lives behind this boundary; the SDK only
//   needs encrypt/decrypt/is-encrypted plus the per-sync device data
//   hand-off.
//
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ruma::RoomId;
use serde_json::Value;

use matrixon_client_common::{Error, Result};

/// Device-related data extracted from one `/sync` response and forwarded to
/// the encryption engine after room processing completes.
///
/// Fields mirror the wire payload and are forwarded verbatim where possible;
/// only the one-time-key counts are narrowed to numeric values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncCryptoUpdate {
    /// `to_device.events` from the sync body
    pub to_device_events: Vec<Value>,

    /// `device_one_time_keys_count`, algorithm name to remaining count
    pub one_time_key_counts: BTreeMap<String, u64>,

    /// `device_unused_fallback_key_types`
    pub unused_fallback_key_types: Vec<String>,

    /// `device_lists.changed`, user ids whose device lists changed
    pub changed_device_users: Vec<String>,

    /// `device_lists.left`, user ids the client no longer shares rooms with
    pub left_device_users: Vec<String>,
}

/// Encryption engine capability.
///
/// The sync loop awaits `update_sync_data` after every processed sync body;
/// room send/receive paths use the encrypt/decrypt pair. Implementations own
/// all cryptographic state.
#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Whether the room has encryption enabled.
    async fn is_room_encrypted(&self, room_id: &RoomId) -> Result<bool>;

    /// Decrypt an encrypted room event, returning the cleartext event
    /// payload. The caller keeps the raw (encrypted) form around.
    async fn decrypt_room_event(&self, event: &Value, room_id: &RoomId) -> Result<Value>;

    /// Encrypt an event for a room, returning the `m.room.encrypted`
    /// content to send.
    async fn encrypt_room_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        content: &Value,
    ) -> Result<Value>;

    /// Receive the device-related portion of a sync response. Invoked once
    /// per processed sync body, with empty collections when the body carried
    /// no device data.
    async fn update_sync_data(&self, update: SyncCryptoUpdate) -> Result<()>;
}

/// Holder for the client's optional encryption engine.
///
/// Crypto-dependent operations on a client without an engine fail
/// immediately, before any network activity, with a crypto-not-enabled
/// error.
#[derive(Clone, Default)]
pub struct EncryptionGate {
    engine: Option<Arc<dyn CryptoEngine>>,
}

impl EncryptionGate {
    pub fn disabled() -> Self {
        Self { engine: None }
    }

    pub fn with_engine(engine: Arc<dyn CryptoEngine>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_some()
    }

    fn engine(&self) -> Result<&Arc<dyn CryptoEngine>> {
        self.engine.as_ref().ok_or(Error::CryptoNotEnabled)
    }

    pub async fn is_room_encrypted(&self, room_id: &RoomId) -> Result<bool> {
        self.engine()?.is_room_encrypted(room_id).await
    }

    pub async fn decrypt_room_event(&self, event: &Value, room_id: &RoomId) -> Result<Value> {
        self.engine()?.decrypt_room_event(event, room_id).await
    }

    pub async fn encrypt_room_event(
        &self,
        room_id: &RoomId,
        event_type: &str,
        content: &Value,
    ) -> Result<Value> {
        self.engine()?
            .encrypt_room_event(room_id, event_type, content)
            .await
    }

    pub async fn update_sync_data(&self, update: SyncCryptoUpdate) -> Result<()> {
        self.engine()?.update_sync_data(update).await
    }
}
