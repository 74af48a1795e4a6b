// =============================================================================
// Matrixon Client SDK - Sync Loop Driver Module
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
//   Concurrency harness around the sync delta processor: long-poll
//   scheduling, filter negotiation, token persistence, and the
//   start/stop lifecycle. At most one poll is outstanding at a time and the
//   next one is not issued until the previous body has been fully processed,
//   so deltas apply in strict server-delivery order.
//
// =============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use matrixon_client_common::{Error, Result};

use crate::config::SyncConfig;
use crate::processor::SyncProcessor;
use crate::store::{ClientStore, FilterDescriptor};
use crate::transport::SyncTransport;

/// Collaborator keeping the client's direct-message map current. Refreshed
/// once per sync-loop start.
#[async_trait]
pub trait DirectChatUpdater: Send + Sync {
    async fn refresh(&self) -> Result<()>;
}

/// Lifecycle state of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLoopState {
    Idle,
    Running,
    Stopping,
}

fn default_filter() -> Value {
    json!({
        "room": {
            "timeline": { "limit": 20 },
        },
    })
}

/// Long-poll driver owning the sync lifecycle for one client instance.
pub struct SyncLoop {
    transport: Arc<dyn SyncTransport>,
    store: Arc<dyn ClientStore>,
    processor: Arc<Mutex<SyncProcessor>>,
    direct_chats: Option<Arc<dyn DirectChatUpdater>>,
    config: SyncConfig,
    state: Arc<RwLock<SyncLoopState>>,
}

impl SyncLoop {
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        store: Arc<dyn ClientStore>,
        processor: Arc<Mutex<SyncProcessor>>,
        config: SyncConfig,
    ) -> Self {
        Self {
            transport,
            store,
            processor,
            direct_chats: None,
            config,
            state: Arc::new(RwLock::new(SyncLoopState::Idle)),
        }
    }

    pub fn with_direct_chats(mut self, direct_chats: Arc<dyn DirectChatUpdater>) -> Self {
        self.direct_chats = Some(direct_chats);
        self
    }

    pub async fn state(&self) -> SyncLoopState {
        *self.state.read().await
    }

    /// Request the loop to stop. The in-flight poll (if any) is still
    /// processed once it resolves, but no further poll is scheduled.
    /// Idempotent when already stopped or stopping.
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if *state == SyncLoopState::Running {
            *state = SyncLoopState::Stopping;
            info!("🔧 Sync loop stop requested, draining in-flight poll");
        }
    }

    /// Decide which server-side filter id to sync with.
    ///
    /// An in-memory override wins; otherwise the persisted descriptor is
    /// reused when its body structurally matches the desired filter, and a
    /// new filter is created server-side (and persisted) when it does not.
    async fn resolve_filter(&self, filter_override: Option<Value>) -> Result<String> {
        let desired = filter_override.unwrap_or_else(default_filter);

        if let Some(stored) = self.store.filter().await? {
            if stored.filter == desired {
                debug!("🔧 Reusing persisted filter {}", stored.id);
                return Ok(stored.id);
            }
        }

        let id = self.transport.create_filter(&desired).await?;
        self.store
            .set_filter(&FilterDescriptor {
                id: id.clone(),
                filter: desired,
            })
            .await?;
        info!("✅ Created sync filter {}", id);
        Ok(id)
    }

    async fn enter_running(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != SyncLoopState::Idle {
            return Err(Error::InvalidState(
                "sync loop is already running".to_string(),
            ));
        }
        *state = SyncLoopState::Running;
        Ok(())
    }

    async fn leave_running(&self) {
        *self.state.write().await = SyncLoopState::Idle;
    }

    /// Run the sync loop until `stop()` is called.
    ///
    /// Before the first poll this snapshots the rooms already joined so
    /// their redelivery under `rooms.join` is not re-announced, resolves the
    /// filter, and refreshes the direct-messages collaborator. Poll failures
    /// are retried after a delay; they never terminate the loop.
    #[instrument(skip_all)]
    pub async fn start(&self, filter_override: Option<Value>) -> Result<()> {
        self.enter_running().await?;

        let setup = self.prepare(filter_override).await;
        let filter_id = match setup {
            Ok(filter_id) => filter_id,
            Err(err) => {
                self.leave_running().await;
                return Err(err);
            }
        };

        info!("✅ Sync loop started (filter {})", filter_id);
        let result = self.poll_loop(&filter_id).await;
        self.leave_running().await;
        result
    }

    async fn prepare(&self, filter_override: Option<Value>) -> Result<String> {
        let joined = self.transport.joined_rooms().await?;
        {
            let mut processor = self.processor.lock().await;
            for room_id in joined {
                processor.mark_joined(room_id);
            }
        }

        let filter_id = self.resolve_filter(filter_override).await?;

        if let Some(direct_chats) = &self.direct_chats {
            if let Err(err) = direct_chats.refresh().await {
                warn!("⚠️ Direct-chat refresh failed: {err}");
            }
        }
        Ok(filter_id)
    }

    async fn poll_loop(&self, filter_id: &str) -> Result<()> {
        loop {
            if self.state().await != SyncLoopState::Running {
                info!("✅ Sync loop drained, going idle");
                return Ok(());
            }

            let since = self.store.sync_token().await?;
            let poll = self
                .transport
                .sync(
                    since.as_deref(),
                    filter_id,
                    self.config.request_timeout_ms,
                    self.config.presence.as_deref(),
                )
                .await;

            match poll {
                Ok(body) => {
                    match body.get("next_batch").and_then(Value::as_str) {
                        Some(token) => self.store.set_sync_token(Some(token)).await?,
                        None => warn!("⚠️ Sync response missing next_batch token"),
                    }
                    let mut processor = self.processor.lock().await;
                    if let Err(err) = processor.process_sync(&body).await {
                        warn!("⚠️ Sync processing failed: {err}");
                    }
                }
                Err(err) => {
                    warn!(
                        "⚠️ Long-poll failed, retrying in {}ms: {err}",
                        self.config.failure_retry_ms
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        self.config.failure_retry_ms,
                    ))
                    .await;
                }
            }
        }
    }
}
