// =============================================================================
// Matrixon Client SDK - Client Store Module
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
//   Pluggable persistence capability for the two pieces of client state the
//   sync engine needs across restarts: the sync token and the negotiated
//   filter. Backends range from the in-memory store here to whatever
//   key-value storage the embedding application provides.
//
// =============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use matrixon_client_common::Result;

/// A server-side filter and the body it was created from. Reuse is decided
/// by structural equality of `filter`, never by id alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    pub id: String,
    pub filter: Value,
}

/// Persistence capability for sync state.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn sync_token(&self) -> Result<Option<String>>;

    async fn set_sync_token(&self, token: Option<&str>) -> Result<()>;

    async fn filter(&self) -> Result<Option<FilterDescriptor>>;

    async fn set_filter(&self, filter: &FilterDescriptor) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    sync_token: Option<String>,
    filter: Option<FilterDescriptor>,
}

/// Volatile store; state lives for the client instance only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn sync_token(&self) -> Result<Option<String>> {
        Ok(self.inner.read().await.sync_token.clone())
    }

    async fn set_sync_token(&self, token: Option<&str>) -> Result<()> {
        self.inner.write().await.sync_token = token.map(str::to_owned);
        Ok(())
    }

    async fn filter(&self) -> Result<Option<FilterDescriptor>> {
        Ok(self.inner.read().await.filter.clone())
    }

    async fn set_filter(&self, filter: &FilterDescriptor) -> Result<()> {
        self.inner.write().await.filter = Some(filter.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_token_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.sync_token().await.unwrap(), None);

        store.set_sync_token(Some("s72594_4483")).await.unwrap();
        assert_eq!(
            store.sync_token().await.unwrap().as_deref(),
            Some("s72594_4483")
        );

        store.set_sync_token(None).await.unwrap();
        assert_eq!(store.sync_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_filter_equality_is_structural() {
        let store = MemoryStore::new();
        let descriptor = FilterDescriptor {
            id: "42".to_string(),
            filter: json!({ "room": { "timeline": { "limit": 20 } } }),
        };
        store.set_filter(&descriptor).await.unwrap();

        let stored = store.filter().await.unwrap().unwrap();
        assert_eq!(
            stored.filter,
            json!({ "room": { "timeline": { "limit": 20 } } })
        );
        assert_ne!(
            stored.filter,
            json!({ "room": { "timeline": { "limit": 21 } } })
        );
    }
}
