// =============================================================================
// Matrixon Client SDK - Sync Transport Module
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
//   The three homeserver calls the sync engine needs: the long-poll itself,
//   filter creation, and the joined-rooms snapshot. Request signing, retry
//   policy, and rate limiting belong to the embedding application's HTTP
//   stack, not here.
//
// =============================================================================

use async_trait::async_trait;
use ruma::{OwnedRoomId, OwnedUserId, RoomId};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use matrixon_client_common::{Error, Result};

/// Homeserver calls used by the sync loop driver.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// One long-poll against `/sync`. `since` is omitted on the very first
    /// poll of a fresh client.
    async fn sync(
        &self,
        since: Option<&str>,
        filter_id: &str,
        timeout_ms: u64,
        presence: Option<&str>,
    ) -> Result<Value>;

    /// Create a server-side filter, returning its id.
    async fn create_filter(&self, filter: &Value) -> Result<String>;

    /// The rooms the client is currently joined to.
    async fn joined_rooms(&self) -> Result<Vec<OwnedRoomId>>;
}

/// reqwest-backed transport against a Matrix homeserver.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
    user_id: OwnedUserId,
}

impl HttpTransport {
    pub fn new(
        homeserver_url: &str,
        access_token: impl Into<String>,
        user_id: OwnedUserId,
    ) -> Result<Self> {
        let base_url = Url::parse(homeserver_url)
            .map_err(|err| Error::Transport(format!("invalid homeserver url: {err}")))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            access_token: access_token.into(),
            user_id,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::Transport(format!("invalid endpoint {path}: {err}")))
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| Error::Transport(err.to_string()))?;
        response
            .json::<Value>()
            .await
            .map_err(|err| Error::Transport(err.to_string()))
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn sync(
        &self,
        since: Option<&str>,
        filter_id: &str,
        timeout_ms: u64,
        presence: Option<&str>,
    ) -> Result<Value> {
        let mut url = self.endpoint("/_matrix/client/v3/sync")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("filter", filter_id);
            query.append_pair("timeout", &timeout_ms.to_string());
            if let Some(since) = since {
                query.append_pair("since", since);
            }
            if let Some(presence) = presence {
                query.append_pair("presence", presence);
            }
        }
        debug!("🔧 Long-polling /sync (since: {:?})", since);
        self.get_json(url).await
    }

    async fn create_filter(&self, filter: &Value) -> Result<String> {
        let url = self.endpoint(&format!(
            "/_matrix/client/v3/user/{}/filter",
            self.user_id
        ))?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(filter)
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| Error::Transport(err.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        body.get("filter_id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| Error::Transport("filter response missing filter_id".to_string()))
    }

    async fn joined_rooms(&self) -> Result<Vec<OwnedRoomId>> {
        let url = self.endpoint("/_matrix/client/v3/joined_rooms")?;
        let body = self.get_json(url).await?;
        let raw_ids = body
            .get("joined_rooms")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut rooms = Vec::with_capacity(raw_ids.len());
        for raw in raw_ids {
            match raw.as_str().map(RoomId::parse) {
                Some(Ok(room_id)) => rooms.push(room_id),
                _ => warn!("⚠️ Ignoring malformed joined room id: {raw}"),
            }
        }
        Ok(rooms)
    }
}
