// =============================================================================
// Matrixon Client SDK - Event Preprocessor Module
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
//   Ordered registry of event preprocessors. Each raw event is routed to the
//   first registered preprocessor that declares support for its type, which
//   may annotate the payload in place before the event is exposed to
//   consumers.
//
// =============================================================================

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use matrixon_client_common::Result;

/// The declared kind of an event handed to the preprocessing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Timeline or state event delivered in a room context
    RoomEvent,
    /// Global or per-room account data
    AccountData,
    /// Ephemeral room event (typing, receipts)
    EphemeralEvent,
}

/// A handler that can annotate events of the types it declares.
#[async_trait]
pub trait EventPreprocessor: Send + Sync {
    /// Event types this preprocessor wants to see.
    fn supported_event_types(&self) -> Vec<String>;

    /// Annotate the event in place. Invoked at most once per event.
    async fn process_event(&self, event: &mut Value, kind: EventKind) -> Result<()>;
}

/// Ordered preprocessor registry with first-match-wins dispatch.
///
/// Registration order is significant: for a given event type, only the first
/// preprocessor supporting it is invoked; later ones are skipped. Handlers
/// may be asynchronous, and the pipeline awaits each invocation before the
/// caller moves on to the next event.
#[derive(Default)]
pub struct PreprocessorChain {
    preprocessors: Vec<Box<dyn EventPreprocessor>>,
}

impl PreprocessorChain {
    pub fn new() -> Self {
        Self {
            preprocessors: Vec::new(),
        }
    }

    pub fn add_preprocessor(&mut self, preprocessor: Box<dyn EventPreprocessor>) {
        self.preprocessors.push(preprocessor);
    }

    pub fn is_empty(&self) -> bool {
        self.preprocessors.is_empty()
    }

    /// Route one event through the chain. Events with no `type` field, or
    /// whose type no registered preprocessor supports, pass through
    /// unmodified.
    pub async fn process_event(&self, event: &mut Value, kind: EventKind) -> Result<()> {
        let Some(event_type) = event.get("type").and_then(Value::as_str).map(str::to_owned)
        else {
            return Ok(());
        };

        for preprocessor in &self.preprocessors {
            if preprocessor
                .supported_event_types()
                .iter()
                .any(|supported| supported == &event_type)
            {
                debug!("🔧 Preprocessing {} event ({:?})", event_type, kind);
                preprocessor.process_event(event, kind).await?;
                return Ok(());
            }
        }
        Ok(())
    }
}
