// =============================================================================
// Matrixon Client SDK - Sync Library
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
//   The sync engine: long-poll driver, delta processor, notification
//   channels, and the transport/store collaborator boundaries. One client
//   instance owns one SyncProcessor and at most one running SyncLoop.
//
// =============================================================================

pub mod config;
pub mod driver;
pub mod notify;
pub mod processor;
pub mod store;
pub mod transport;

pub use config::SyncConfig;
pub use driver::{DirectChatUpdater, SyncLoop, SyncLoopState};
pub use notify::ClientNotification;
pub use processor::SyncProcessor;
pub use store::{ClientStore, FilterDescriptor, MemoryStore};
pub use transport::{HttpTransport, SyncTransport};
