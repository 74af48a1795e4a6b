// =============================================================================
// Matrixon Client SDK - Rooms Library
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
//   On-demand room-state operations: the room-state collaborator boundary,
//   power-level permission evaluation, and room-upgrade (predecessor /
//   successor) graph resolution. These are pure request/response operations
//   against external state and safe to call concurrently with the sync loop.
//
// =============================================================================

pub mod power_levels;
pub mod state;
pub mod upgrade;

pub use power_levels::{PowerLevelAction, PowerLevelBounds, RoomPermissions};
pub use state::{MemoryRoomState, RoomStateAccess};
pub use upgrade::{RoomUpgradeHistory, RoomUpgradeLink, UpgradeWalker};
