// =============================================================================
// Matrixon Client SDK - Events Library
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
//   Room-event envelope over raw homeserver payloads, membership-candidate
//   selection, and the event preprocessing pipeline that annotates events
//   before they reach consumers.
//
// =============================================================================

pub mod event;
pub mod preprocessor;

pub use event::{most_recent_membership_event, RoomEvent};
pub use preprocessor::{EventKind, EventPreprocessor, PreprocessorChain};
