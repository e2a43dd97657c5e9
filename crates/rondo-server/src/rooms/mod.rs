//! Room state and the registry that owns it.
//!
//! A room is a rendezvous point for exactly two connections; the registry
//! maps room ids to rooms, creating them lazily and reclaiming them once
//! they empty or go idle.

mod registry;
mod room;

pub use registry::RoomRegistry;
pub use room::{Participant, Role, Room, MAX_PARTICIPANTS};
