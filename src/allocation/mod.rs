//! Identifier allocation: host ports and instance names
//!
//! Ports are reserved against a process-wide set so no two live sandboxes
//! created by this process share one. Names are drawn at random from a
//! small range and are not reserved against live containers; a collision
//! surfaces later as a container-engine conflict. Only names with a creation
//! in flight are claimed, so two attempts never share one.

pub mod names;
pub mod ports;

pub use names::{NameClaim, NameClaims, NameGenerator};
pub use ports::PortAllocator;
