//! Error type for the snapshot/server/client layer.

use replicore_serde::SerializationError;

use crate::entity::NetId;

pub type Result<T> = core::result::Result<T, ReplicationError>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    /// A delta-decoded `netId` disagreed with the sorted baseline the receiver
    /// expected. Always a protocol violation inflicted by a desynced peer, never a
    /// local bug, callers should disconnect and resync on the next tick.
    #[error("desync: expected netId {expected}, got {got}")]
    Desync { expected: NetId, got: NetId },
}
