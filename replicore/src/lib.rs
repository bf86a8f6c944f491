//! World-state replication core: delta-compressed entity snapshots produced per
//! connection and applied under a strict per-message byte budget.
//!
//! Built on top of `replicore_serde`'s bit-level primitives, this crate adds the
//! domain layer: the fixed-size [`entity::EntityState`] record, the block-based
//! [`delta`] codec, the per-connection [`snapshot::SnapshotMessage`], and the
//! server/client tick loops that drive them. The underlying transport, entity
//! store, and interest-management policy are all external collaborators passed in
//! through narrow traits, see [`transport::Transport`] and
//! [`client::EntityStore`].

pub mod client;
pub mod config;
pub mod connection;
pub mod delta;
pub mod entity;
pub mod entity_codec;
pub mod error;
pub mod server;
pub mod snapshot;
pub mod transport;

pub mod prelude {
    pub use crate::client::{EntityStore, ReplicationClient, SyncDirection};
    pub use crate::config::ReplicationConfig;
    pub use crate::connection::ConnectionState;
    pub use crate::entity::{EntitySet, EntityState, NetId, PrefabId};
    pub use crate::error::{ReplicationError, Result};
    pub use crate::server::ReplicationServer;
    pub use crate::snapshot::SnapshotMessage;
    pub use crate::transport::{Channel, ConnectionId, Transport};
}
