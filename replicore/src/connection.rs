//! Server-side per-connection state: the delta baseline and the connection's place
//! in the join lifecycle. Grounded on the world-channel bookkeeping lightyear keeps
//! per connection (one baseline, one ack cursor, reset on world (re)join).

use crate::entity::EntitySet;
use crate::transport::ConnectionId;

/// Everything the replication server needs to remember about one connection between
/// ticks. Created on accept, reset when the connection joins the replicated world,
/// dropped (along with its `last_entities` baseline) on disconnect.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub connection_id: ConnectionId,
    pub authenticated: bool,
    pub joined_world: bool,
    /// The exact `EntitySet` last committed to this peer, the delta baseline for
    /// the next snapshot. Swapped (not cloned) into place once the transport accepts
    /// a send; left untouched if the send is rejected, so the next tick retries
    /// against the same baseline.
    pub last_entities: EntitySet,
}

impl ConnectionState {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            authenticated: false,
            joined_world: false,
            last_entities: EntitySet::new(),
        }
    }

    /// Transition into the replicated world: the connection now participates in
    /// snapshot ticks starting from an empty baseline (every entity it can observe
    /// arrives as `added` on the first tick).
    pub fn join_world(&mut self) {
        self.joined_world = true;
        self.last_entities.clear();
    }
}
