//! Per-tick, per-connection snapshot production.
//!
//! Owns the one reusable [`SnapshotMessage`] scratch buffer for the whole server.
//! Single-threaded, so it is safe to reset and refill once per connection inside a
//! tick rather than allocating a fresh one.

use replicore_serde::value_codec::ByteWriter;

use crate::config::ReplicationConfig;
use crate::connection::ConnectionState;
use crate::entity::EntityState;
use crate::error::Result;
use crate::snapshot::SnapshotMessage;
use crate::transport::{Channel, Transport};

pub struct ReplicationServer {
    snapshot: SnapshotMessage,
    wire_buf: Vec<u8>,
}

impl ReplicationServer {
    pub fn new(config: ReplicationConfig, max_packet_size: usize) -> Self {
        Self {
            snapshot: SnapshotMessage::new(config, max_packet_size),
            wire_buf: vec![0u8; max_packet_size],
        }
    }

    /// Build and send one connection's snapshot for the current tick.
    ///
    /// `entities` is supplied by the interest-management collaborator: the set of
    /// `EntityState`s this connection is currently permitted to observe, in
    /// whatever order it likes (partitioning does not depend on order). Iteration
    /// stops early once the snapshot budget is exhausted, the remainder is picked
    /// up by the interest-management collaborator on a later tick.
    #[tracing::instrument(skip(self, conn, entities, transport), fields(connection_id = conn.connection_id))]
    pub fn tick_connection<T: Transport>(
        &mut self,
        conn: &mut ConnectionState,
        entities: impl IntoIterator<Item = EntityState>,
        transport: &mut T,
    ) -> Result<()> {
        self.snapshot.reset();

        let mut truncated = false;
        for state in entities {
            if !self.snapshot.try_add(state) {
                truncated = true;
                break;
            }
        }
        if truncated {
            tracing::warn!(
                connection_id = conn.connection_id,
                max_entities = self.snapshot.max_entities(),
                "interest set truncated to fit snapshot budget"
            );
        }

        let written = {
            let mut w = ByteWriter::new(&mut self.wire_buf);
            self.snapshot.serialize(&conn.last_entities, &mut w)?;
            w.position()
        };

        tracing::trace!(
            connection_id = conn.connection_id,
            entities = self.snapshot.entities().len(),
            bytes = written,
            "built snapshot"
        );

        if transport.send(conn.connection_id, &self.wire_buf[..written], Channel::Reliable) {
            conn.last_entities.swap_from(self.snapshot.entities_mut());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::NetId;

    struct RecordingTransport {
        sent: Vec<Vec<u8>>,
        accept: bool,
    }

    impl Transport for RecordingTransport {
        fn max_packet_size(&self, _channel: Channel) -> u32 {
            1200
        }

        fn send(&mut self, _connection: crate::transport::ConnectionId, bytes: &[u8], _channel: Channel) -> bool {
            if self.accept {
                self.sent.push(bytes.to_vec());
            }
            self.accept
        }
    }

    fn entity(id: u64) -> EntityState {
        EntityState::new(NetId(id), [0u8; 16], false, [0.0; 3], [0.0, 0.0, 0.0, 1.0])
    }

    #[test]
    fn successful_send_swaps_last_entities() {
        let mut server = ReplicationServer::new(ReplicationConfig::default(), 1200);
        let mut conn = ConnectionState::new(1);
        let mut transport = RecordingTransport { sent: Vec::new(), accept: true };

        server.tick_connection(&mut conn, [entity(1)], &mut transport).unwrap();

        assert_eq!(transport.sent.len(), 1);
        assert_eq!(conn.last_entities.len(), 1);
        assert!(conn.last_entities.contains(NetId(1)));
    }

    #[test]
    fn rejected_send_leaves_baseline_untouched() {
        let mut server = ReplicationServer::new(ReplicationConfig::default(), 1200);
        let mut conn = ConnectionState::new(1);
        conn.last_entities.insert(entity(7));
        let mut transport = RecordingTransport { sent: Vec::new(), accept: false };

        server.tick_connection(&mut conn, [entity(1)], &mut transport).unwrap();

        assert!(transport.sent.is_empty());
        assert_eq!(conn.last_entities.len(), 1);
        assert!(conn.last_entities.contains(NetId(7)));
    }
}
