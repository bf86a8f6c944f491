//! Client-side apply loop: turn a received snapshot into spawn/update/despawn calls
//! against the local entity store, respecting per-entity authority.

use std::collections::HashSet;

use replicore_serde::value_codec::ByteReader;

use crate::config::ReplicationConfig;
use crate::entity::{EntitySet, NetId, PrefabId};
use crate::error::Result;
use crate::snapshot::SnapshotMessage;

/// Which side is allowed to write a synced transform. Combined with the wire's
/// per-entity `owned` flag: a transform is writable locally iff `owned &&
/// direction == ClientToServer` (the client predicts it and the server merely
/// echoes it back for other observers). Everything else is written by whichever
/// side receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    ServerToClient,
    ClientToServer,
}

/// Narrow capability trait for the local entity store. The replication client never
/// touches gameplay components directly, it only knows `netId`s, transforms, and
/// an opaque payload blob handed off for downstream component deserialization.
pub trait EntityStore {
    /// `netId`s of entities currently spawned in this store.
    fn spawned_ids(&self) -> Vec<NetId>;

    /// The authority direction for this entity's synced transform. Only consulted
    /// for entities already spawned locally.
    fn sync_direction(&self, net_id: NetId) -> SyncDirection;

    fn apply_update(&mut self, net_id: NetId, position: [f32; 3], rotation: [f32; 4], payload: &[u8]);

    fn spawn(&mut self, net_id: NetId, prefab_id: PrefabId, owned: bool, position: [f32; 3], rotation: [f32; 4], payload: &[u8]);

    fn despawn(&mut self, net_id: NetId);
}

pub struct ReplicationClient {
    snapshot: SnapshotMessage,
}

impl ReplicationClient {
    pub fn new(config: ReplicationConfig, max_packet_size: usize) -> Self {
        Self {
            snapshot: SnapshotMessage::new(config, max_packet_size),
        }
    }

    /// Apply one received snapshot message to `store`. `last_entities` is this
    /// connection's delta baseline and is updated in place for the next call.
    ///
    /// On [`crate::error::ReplicationError::Truncated`]-class failures the caller
    /// should disconnect and resynchronize; this method never panics on bad input.
    #[tracing::instrument(skip(self, bytes, store, last_entities))]
    pub fn apply<S: EntityStore>(
        &mut self,
        bytes: &[u8],
        last_entities: &mut EntitySet,
        store: &mut S,
    ) -> Result<()> {
        let mut reader = ByteReader::new(bytes);
        if let Err(err) = self.snapshot.deserialize(last_entities, &mut reader) {
            tracing::error!(%err, "failed to apply snapshot, connection must resync");
            return Err(err);
        }

        let spawned: HashSet<NetId> = store.spawned_ids().into_iter().collect();

        for (id, state) in self.snapshot.entities().iter() {
            if spawned.contains(id) {
                let writable = state.owned && store.sync_direction(*id) == SyncDirection::ClientToServer;
                if writable {
                    tracing::trace!(net_id = %id, "dropped inbound update: locally authoritative");
                } else {
                    store.apply_update(*id, state.position, state.rotation, state.payload_bytes());
                }
            } else {
                store.spawn(*id, state.prefab_id, state.owned, state.position, state.rotation, state.payload_bytes());
            }
        }

        for id in &spawned {
            if !self.snapshot.entities().contains(*id) {
                store.despawn(*id);
            }
        }

        last_entities.swap_from(self.snapshot.entities_mut());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntitySet, EntityState};
    use replicore_serde::value_codec::ByteWriter;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStore {
        transforms: HashMap<NetId, ([f32; 3], [f32; 4])>,
        owned_locally: HashSet<NetId>,
        despawned: Vec<NetId>,
        spawned: Vec<NetId>,
    }

    impl EntityStore for FakeStore {
        fn spawned_ids(&self) -> Vec<NetId> {
            self.transforms.keys().copied().collect()
        }

        fn sync_direction(&self, net_id: NetId) -> SyncDirection {
            if self.owned_locally.contains(&net_id) {
                SyncDirection::ClientToServer
            } else {
                SyncDirection::ServerToClient
            }
        }

        fn apply_update(&mut self, net_id: NetId, position: [f32; 3], rotation: [f32; 4], _payload: &[u8]) {
            self.transforms.insert(net_id, (position, rotation));
        }

        fn spawn(&mut self, net_id: NetId, _prefab_id: PrefabId, _owned: bool, position: [f32; 3], rotation: [f32; 4], _payload: &[u8]) {
            self.transforms.insert(net_id, (position, rotation));
            self.spawned.push(net_id);
        }

        fn despawn(&mut self, net_id: NetId) {
            self.transforms.remove(&net_id);
            self.despawned.push(net_id);
        }
    }

    fn entity(id: u64, x: f32) -> EntityState {
        EntityState::new(NetId(id), [0u8; 16], false, [x, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0])
    }

    #[test]
    fn scenario_6_authority_drop_keeps_local_transform() {
        let config = ReplicationConfig::default();
        let mut server_snapshot = SnapshotMessage::new(config, 1200);
        let server_last = EntitySet::new();

        let mut owned_entity = entity(1, 5.0);
        owned_entity.owned = true;
        server_snapshot.try_add(owned_entity);

        let mut buf = vec![0u8; 2048];
        let written = {
            let mut w = ByteWriter::new(&mut buf);
            server_snapshot.serialize(&server_last, &mut w).unwrap();
            w.position()
        };

        let mut store = FakeStore::default();
        store.transforms.insert(NetId(1), ([5.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]));
        store.owned_locally.insert(NetId(1));

        let mut client = ReplicationClient::new(config, 1200);
        let mut last_entities = EntitySet::new();
        client.apply(&buf[..written], &mut last_entities, &mut store).unwrap();

        assert_eq!(store.transforms[&NetId(1)].0, [5.0, 0.0, 0.0]);
    }

    #[test]
    fn unowned_entity_is_updated_and_missing_entity_is_despawned() {
        let config = ReplicationConfig::default();
        let mut server_snapshot = SnapshotMessage::new(config, 1200);
        let server_last = EntitySet::new();
        server_snapshot.try_add(entity(2, 10.0));

        let mut buf = vec![0u8; 2048];
        let written = {
            let mut w = ByteWriter::new(&mut buf);
            server_snapshot.serialize(&server_last, &mut w).unwrap();
            w.position()
        };

        let mut store = FakeStore::default();
        store.transforms.insert(NetId(2), ([0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0]));
        store.transforms.insert(NetId(3), ([1.0, 1.0, 1.0], [0.0, 0.0, 0.0, 1.0]));

        let mut client = ReplicationClient::new(config, 1200);
        let mut last_entities = EntitySet::new();
        client.apply(&buf[..written], &mut last_entities, &mut store).unwrap();

        assert_eq!(store.transforms[&NetId(2)].0, [10.0, 0.0, 0.0]);
        assert_eq!(store.despawned, vec![NetId(3)]);
    }
}
