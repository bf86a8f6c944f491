//! Per-connection snapshot message: partitions the current entity set against a
//! delta baseline into added/kept/removed, serializes each under a byte budget, and
//! reverses the process on the receiving side.

use smallvec::SmallVec;

use replicore_serde::bitbuffer::{BitReader, BitWriter};
use replicore_serde::value_codec::{ByteReader, ByteWriter};

use crate::config::ReplicationConfig;
use crate::delta;
use crate::entity::{EntitySet, EntityState, NetId};
use crate::entity_codec;
use crate::error::{ReplicationError, Result};

const LENGTH_PREFIX_BYTES: usize = 4;

/// Leading count the added stream carries ahead of its packed records, see
/// [`SnapshotMessage::serialize`].
const ADDED_COUNT_BYTES: usize = 4;

/// Pessimistic per-entity contribution to a serialized snapshot: whichever is larger
/// of a full `EntityState` (the added/removed case) or its worst-case delta patch
/// (the kept case), floored at 8 bytes (a bare `netId` in the removed stream).
fn worst_case_entity_size(config: &ReplicationConfig) -> usize {
    let entity_size = entity_codec::max_size_bytes(config);
    let patch_size = delta::max_patch_size(entity_size, config.delta_block_size);
    entity_size.max(patch_size).max(8)
}

/// A reusable, fixed-capacity scratch buffer for one connection's per-tick snapshot.
/// Every backing array is sized once at construction from `config` and `max_size`
/// (the transport MTU on the channel this snapshot is sent on) and re-used across
/// ticks via [`SnapshotMessage::reset`].
pub struct SnapshotMessage {
    config: ReplicationConfig,
    max_entities: usize,
    entity_size: usize,

    entities: EntitySet,

    added_buf: Vec<u8>,
    kept_buf: Vec<u8>,
    removed_buf: Vec<u8>,
    last_buf: Vec<u8>,
    curr_buf: Vec<u8>,
}

impl SnapshotMessage {
    pub fn new(config: ReplicationConfig, max_size: usize) -> Self {
        let entity_size = entity_codec::max_size_bytes(&config);
        let worst_case = worst_case_entity_size(&config);
        let max_entities = max_size.saturating_sub(3 * LENGTH_PREFIX_BYTES) / worst_case;
        let entities_cap = max_entities * entity_size;

        Self {
            config,
            max_entities,
            entity_size,
            entities: EntitySet::new(),
            added_buf: vec![0u8; entities_cap + ADDED_COUNT_BYTES],
            kept_buf: vec![0u8; delta::max_patch_size(entities_cap, config.delta_block_size)],
            removed_buf: vec![0u8; max_entities * 8],
            last_buf: vec![0u8; entities_cap],
            curr_buf: vec![0u8; entities_cap],
        }
    }

    /// The most entities this snapshot can carry under its configured MTU.
    pub fn max_entities(&self) -> usize {
        self.max_entities
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntitySet {
        &mut self.entities
    }

    /// Drop all entities gathered this tick, ready to be refilled by [`Self::try_add`].
    pub fn reset(&mut self) {
        self.entities.clear();
    }

    /// Gather one entity into this tick's snapshot. Returns `false` once
    /// [`Self::max_entities`] has been reached; the caller should stop iterating its
    /// interest set at that point and pick the remainder up on a later tick.
    pub fn try_add(&mut self, state: EntityState) -> bool {
        if self.entities.len() >= self.max_entities {
            return false;
        }
        self.entities.insert(state);
        true
    }

    /// Partition `self.entities` against `last` and write the wire-format message
    /// (`added || kept || removed`, each length-prefixed) into `out`.
    pub fn serialize(&mut self, last: &EntitySet, out: &mut ByteWriter) -> Result<()> {
        let mut added: SmallVec<[EntityState; 16]> = SmallVec::new();
        let mut kept_keys: SmallVec<[NetId; 16]> = SmallVec::new();
        for (id, state) in self.entities.iter() {
            if last.contains(*id) {
                kept_keys.push(*id);
            } else {
                added.push(*state);
            }
        }
        let removed: SmallVec<[NetId; 16]> = last.keys().filter(|id| !self.entities.contains(**id)).copied().collect();

        let mut removed_w = ByteWriter::new(&mut self.removed_buf);
        for id in &removed {
            removed_w.write_u64_le(id.0)?;
        }
        let removed_len = removed_w.position();

        // Entities pack back-to-back at the bit level with no per-entity byte
        // padding, so the stream's true length is whatever the writer ends up at,
        // not `kept_keys.len() * self.entity_size` (that's only an upper bound).
        let mut last_bw = BitWriter::new(&mut self.last_buf);
        for id in &kept_keys {
            entity_codec::serialize(last.get(*id).expect("kept key must be present in last"), &self.config, &mut last_bw)?;
        }
        let last_bytes = last_bw.byte_position();

        let mut curr_bw = BitWriter::new(&mut self.curr_buf);
        for id in &kept_keys {
            entity_codec::serialize(self.entities.get(*id).expect("kept key must be present in entities"), &self.config, &mut curr_bw)?;
        }
        let curr_bytes = curr_bw.byte_position();
        debug_assert_eq!(last_bytes, curr_bytes, "same kept keys must encode to equal length");

        let kept_len = delta::compress(
            &self.last_buf[..last_bytes],
            &self.curr_buf[..curr_bytes],
            self.config.delta_block_size,
            &mut self.kept_buf,
        )?;

        // A leading count lets the receiver know exactly how many records to pull
        // back out of a tightly packed bit stream; byte length alone is ambiguous
        // whenever the per-entity bit width isn't a multiple of 8.
        let mut added_bw = BitWriter::new(&mut self.added_buf);
        added_bw.write_bits_u32(added.len() as u32, 32)?;
        for state in &added {
            entity_codec::serialize(state, &self.config, &mut added_bw)?;
        }
        let added_len = added_bw.byte_position();

        out.write_u32_le(added_len as u32)?;
        out.write_bytes(&self.added_buf[..added_len])?;
        out.write_u32_le(kept_len as u32)?;
        out.write_bytes(&self.kept_buf[..kept_len])?;
        out.write_u32_le(removed_len as u32)?;
        out.write_bytes(&self.removed_buf[..removed_len])?;
        Ok(())
    }

    /// Read a wire-format message out of `input`, reshaping `last` (the caller's
    /// delta baseline) in place against the sender's `removed` set and populating
    /// `self.entities` with the union of `kept` and `added`. Returns
    /// [`ReplicationError::Desync`] if a delta-decoded entity's `netId` does not
    /// match the sorted baseline the sender must have used.
    pub fn deserialize(&mut self, last: &mut EntitySet, input: &mut ByteReader) -> Result<()> {
        self.entities.clear();

        let added_len = input.read_u32_le()? as usize;
        let added_slice = input.read_bytes(added_len)?;
        let kept_len = input.read_u32_le()? as usize;
        let kept_slice = input.read_bytes(kept_len)?;
        let removed_len = input.read_u32_le()? as usize;
        let removed_slice = input.read_bytes(removed_len)?;

        let mut removed_r = ByteReader::new(removed_slice);
        while removed_r.remaining() > 0 {
            let id = NetId(removed_r.read_u64_le()?);
            last.remove(id);
        }

        let kept_keys: SmallVec<[NetId; 16]> = last.keys().copied().collect();
        debug_assert!(
            kept_keys.len() * self.entity_size <= self.last_buf.len(),
            "kept set exceeds snapshot capacity"
        );

        let mut last_bw = BitWriter::new(&mut self.last_buf);
        for id in &kept_keys {
            entity_codec::serialize(last.get(*id).expect("kept key must be present in last"), &self.config, &mut last_bw)?;
        }
        let last_bytes = last_bw.byte_position();

        delta::decompress(&self.last_buf[..last_bytes], kept_slice, self.config.delta_block_size, &mut self.curr_buf[..last_bytes])?;

        let mut curr_br = BitReader::new(&self.curr_buf[..last_bytes]);
        for expected in &kept_keys {
            let state = entity_codec::deserialize(&self.config, &mut curr_br)?;
            if state.net_id != *expected {
                return Err(ReplicationError::Desync { expected: *expected, got: state.net_id });
            }
            self.entities.insert(state);
        }

        let mut added_br = BitReader::new(added_slice);
        let added_count = added_br.read_bits_u32(32)?;
        for _ in 0..added_count {
            let state = entity_codec::deserialize(&self.config, &mut added_br)?;
            self.entities.insert(state);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u64, x: f32) -> EntityState {
        EntityState::new(NetId(id), [0u8; 16], false, [x, 0.0, 0.0], [0.0, 0.0, 0.0, 1.0])
    }

    fn new_message() -> SnapshotMessage {
        SnapshotMessage::new(ReplicationConfig::default(), 1200)
    }

    #[test]
    fn scenario_1_first_snapshot_is_all_added() {
        let mut msg = new_message();
        let last = EntitySet::new();
        assert!(msg.try_add(entity(1, 0.0)));

        let mut buf = vec![0u8; 2048];
        let written = {
            let mut w = ByteWriter::new(&mut buf);
            msg.serialize(&last, &mut w).unwrap();
            w.position()
        };

        let mut r = ByteReader::new(&buf[..written]);
        let added_len = r.read_u32_le().unwrap();
        assert!(added_len > 0);
        r.read_bytes(added_len as usize).unwrap();
        let kept_len = r.read_u32_le().unwrap();
        assert_eq!(kept_len, 0);
        r.read_bytes(0).unwrap();
        let removed_len = r.read_u32_le().unwrap();
        assert_eq!(removed_len, 0);

        let mut client_last = EntitySet::new();
        let mut client_msg = new_message();
        let mut cr = ByteReader::new(&buf[..written]);
        client_msg.deserialize(&mut client_last, &mut cr).unwrap();
        assert_eq!(client_msg.entities().len(), 1);
        assert!(client_msg.entities().contains(NetId(1)));
    }

    #[test]
    fn scenario_4_add_keep_remove_round_trip() {
        let mut last = EntitySet::new();
        last.insert(entity(1, 0.0));
        last.insert(entity(2, 0.0));
        last.insert(entity(3, 0.0));

        let mut msg = new_message();
        msg.try_add(entity(2, 1.0));
        msg.try_add(entity(3, 2.0));
        msg.try_add(entity(4, 3.0));

        let mut buf = vec![0u8; 4096];
        let written = {
            let mut w = ByteWriter::new(&mut buf);
            msg.serialize(&last, &mut w).unwrap();
            w.position()
        };

        let mut client_last = last.clone();
        let mut client_msg = new_message();
        let mut r = ByteReader::new(&buf[..written]);
        client_msg.deserialize(&mut client_last, &mut r).unwrap();

        let ids: Vec<u64> = client_msg.entities().keys().map(|id| id.0).collect();
        assert_eq!(ids, vec![2, 3, 4]);
        assert!(!client_msg.entities().contains(NetId(1)));
    }

    #[test]
    fn scenario_5_budget_overrun_truncates_try_add() {
        let mut msg = SnapshotMessage::new(ReplicationConfig::default(), 1200);
        let cap = msg.max_entities();
        assert!(cap > 0);
        for i in 0..cap {
            assert!(msg.try_add(entity(i as u64, 0.0)));
        }
        assert!(!msg.try_add(entity(cap as u64 + 1000, 0.0)));
    }

    #[test]
    fn deserialize_detects_desync() {
        let mut last = EntitySet::new();
        last.insert(entity(1, 0.0));

        let mut msg = new_message();
        msg.try_add(entity(1, 5.0));

        let mut buf = vec![0u8; 2048];
        let written = {
            let mut w = ByteWriter::new(&mut buf);
            msg.serialize(&last, &mut w).unwrap();
            w.position()
        };

        // the client's baseline disagrees with the server's: a different netId.
        let mut client_last = EntitySet::new();
        client_last.insert(entity(99, 0.0));

        let mut client_msg = new_message();
        let mut r = ByteReader::new(&buf[..written]);
        let err = client_msg.deserialize(&mut client_last, &mut r);
        assert!(err.is_err());
    }
}
