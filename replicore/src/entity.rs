//! The data model: stable entity identifiers, the fixed-size per-entity record, and
//! the sorted-by-id set those records live in.

use std::collections::BTreeMap;
use std::collections::btree_map;

/// Server-assigned stable identifier for a replicated entity within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetId(pub u64);

impl std::fmt::Display for NetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for a spawnable prefab/archetype.
pub type PrefabId = [u8; 16];

/// Maximum payload carried alongside position/rotation, the serialized form of
/// whatever optional synced components a caller attaches to this entity.
pub const PAYLOAD_CAPACITY: usize = 128;

/// A fixed-size record describing one replicated entity at a point in time.
///
/// Every `EntityState` serializes to exactly [`crate::entity_codec::max_size_bytes`]
/// bytes regardless of `payload_size`, the full [`PAYLOAD_CAPACITY`]-byte buffer is
/// always written, which is what makes delta coding two serialized entities well
/// defined (see [`crate::delta`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub net_id: NetId,
    pub prefab_id: PrefabId,
    pub owned: bool,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub payload_size: u16,
    pub payload: [u8; PAYLOAD_CAPACITY],
}

impl EntityState {
    pub fn new(net_id: NetId, prefab_id: PrefabId, owned: bool, position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self {
            net_id,
            prefab_id,
            owned,
            position,
            rotation,
            payload_size: 0,
            payload: [0u8; PAYLOAD_CAPACITY],
        }
    }

    /// Attach a payload, truncating silently is not allowed: the caller must ensure
    /// `bytes.len() <= PAYLOAD_CAPACITY`.
    pub fn with_payload(mut self, bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= PAYLOAD_CAPACITY, "payload exceeds fixed capacity");
        let len = bytes.len().min(PAYLOAD_CAPACITY);
        self.payload[..len].copy_from_slice(&bytes[..len]);
        self.payload_size = len as u16;
        self
    }

    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload[..self.payload_size as usize]
    }
}

/// A mapping `NetId -> EntityState` with unique keys. Backed by a `BTreeMap` so that
/// iteration is always in ascending `NetId` order for free, the delta codec (§4.5 of
/// the design doc) requires this sorted order to line up sender and receiver without
/// transmitting `NetId`s for kept entities.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    entries: BTreeMap<NetId, EntityState>,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn insert(&mut self, state: EntityState) -> Option<EntityState> {
        self.entries.insert(state.net_id, state)
    }

    pub fn get(&self, net_id: NetId) -> Option<&EntityState> {
        self.entries.get(&net_id)
    }

    pub fn remove(&mut self, net_id: NetId) -> Option<EntityState> {
        self.entries.remove(&net_id)
    }

    pub fn contains(&self, net_id: NetId) -> bool {
        self.entries.contains_key(&net_id)
    }

    /// Ascending `NetId` order, as required wherever this set participates in delta
    /// coding.
    pub fn iter(&self) -> impl Iterator<Item = (&NetId, &EntityState)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NetId> {
        self.entries.keys()
    }

    /// Replace the contents of `self` with `other`, leaving `other` empty. Used for
    /// the `lastEntities ← entities` swap at the end of a tick: moves the contents
    /// instead of cloning.
    pub fn swap_from(&mut self, other: &mut EntitySet) {
        std::mem::swap(&mut self.entries, &mut other.entries);
        other.entries.clear();
    }
}

impl IntoIterator for EntitySet {
    type Item = (NetId, EntityState);
    type IntoIter = btree_map::IntoIter<NetId, EntityState>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<EntityState> for EntitySet {
    fn from_iter<T: IntoIterator<Item = EntityState>>(iter: T) -> Self {
        let mut set = Self::new();
        for state in iter {
            set.insert(state);
        }
        set
    }
}
