//! Bit-level serialization primitives shared by the replication core.
//!
//! This crate has no notion of entities, snapshots, or connections: it only knows
//! how to pack bits. See the `replicore` crate for the networked entity replication
//! layer built on top of it.

pub mod bitbuffer;
pub mod error;
pub mod value_codec;

pub use bitbuffer::{bits_required, BitReader, BitWriter};
pub use error::{Result, SerializationError};
