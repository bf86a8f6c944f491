//! Serialize/deserialize a single [`EntityState`].
//!
//! Every record serializes to exactly [`max_size_bits`] bits regardless of
//! `payload_size`, the whole fixed payload buffer is always written. That fixed
//! width is the invariant the delta codec (§4.4) depends on.

use replicore_serde::bitbuffer::{bits_required, BitReader, BitWriter};
use replicore_serde::value_codec::{
    read_fixed_bytes_16, read_quaternion_smallest_three, read_f32_quantized, write_fixed_bytes_16,
    write_quaternion_smallest_three, write_f32_quantized,
};
use replicore_serde::Result;

use crate::config::ReplicationConfig;
use crate::entity::{EntityState, NetId, PAYLOAD_CAPACITY};

const NET_ID_BITS: u32 = 64;
const PREFAB_ID_BITS: u32 = 16 * 8;
const OWNED_BITS: u32 = 1;
const ROTATION_BITS: u32 = 32;
const PAYLOAD_SIZE_BITS: u32 = 16;
const PAYLOAD_BITS: u32 = (PAYLOAD_CAPACITY * 8) as u32;

fn position_axis_bits(config: &ReplicationConfig) -> u32 {
    let (min, max) = config.position_bounds;
    let precision = config.position_precision;
    let min_scaled = (min / precision).round() as i64;
    let max_scaled = (max / precision).round() as i64;
    bits_required((max_scaled - min_scaled) as u64)
}

/// Total bit length of a serialized [`EntityState`] under `config`. Implementers
/// picking wider `position_bounds` or finer `position_precision` pay for it here.
pub fn max_size_bits(config: &ReplicationConfig) -> u32 {
    NET_ID_BITS
        + PREFAB_ID_BITS
        + OWNED_BITS
        + position_axis_bits(config) * 3
        + ROTATION_BITS
        + PAYLOAD_SIZE_BITS
        + PAYLOAD_BITS
}

/// Byte length of a serialized [`EntityState`] under `config`, rounded up.
pub fn max_size_bytes(config: &ReplicationConfig) -> usize {
    (max_size_bits(config) as usize).div_ceil(8)
}

pub fn serialize(state: &EntityState, config: &ReplicationConfig, w: &mut BitWriter) -> Result<()> {
    w.write_bits_u64(state.net_id.0, NET_ID_BITS)?;
    write_fixed_bytes_16(w, &state.prefab_id)?;
    w.write_bool(state.owned)?;

    let (min, max) = config.position_bounds;
    for component in state.position {
        write_f32_quantized(w, component, min, max, config.position_precision)?;
    }

    write_quaternion_smallest_three(w, state.rotation)?;

    w.write_bits_u16(state.payload_size, PAYLOAD_SIZE_BITS)?;
    for byte in state.payload {
        w.write_bits_u8(byte, 8)?;
    }
    Ok(())
}

pub fn deserialize(config: &ReplicationConfig, r: &mut BitReader) -> Result<EntityState> {
    let net_id = NetId(r.read_bits_u64(NET_ID_BITS)?);
    let prefab_id = read_fixed_bytes_16(r)?;
    let owned = r.read_bool()?;

    let (min, max) = config.position_bounds;
    let mut position = [0.0f32; 3];
    for component in &mut position {
        *component = read_f32_quantized(r, min, max, config.position_precision)?;
    }

    let rotation = read_quaternion_smallest_three(r)?;

    let payload_size = r.read_bits_u16(PAYLOAD_SIZE_BITS)?;
    let mut payload = [0u8; PAYLOAD_CAPACITY];
    for byte in &mut payload {
        *byte = r.read_bits_u8(8)?;
    }

    Ok(EntityState {
        net_id,
        prefab_id,
        owned,
        position,
        rotation,
        payload_size,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> EntityState {
        EntityState::new(
            NetId(42),
            *b"0123456789abcdef",
            true,
            [1.5, -20.0, 300.25],
            [0.18, -0.54, 0.18, 0.79],
        )
        .with_payload(&[9, 9, 9])
    }

    #[test]
    fn round_trip_within_precision() {
        let config = ReplicationConfig::default();
        let state = sample();
        let size = max_size_bytes(&config);
        let mut buf = vec![0u8; size];
        {
            let mut w = BitWriter::new(&mut buf);
            serialize(&state, &config, &mut w).unwrap();
            assert_eq!(w.byte_position(), size);
        }
        let mut r = BitReader::new(&buf);
        let out = deserialize(&config, &mut r).unwrap();

        assert_eq!(out.net_id, state.net_id);
        assert_eq!(out.prefab_id, state.prefab_id);
        assert_eq!(out.owned, state.owned);
        for (a, b) in state.position.iter().zip(out.position.iter()) {
            assert_relative_eq!(a, b, epsilon = config.position_precision);
        }
        assert_eq!(out.payload_size, state.payload_size);
        assert_eq!(out.payload, state.payload);
    }

    #[test]
    fn every_entity_serializes_to_identical_length() {
        let config = ReplicationConfig::default();
        let a = sample();
        let b = EntityState::new(NetId(1), [0u8; 16], false, [0.0; 3], [0.0, 0.0, 0.0, 1.0]);
        let size = max_size_bytes(&config);

        let mut buf_a = vec![0u8; size];
        let mut wa = BitWriter::new(&mut buf_a);
        serialize(&a, &config, &mut wa).unwrap();

        let mut buf_b = vec![0u8; size];
        let mut wb = BitWriter::new(&mut buf_b);
        serialize(&b, &config, &mut wb).unwrap();

        assert_eq!(wa.byte_position(), wb.byte_position());
    }
}
