//! Higher-level helpers layered on top of [`crate::bitbuffer`]: quantized floats,
//! a smallest-three quaternion codec, fixed-capacity blobs/strings, and a distinct
//! byte-aligned writer/reader pair for the whole-byte framing used by the snapshot
//! message (see the `replicore` crate).

use crate::bitbuffer::{BitReader, BitWriter};
use crate::error::{Result, SerializationError};

const SMALLEST_THREE_BITS: u32 = 10;
const SMALLEST_THREE_MAX: f32 = std::f32::consts::FRAC_1_SQRT_2;
const SMALLEST_THREE_STEPS: u32 = (1 << SMALLEST_THREE_BITS) - 1;

/// Write `value` scaled by `1/precision` and range-coded over `[min, max]`.
///
/// Fails (rather than silently truncating) if the scaled value does not fit in an
/// `i32`, or falls outside `[min, max]`.
pub fn write_f32_quantized(w: &mut BitWriter, value: f32, min: f32, max: f32, precision: f32) -> Result<()> {
    let scaled = (value / precision).round();
    if scaled < i32::MIN as f32 || scaled > i32::MAX as f32 {
        return Err(SerializationError::OutOfRange);
    }
    let min_scaled = (min / precision).round() as i64;
    let max_scaled = (max / precision).round() as i64;
    w.write_range_i64(scaled as i64, min_scaled, max_scaled)
}

/// Inverse of [`write_f32_quantized`]. The result is within `precision/2` of the
/// original value, up to floating point reconstruction error.
pub fn read_f32_quantized(r: &mut BitReader, min: f32, max: f32, precision: f32) -> Result<f32> {
    let min_scaled = (min / precision).round() as i64;
    let max_scaled = (max / precision).round() as i64;
    let scaled = r.read_range_i64(min_scaled, max_scaled)?;
    Ok(scaled as f32 * precision)
}

/// Smallest-three quaternion compression: drop the largest-magnitude component (by
/// absolute value), store its 2-bit index, and fixed-point encode the remaining
/// three in `[-1/sqrt(2), 1/sqrt(2)]` at [`SMALLEST_THREE_BITS`] bits each, 32 bits
/// total. The dropped component is always reconstructed non-negative (we flip the
/// whole quaternion's sign at encode time if needed, since `q` and `-q` encode the
/// same rotation), so no separate sign bit is needed.
pub fn write_quaternion_smallest_three(w: &mut BitWriter, quat: [f32; 4]) -> Result<()> {
    let (idx, _) = quat
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.abs().partial_cmp(&b.abs()).unwrap())
        .unwrap();

    let quat = if quat[idx] < 0.0 {
        [-quat[0], -quat[1], -quat[2], -quat[3]]
    } else {
        quat
    };

    w.write_bits_u32(idx as u32, 2)?;
    for (i, component) in quat.iter().enumerate() {
        if i == idx {
            continue;
        }
        let normalized = (component.clamp(-SMALLEST_THREE_MAX, SMALLEST_THREE_MAX) + SMALLEST_THREE_MAX)
            / (2.0 * SMALLEST_THREE_MAX);
        let step = (normalized * SMALLEST_THREE_STEPS as f32).round() as u32;
        w.write_bits_u32(step, SMALLEST_THREE_BITS)?;
    }
    Ok(())
}

pub fn read_quaternion_smallest_three(r: &mut BitReader) -> Result<[f32; 4]> {
    let idx = r.read_bits_u32(2)? as usize;

    let mut out = [0.0f32; 4];
    let mut sum_sq = 0.0f32;
    for i in 0..4 {
        if i == idx {
            continue;
        }
        let step = r.read_bits_u32(SMALLEST_THREE_BITS)?;
        let normalized = step as f32 / SMALLEST_THREE_STEPS as f32;
        let component = normalized * (2.0 * SMALLEST_THREE_MAX) - SMALLEST_THREE_MAX;
        out[i] = component;
        sum_sq += component * component;
    }
    out[idx] = (1.0 - sum_sq).max(0.0).sqrt();

    let len = (out[0] * out[0] + out[1] * out[1] + out[2] * out[2] + out[3] * out[3]).sqrt();
    if len > 0.0 {
        for c in &mut out {
            *c /= len;
        }
    }
    Ok(out)
}

/// Write a fixed-width byte blob, bit-packed like every other field so a whole
/// [`crate::EntityState`]-style record has a fixed, statically known bit length.
macro_rules! fixed_bytes_writer {
    ($write_name:ident, $read_name:ident, $n:expr) => {
        pub fn $write_name(w: &mut BitWriter, bytes: &[u8; $n]) -> Result<()> {
            for b in bytes {
                w.write_bits_u8(*b, 8)?;
            }
            Ok(())
        }

        pub fn $read_name(r: &mut BitReader) -> Result<[u8; $n]> {
            let mut out = [0u8; $n];
            for b in &mut out {
                *b = r.read_bits_u8(8)?;
            }
            Ok(out)
        }
    };
}

fixed_bytes_writer!(write_fixed_bytes_16, read_fixed_bytes_16, 16);
fixed_bytes_writer!(write_fixed_bytes_30, read_fixed_bytes_30, 30);
fixed_bytes_writer!(write_fixed_bytes_62, read_fixed_bytes_62, 62);
fixed_bytes_writer!(write_fixed_bytes_126, read_fixed_bytes_126, 126);

/// A 2-byte length prefix followed by up to `N` bytes of UTF-8, bit-packed.
macro_rules! fixed_string_writer {
    ($write_name:ident, $read_name:ident, $n:expr) => {
        pub fn $write_name(w: &mut BitWriter, s: &str) -> Result<()> {
            let bytes = s.as_bytes();
            if bytes.len() > $n {
                return Err(SerializationError::OutOfRange);
            }
            w.write_bits_u16(bytes.len() as u16, 16)?;
            for b in bytes {
                w.write_bits_u8(*b, 8)?;
            }
            Ok(())
        }

        pub fn $read_name(r: &mut BitReader) -> Result<String> {
            let len = r.read_bits_u16(16)? as usize;
            if len > $n {
                return Err(SerializationError::Truncated);
            }
            let mut bytes = Vec::with_capacity(len);
            for _ in 0..len {
                bytes.push(r.read_bits_u8(8)?);
            }
            String::from_utf8(bytes).map_err(|_| SerializationError::Truncated)
        }
    };
}

fixed_string_writer!(write_fixed_string_32, read_fixed_string_32, 32);
fixed_string_writer!(write_fixed_string_64, read_fixed_string_64, 64);
fixed_string_writer!(write_fixed_string_128, read_fixed_string_128, 128);

/// A native little-endian, byte-granular cursor over a borrowed mutable slice.
///
/// Distinct from [`BitWriter`]: the snapshot message's outer framing (length
/// prefixes, the added/kept/removed sub-streams) is always byte-aligned, so paying
/// for bit-level bookkeeping there would be pure overhead.
pub struct ByteWriter<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn space_remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.space_remaining() < bytes.len() {
            return Err(SerializationError::NotEnoughSpace);
        }
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64_le(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn finish(self) -> &'a [u8] {
        &self.data[..self.pos]
    }
}

pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(SerializationError::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
    }
}
