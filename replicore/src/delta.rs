//! Block-based delta codec: encode the difference between two equal-length byte
//! slices as a changed-blocks bitset prefix followed by the raw bytes of the blocks
//! that changed.

use fixedbitset::FixedBitSet;
use replicore_serde::error::SerializationError;
use replicore_serde::value_codec::{ByteReader, ByteWriter};
use replicore_serde::Result;

fn num_blocks(len: usize, block_size: usize) -> usize {
    len.div_ceil(block_size)
}

fn prefix_bytes(num_blocks: usize) -> usize {
    num_blocks.div_ceil(8)
}

/// Upper bound on the compressed size of a patch between two `len`-byte buffers:
/// every block changed, plus the changed-bits prefix.
pub fn max_patch_size(len: usize, block_size: usize) -> usize {
    len + prefix_bytes(num_blocks(len, block_size))
}

fn block_range(index: usize, block_size: usize, len: usize) -> std::ops::Range<usize> {
    let start = index * block_size;
    let end = (start + block_size).min(len);
    start..end
}

/// Compress `current` relative to `previous` (same length) into `out`. Returns the
/// number of bytes written. Fails atomically, before writing anything, if `out` is
/// smaller than [`max_patch_size`].
pub fn compress(previous: &[u8], current: &[u8], block_size: usize, out: &mut [u8]) -> Result<usize> {
    debug_assert_eq!(previous.len(), current.len(), "delta compress: length mismatch");
    let len = previous.len();
    if out.len() < max_patch_size(len, block_size) {
        return Err(SerializationError::NotEnoughSpace);
    }

    let blocks = num_blocks(len, block_size);
    let mut changed = FixedBitSet::with_capacity(blocks);
    for i in 0..blocks {
        let range = block_range(i, block_size, len);
        if previous[range.clone()] != current[range] {
            changed.insert(i);
        }
    }

    let mut prefix = vec![0u8; prefix_bytes(blocks)];
    for i in changed.ones() {
        prefix[i / 8] |= 1 << (i % 8);
    }

    let mut writer = ByteWriter::new(out);
    writer.write_bytes(&prefix)?;
    for i in 0..blocks {
        if changed.contains(i) {
            writer.write_bytes(&current[block_range(i, block_size, len)])?;
        }
    }
    Ok(writer.position())
}

/// Decompress `patch` (produced by [`compress`] against `previous`) into `out`,
/// which must be exactly `previous.len()` bytes. Stops reading as soon as the last
/// block is consumed, trailing bytes in `patch` are never touched.
pub fn decompress(previous: &[u8], patch: &[u8], block_size: usize, out: &mut [u8]) -> Result<()> {
    let len = previous.len();
    debug_assert_eq!(out.len(), len, "delta decompress: output length mismatch");

    let blocks = num_blocks(len, block_size);
    let mut reader = ByteReader::new(patch);
    let prefix = reader.read_bytes(prefix_bytes(blocks))?;

    for i in 0..blocks {
        let range = block_range(i, block_size, len);
        let bit = (prefix[i / 8] >> (i % 8)) & 1 != 0;
        if bit {
            let block = reader.read_bytes(range.len())?;
            out[range].copy_from_slice(block);
        } else {
            out[range.clone()].copy_from_slice(&previous[range]);
        }
    }
    Ok(())
}
