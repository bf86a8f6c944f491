//! Tunable constants threaded explicitly through the replication pipeline.
//!
//! Constructed once by whatever owns the [`crate::server::ReplicationServer`] /
//! [`crate::client::ReplicationClient`] and passed by shared reference into every
//! tick, no global or thread-local state, no attribute-driven wiring.

/// World-scale bounds and precision for position quantization, delta block size, and
/// the default transport MTU assumed when none is supplied by the transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicationConfig {
    /// Inclusive bounds passed to `write_f32_quantized` for each position axis.
    /// Must cover the game's coordinate range without wasting bits.
    pub position_bounds: (f32, f32),
    /// Quantization step for position components, in world units.
    pub position_precision: f32,
    /// Block size used by the delta codec, in bytes.
    pub delta_block_size: usize,
    /// Used only when the transport does not report its own `max_packet_size`.
    pub default_max_packet_size: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            position_bounds: (-1024.0, 1024.0),
            position_precision: 0.01,
            delta_block_size: 4,
            default_max_packet_size: 1200,
        }
    }
}
