//! The transport contract this crate consumes. Kept deliberately narrow, framing,
//! encryption, congestion control, and connection lifecycle all live below this
//! trait; a reliable TCP-like transport, a UDP transport with its own ack/congestion
//! layer, and an in-process loopback for tests are all exchangeable implementations.

/// Delivery guarantee a message is sent on. Snapshots always use [`Channel::Reliable`]
///, see §5's ordering guarantee: the client must process snapshots in send order,
/// and delta baselines depend on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Reliable,
    Unreliable,
}

/// A connection identifier, opaque to this crate. The transport assigns and owns
/// the namespace; this crate only ever threads it through.
pub type ConnectionId = u64;

/// Narrow capability trait for whatever moves bytes between peers. Implementations
/// are not required to be `Send`/`Sync`, the replication core runs single-threaded
/// per world (see the crate-level concurrency notes).
pub trait Transport {
    /// Maximum payload size the transport will carry in one message on `channel`,
    /// including whatever envelope the transport itself adds.
    fn max_packet_size(&self, channel: Channel) -> u32;

    /// Attempt to send `bytes` to `connection` on `channel`. Returns `false` if the
    /// transport rejected the send (e.g. the connection is gone, or a local
    /// congestion window is full), the caller must not assume the message arrived,
    /// but also must not retry it itself; delivery retries are the transport's job
    /// for [`Channel::Reliable`].
    fn send(&mut self, connection: ConnectionId, bytes: &[u8], channel: Channel) -> bool;
}
