//! Error type shared by [`crate::bitbuffer`] and [`crate::value_codec`].

/// Result alias for the bit-level codec layer.
pub type Result<T> = core::result::Result<T, SerializationError>;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationError {
    /// The writer does not have enough remaining bits/bytes to hold the value.
    #[error("not enough space in buffer")]
    NotEnoughSpace,
    /// The reader ran off the end of the buffer before finishing a value.
    #[error("buffer truncated")]
    Truncated,
    /// A value was written outside of its declared range. Always a programmer error.
    #[error("value out of declared range")]
    OutOfRange,
}
