use thiserror::Error;

/// Errors raised by ring operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    /// `append` was called with a sample vector whose length does not match the
    /// configured channel count.
    #[error("sample vector has {got} entries, expected {expected}")]
    ChannelCountMismatch { expected: usize, got: usize },

    /// `push_chunk` was called with mismatched timestamp/value slice lengths.
    #[error("chunk timestamps ({timestamps}) and values ({values}) have different lengths")]
    ChunkLengthMismatch { timestamps: usize, values: usize },

    /// A secondary channel index was out of range for the bank.
    #[error("secondary channel index {index} out of range (bank has {len} channels)")]
    ChannelIndexOutOfRange { index: usize, len: usize },

    /// A ring was configured with a zero-length buffer.
    #[error("buffer length must be at least 1")]
    ZeroLengthBuffer,
}
