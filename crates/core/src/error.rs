//! Core error types

use thiserror::Error;

/// Errors from the hand-framed wire encodings in [`crate::series`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("buffer underflow while decoding {0}")]
    Underflow(&'static str),
    #[error("unknown data type ordinal {0}")]
    UnknownDataType(u8),
    #[error("unknown encoding ordinal {0}")]
    UnknownEncoding(u8),
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),
}
