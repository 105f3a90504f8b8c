//! Error types for the image cache

use thiserror::Error;

/// Main error type for cache and streaming operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("image store file truncated ({0} bytes)")]
    Truncated(u64),

    #[error("image store format error: {0}")]
    Format(String),
}
