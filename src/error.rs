//! Error types for digest construction, queries and decoding

/// Error raised by digest operations
///
/// Every fallible operation validates its inputs before touching any state,
/// so a returned error leaves the digest exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigestError {
    /// An argument is outside its accepted domain
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The operation is not defined for the digest's current state
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    /// A serialized buffer could not be decoded
    #[error("malformed digest bytes: {0}")]
    Format(#[from] DecodeError),
}

/// Error during digest decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Input buffer is shorter than the fixed header
    #[error("buffer too short: expected at least {expected} bytes, found {found}")]
    BufferTooShort { expected: usize, found: usize },
    /// Payload after the header is not a whole number of centroid records
    #[error("{0} trailing bytes do not form a whole centroid record")]
    TrailingBytes(usize),
    /// Records decode but describe an impossible digest
    #[error("corrupted data: {0}")]
    Corrupted(&'static str),
}

/// Result alias used throughout the crate
pub type Result<T, E = DigestError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "std")]
    #[test]
    fn test_display() {
        let err = DigestError::InvalidArgument("weight must be positive");
        assert_eq!(err.to_string(), "invalid argument: weight must be positive");

        let err: DigestError = DecodeError::BufferTooShort {
            expected: 40,
            found: 12,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "malformed digest bytes: buffer too short: expected at least 40 bytes, found 12"
        );
    }

    #[test]
    fn test_from_decode_error() {
        let err: DigestError = DecodeError::TrailingBytes(3).into();
        assert_eq!(err, DigestError::Format(DecodeError::TrailingBytes(3)));
    }
}
