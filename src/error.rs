use thiserror::Error;

/// Failures raised by the protocol codecs and the hex helpers.
///
/// None of these are fatal: the poll loop decides whether to retry, skip or give up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid hex string {input:?}: {reason}")]
    Format { input: String, reason: &'static str },

    #[error("response too short: got {actual} bytes, expected at least {expected}")]
    ShortResponse { expected: usize, actual: usize },

    #[error("invalid CRC (expected: {expected:02X?}; actual: {actual:02X?})")]
    CrcMismatch { expected: [u8; 2], actual: [u8; 2] },

    #[error("invalid checksum (expected: {expected:02X}; actual: {actual:02X})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("unexpected function code {0:#04X} in response")]
    UnknownFunction(u8),

    #[error("cannot create hex from type: {0}")]
    UnsupportedType(&'static str),
}

impl CodecError {
    /// True when the frame arrived complete but failed its CRC/checksum.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            CodecError::CrcMismatch { .. } | CodecError::ChecksumMismatch { .. }
        )
    }
}
