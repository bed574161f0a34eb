use thiserror::Error;

pub type EitxtResult<T> = Result<T, EitxtError>;

/// The only text ever reported for a cryptographic or integrity failure.
pub const INTEGRITY_MESSAGE: &str = "wrong key or corrupted data";

/// Coarse error classes surfaced to callers.
///
/// Transport layers map on the kind, never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Structural, pre-cryptographic rejection of an armored container
    MalformedEnvelope,
    /// Tag mismatch, bad compressed stream, or size mismatch after decrypt
    Integrity,
    /// Missing or invalid caller input
    InvalidInput,
    /// Payload exceeds a configured ceiling
    ResourceLimit,
    /// Anything else; details are never shown to remote callers
    Internal,
}

/// Reasons an armored container is rejected before any key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("invalid EITXT format: missing header or footer")]
    MissingArmor,

    #[error("invalid EITXT magic")]
    BadMagic,

    #[error("unsupported EITXT version")]
    UnsupportedVersion,

    #[error("unsupported cipher")]
    UnsupportedCipher,

    #[error("unsupported KDF algorithm")]
    UnsupportedKdf,

    /// Duplicate, missing, or out-of-range chunk sequence numbers
    #[error("{}", INTEGRITY_MESSAGE)]
    BadSequence,

    /// Undecodable base64, unparsable JSON, or a field of the wrong shape
    #[error("{}", INTEGRITY_MESSAGE)]
    Undecodable,
}

#[derive(Debug, Error)]
pub enum EitxtError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("{}", INTEGRITY_MESSAGE)]
    Integrity,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported file type: {0}")]
    UnsupportedMedia(String),

    #[error("payload too large: {actual} bytes exceeds limit of {limit} bytes")]
    TooLarge { limit: u64, actual: u64 },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EitxtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Envelope(_) => ErrorKind::MalformedEnvelope,
            Self::Integrity => ErrorKind::Integrity,
            Self::InvalidInput(_) | Self::UnsupportedMedia(_) => ErrorKind::InvalidInput,
            Self::TooLarge { .. } => ErrorKind::ResourceLimit,
            Self::Config(_) | Self::Io(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Text that is safe to hand to a remote caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::Envelope(e) => e.to_string(),
            Self::Integrity => INTEGRITY_MESSAGE.to_string(),
            Self::InvalidInput(msg) => format!("invalid input: {msg}"),
            Self::UnsupportedMedia(_) => "unsupported file type".to_string(),
            Self::TooLarge { .. } => "payload too large".to_string(),
            Self::Config(_) | Self::Io(_) | Self::Other(_) => "internal server error".to_string(),
        }
    }

    /// Reject `actual` bytes when they exceed `limit`.
    pub fn check_size(actual: usize, limit: u64) -> EitxtResult<()> {
        let actual = actual as u64;
        if actual > limit {
            return Err(Self::TooLarge { limit, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_class_failures_share_one_message() {
        let messages = [
            EitxtError::Integrity.to_string(),
            EitxtError::Integrity.public_message(),
            EitxtError::from(EnvelopeError::Undecodable).to_string(),
            EitxtError::from(EnvelopeError::BadSequence).public_message(),
        ];
        for msg in messages {
            assert_eq!(msg, INTEGRITY_MESSAGE);
        }
    }

    #[test]
    fn envelope_errors_are_malformed_kind() {
        for e in [
            EnvelopeError::MissingArmor,
            EnvelopeError::BadMagic,
            EnvelopeError::UnsupportedVersion,
            EnvelopeError::UnsupportedCipher,
            EnvelopeError::UnsupportedKdf,
            EnvelopeError::BadSequence,
            EnvelopeError::Undecodable,
        ] {
            assert_eq!(EitxtError::from(e).kind(), ErrorKind::MalformedEnvelope);
        }
    }

    #[test]
    fn internal_details_are_not_public() {
        let err = EitxtError::Other(anyhow::anyhow!("deflate stream exploded at offset 42"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn check_size_boundary() {
        assert!(EitxtError::check_size(100, 100).is_ok());
        let err = EitxtError::check_size(101, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        assert_eq!(err.public_message(), "payload too large");
    }

    #[test]
    fn armor_message_is_specific() {
        let err = EitxtError::from(EnvelopeError::MissingArmor);
        assert_eq!(
            err.public_message(),
            "invalid EITXT format: missing header or footer"
        );
    }
}
