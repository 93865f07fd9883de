//! Error types for the signature validation library.
//!
//! This module defines the crate-wide [`Error`] used by decoders and document
//! accessors, plus the validation-specific taxonomy: [`ChainError`] for chain
//! construction, [`SignatureVerificationError`] for cryptographic mismatches,
//! [`PolicyViolation`] for disallowed algorithms and [`RevocationError`] for
//! revocation lookups. Revocation errors never escape the resolver; they are
//! downgraded to unknown evidence.

use crate::validation::CertificateSummary;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading signatures and evidence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Certificate could not be decoded
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// CRL could not be decoded
    #[error("Invalid CRL: {0}")]
    InvalidCrl(String),

    /// OCSP response could not be decoded
    #[error("Invalid OCSP response: {0}")]
    InvalidOcsp(String),

    /// CMS SignedData or timestamp token could not be decoded
    #[error("Invalid CMS structure: {0}")]
    InvalidCms(String),

    /// Signature dictionary is malformed
    #[error("Invalid signature dictionary: {0}")]
    InvalidSignatureDictionary(String),

    /// PDF date string could not be parsed
    #[error("Invalid PDF date '{0}'")]
    InvalidDate(String),

    /// ByteRange does not describe the file
    #[error("Invalid ByteRange: {0}")]
    InvalidByteRange(String),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// No signature with the requested field name
    #[error("Signature not found: {0}")]
    SignatureNotFound(String),

    /// Algorithm is not supported by the crypto provider
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Revocation or issuer data could not be fetched
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::InvalidCms(err.to_string())
    }
}

/// Failure modes of certificate chain construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The chain would exceed the configured maximum depth
    #[error("certificate chain exceeds maximum depth of {max_depth}")]
    TooLong {
        /// Configured maximum depth
        max_depth: usize,
    },

    /// An issuer was already part of the chain
    #[error("certificate chain cycle detected at {certificate}")]
    CycleDetected {
        /// Certificate that was seen twice
        certificate: CertificateSummary,
    },

    /// No issuer could be found in any source
    #[error("issuer unresolvable for {certificate}")]
    IssuerUnresolvable {
        /// Certificate whose issuer is missing
        certificate: CertificateSummary,
    },

    /// Validation was cancelled while the chain was being walked
    #[error("chain building cancelled")]
    Cancelled,
}

impl ChainError {
    /// Whether this failure means "could not tell" rather than "proven bad".
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, ChainError::IssuerUnresolvable { .. } | ChainError::Cancelled)
    }
}

/// Cryptographic mismatch between data and its signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureVerificationError {
    /// The message-digest attribute does not match the signed bytes
    #[error("message digest mismatch")]
    DigestMismatch,

    /// The signature value does not verify with the signer key
    #[error("signature value does not verify with the signer key")]
    SignatureMismatch,

    /// A certificate is not signed by the key of its issuer
    #[error("certificate {certificate} is not signed by its issuer")]
    CertificateSignatureMismatch {
        /// Certificate whose signature failed
        certificate: CertificateSummary,
    },

    /// The timestamp imprint does not cover the signature value
    #[error("timestamp message imprint does not match the signature value")]
    TimestampImprintMismatch,
}

/// An algorithm was observed that the configured policy disallows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("algorithm {name} ({oid}) is not allowed for {location}")]
pub struct PolicyViolation {
    /// Algorithm name
    pub name: String,
    /// Algorithm OID
    pub oid: String,
    /// Where the algorithm was used
    pub location: String,
}

/// Reasons revocation data could not be used.
///
/// These are downgraded to unknown evidence by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevocationError {
    /// Evidence signature did not verify
    #[error("revocation data signature invalid")]
    InvalidSignature,

    /// Evidence does not cover the validation time
    #[error("revocation data not valid at validation time")]
    OutOfRange,

    /// No responder certificate could be matched
    #[error("OCSP responder not authorised: {0}")]
    UnauthorizedResponder(String),

    /// Evidence is about a different certificate
    #[error("revocation data does not match certificate")]
    NotApplicable,
}

/// Classified failure from an external fetcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transient I/O failure (connection reset, timeout); retried once
    #[error("transient I/O failure: {0}")]
    Transient(String),

    /// The server answered that the resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The server refused the request
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Live fetching is disabled or no fetcher is configured
    #[error("live fetching disabled")]
    Disabled,

    /// Any other failure, including malformed responses
    #[error("fetch failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Whether a single retry is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> CertificateSummary {
        CertificateSummary {
            subject: "CN=Leaf".to_string(),
            issuer: "CN=CA".to_string(),
            serial: "01".to_string(),
        }
    }

    #[test]
    fn test_invalid_certificate_error() {
        let err = Error::InvalidCertificate("truncated".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid certificate"));
        assert!(msg.contains("truncated"));
    }

    #[test]
    fn test_chain_error_inconclusive_classification() {
        assert!(!ChainError::TooLong { max_depth: 10 }.is_inconclusive());
        assert!(!ChainError::CycleDetected {
            certificate: summary()
        }
        .is_inconclusive());
        assert!(ChainError::IssuerUnresolvable {
            certificate: summary()
        }
        .is_inconclusive());
        assert!(ChainError::Cancelled.is_inconclusive());
    }

    #[test]
    fn test_chain_error_message() {
        let msg = ChainError::IssuerUnresolvable {
            certificate: summary(),
        }
        .to_string();
        assert!(msg.contains("issuer unresolvable"));
        assert!(msg.contains("CN=Leaf"));
    }

    #[test]
    fn test_fetch_error_transient() {
        assert!(FetchError::Transient("reset".into()).is_transient());
        assert!(!FetchError::NotFound("404".into()).is_transient());
        assert!(!FetchError::Unauthorized("401".into()).is_transient());
    }

    #[test]
    fn test_fetch_error_converts() {
        let err: Error = FetchError::Disabled.into();
        assert!(matches!(err, Error::Fetch(FetchError::Disabled)));
    }

    #[test]
    fn test_policy_violation_message() {
        let v = PolicyViolation {
            name: "MD5".into(),
            oid: "1.2.840.113549.2.5".into(),
            location: "signer digest".into(),
        };
        assert!(v.to_string().contains("MD5"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
        assert_send_sync::<ChainError>();
    }
}
