//! PDF signature verification.
//!
//! This module reads signature dictionaries and checks the cryptographic
//! integrity of what they contain: the CMS signer signature over the
//! ByteRange-covered bytes, certificate signatures along a chain, and
//! timestamp message imprints. Trust decisions (chains, revocation) live in
//! [`crate::validation`].

use std::sync::Arc;

use super::cms::{CmsSignedData, TimestampToken};
use super::crypto::CryptoProvider;
use super::types::{AlgorithmIdentifier, DigestAlgorithm, SignatureInfo};
use crate::error::{Result, SignatureVerificationError};
use crate::object::Object;
use crate::validation::Certificate;

/// Outcome of one cryptographic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    /// The signature verifies
    Valid,
    /// Proven mismatch
    Invalid(SignatureVerificationError),
    /// Could not be checked (unsupported algorithm, malformed key)
    Indeterminate(String),
}

impl SignatureCheck {
    /// Whether the check passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Valid)
    }
}

/// Verifier for PDF digital signatures.
pub struct SignatureVerifier {
    crypto: Arc<dyn CryptoProvider>,
}

impl SignatureVerifier {
    /// Create a new signature verifier on top of a crypto provider.
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    /// The crypto provider in use.
    pub fn crypto(&self) -> &dyn CryptoProvider {
        self.crypto.as_ref()
    }

    /// Extract signature information from a signature dictionary.
    pub fn extract_signature_info(&self, sig_dict: &Object) -> Result<SignatureInfo> {
        SignatureInfo::from_dictionary(sig_dict)
    }

    /// Quick check if a signature appears valid (without cryptographic verification).
    pub fn quick_check(&self, sig_dict: &Object) -> Result<bool> {
        let info = self.extract_signature_info(sig_dict)?;

        // Basic sanity checks
        let has_valid_byte_range = info.byte_range.len() == 4;
        let has_sub_filter = info.sub_filter.is_some();

        Ok(has_valid_byte_range && has_sub_filter)
    }

    /// Verify `signature` over `data` with `public_key`.
    pub fn verify_signed(
        &self,
        data: &[u8],
        signature: &[u8],
        algorithm: &AlgorithmIdentifier,
        digest_hint: Option<DigestAlgorithm>,
        public_key: &[u8],
        mismatch: SignatureVerificationError,
    ) -> SignatureCheck {
        let scheme = algorithm.signature_scheme(digest_hint);
        match self.crypto.verify_signature(data, signature, public_key, scheme) {
            Ok(true) => SignatureCheck::Valid,
            Ok(false) => SignatureCheck::Invalid(mismatch),
            Err(e) => {
                log::debug!("cannot verify {} signature: {}", algorithm, e);
                SignatureCheck::Indeterminate(e.to_string())
            },
        }
    }

    /// Verify the signer signature of a CMS container over `signed_bytes`.
    ///
    /// With signed attributes the message-digest attribute must equal the
    /// digest of `signed_bytes` and the signature covers the attributes;
    /// without them the signature covers `signed_bytes` directly.
    pub fn verify_cms(
        &self,
        cms: &CmsSignedData,
        signed_bytes: &[u8],
        signer: &Certificate,
    ) -> SignatureCheck {
        let signer_info = &cms.signer;
        let Some(digest_algorithm) = DigestAlgorithm::from_oid(&signer_info.digest_algorithm.oid)
        else {
            return SignatureCheck::Indeterminate(format!(
                "unsupported digest {}",
                signer_info.digest_algorithm
            ));
        };

        let covered: &[u8] = match &signer_info.signed_attributes {
            Some(attributes) => {
                let digest = match self.crypto.digest(signed_bytes, digest_algorithm) {
                    Ok(digest) => digest,
                    Err(e) => return SignatureCheck::Indeterminate(e.to_string()),
                };
                if signer_info.message_digest.as_deref() != Some(digest.as_slice()) {
                    return SignatureCheck::Invalid(SignatureVerificationError::DigestMismatch);
                }
                attributes
            },
            None => signed_bytes,
        };

        self.verify_signed(
            covered,
            &signer_info.signature,
            &signer_info.signature_algorithm,
            Some(digest_algorithm),
            signer.public_key(),
            SignatureVerificationError::SignatureMismatch,
        )
    }

    /// Verify that `certificate` was signed by the key of `issuer`.
    pub fn verify_certificate(&self, certificate: &Certificate, issuer: &Certificate) -> SignatureCheck {
        self.verify_signed(
            certificate.tbs(),
            certificate.signature_value(),
            certificate.signature_algorithm(),
            None,
            issuer.public_key(),
            SignatureVerificationError::CertificateSignatureMismatch {
                certificate: certificate.summary(),
            },
        )
    }

    /// Verify that a timestamp's message imprint is the digest of `data`.
    pub fn verify_timestamp_imprint(&self, token: &TimestampToken, data: &[u8]) -> SignatureCheck {
        let Some(algorithm) = DigestAlgorithm::from_oid(&token.info.imprint_algorithm.oid) else {
            return SignatureCheck::Indeterminate(format!(
                "unsupported imprint digest {}",
                token.info.imprint_algorithm
            ));
        };
        match self.crypto.digest(data, algorithm) {
            Ok(digest) if digest == token.info.message_imprint => SignatureCheck::Valid,
            Ok(_) => SignatureCheck::Invalid(SignatureVerificationError::TimestampImprintMismatch),
            Err(e) => SignatureCheck::Indeterminate(e.to_string()),
        }
    }
}
