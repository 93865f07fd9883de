//! Cryptographic primitives consumed by validation.
//!
//! Validation only needs two operations: computing a digest and checking a
//! signature value against a public key. Both go through [`CryptoProvider`]
//! so callers can plug in an HSM, a FIPS module or a test double.
//! [`RustCryptoProvider`] is the default backend built on the RustCrypto
//! crates.

use crate::error::{Error, Result};
use crate::signatures::types::{DigestAlgorithm, SignatureScheme};

use der::Decode;
use pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::RsaPublicKey;
use sha2::Digest;
use signature::Verifier;
use spki::SubjectPublicKeyInfoRef;

/// Digest and signature primitives.
pub trait CryptoProvider: Send + Sync {
    /// Compute `algorithm(data)`.
    fn digest(&self, data: &[u8], algorithm: DigestAlgorithm) -> Result<Vec<u8>>;

    /// Verify `signature` over `data` with a DER `SubjectPublicKeyInfo`.
    ///
    /// Returns `Ok(false)` on a mismatch and `Err` when the key or scheme
    /// cannot be handled at all.
    fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<bool>;
}

/// Default provider: MD5/SHA-1/SHA-2 digests and RSA PKCS#1 v1.5 signatures.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustCryptoProvider;

impl RustCryptoProvider {
    /// Create a new provider.
    pub fn new() -> Self {
        Self
    }

    fn verify_rsa<D>(data: &[u8], signature: &[u8], public_key: &[u8]) -> Result<bool>
    where
        D: Digest + der::oid::AssociatedOid,
    {
        let spki = SubjectPublicKeyInfoRef::from_der(public_key)
            .map_err(|e| Error::InvalidCertificate(format!("public key info: {}", e)))?;
        let key = RsaPublicKey::from_pkcs1_der(spki.subject_public_key.raw_bytes())
            .map_err(|e| Error::InvalidCertificate(format!("RSA public key: {}", e)))?;
        let verifying_key = VerifyingKey::<D>::new(key);
        let signature = match Signature::try_from(signature) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        Ok(verifying_key.verify(data, &signature).is_ok())
    }
}

impl CryptoProvider for RustCryptoProvider {
    fn digest(&self, data: &[u8], algorithm: DigestAlgorithm) -> Result<Vec<u8>> {
        let digest = match algorithm {
            DigestAlgorithm::Md5 => md5::Md5::digest(data).to_vec(),
            DigestAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha224 => sha2::Sha224::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        };
        Ok(digest)
    }

    fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        scheme: SignatureScheme,
    ) -> Result<bool> {
        match scheme {
            SignatureScheme::RsaPkcs1v15(DigestAlgorithm::Sha1) => {
                Self::verify_rsa::<sha1::Sha1>(data, signature, public_key)
            },
            SignatureScheme::RsaPkcs1v15(DigestAlgorithm::Sha224) => {
                Self::verify_rsa::<sha2::Sha224>(data, signature, public_key)
            },
            SignatureScheme::RsaPkcs1v15(DigestAlgorithm::Sha256) => {
                Self::verify_rsa::<sha2::Sha256>(data, signature, public_key)
            },
            SignatureScheme::RsaPkcs1v15(DigestAlgorithm::Sha384) => {
                Self::verify_rsa::<sha2::Sha384>(data, signature, public_key)
            },
            SignatureScheme::RsaPkcs1v15(DigestAlgorithm::Sha512) => {
                Self::verify_rsa::<sha2::Sha512>(data, signature, public_key)
            },
            other => Err(Error::UnsupportedAlgorithm(format!("{:?}", other))),
        }
    }
}

/// Lowercase hex rendering used for serials and fingerprints.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
