//! Digital signature types and data structures.
//!
//! This module defines the core types used when reading PDF digital signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::object::Object;

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// MD5 (broken, only seen in very old PDFs)
    Md5,
    /// SHA-1 (deprecated, but still common in legacy PDFs)
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256 (recommended)
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Get the dotted OID for this digest algorithm.
    pub fn oid(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "1.2.840.113549.2.5",
            DigestAlgorithm::Sha1 => "1.3.14.3.2.26",
            DigestAlgorithm::Sha224 => "2.16.840.1.101.3.4.2.4",
            DigestAlgorithm::Sha256 => "2.16.840.1.101.3.4.2.1",
            DigestAlgorithm::Sha384 => "2.16.840.1.101.3.4.2.2",
            DigestAlgorithm::Sha512 => "2.16.840.1.101.3.4.2.3",
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha224 => "SHA-224",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Resolve a digest algorithm from its dotted OID.
    pub fn from_oid(oid: &str) -> Option<Self> {
        match oid {
            "1.2.840.113549.2.5" => Some(DigestAlgorithm::Md5),
            "1.3.14.3.2.26" => Some(DigestAlgorithm::Sha1),
            "2.16.840.1.101.3.4.2.4" => Some(DigestAlgorithm::Sha224),
            "2.16.840.1.101.3.4.2.1" => Some(DigestAlgorithm::Sha256),
            "2.16.840.1.101.3.4.2.2" => Some(DigestAlgorithm::Sha384),
            "2.16.840.1.101.3.4.2.3" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
    /// ETSI.RFC3161 - Timestamp token
    Rfc3161,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            "ETSI.RFC3161" => Some(SignatureSubFilter::Rfc3161),
            _ => None,
        }
    }

    /// Document timestamps carry a timestamp token instead of a signer signature.
    pub fn is_document_timestamp(&self) -> bool {
        matches!(self, SignatureSubFilter::Rfc3161)
    }
}

/// An algorithm identifier as it appears in certificates, CMS and revocation data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmIdentifier {
    /// Dotted OID
    pub oid: String,
    /// Human readable name, or the OID when the algorithm is unknown
    pub name: String,
}

impl AlgorithmIdentifier {
    /// Create an identifier from an OID, resolving the well-known name.
    pub fn from_oid(oid: impl Into<String>) -> Self {
        let oid = oid.into();
        let name = crate::validation::algorithm_name(&oid)
            .map(str::to_string)
            .unwrap_or_else(|| oid.clone());
        Self { oid, name }
    }

    /// Create an identifier with an explicit name.
    pub fn new(oid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            name: name.into(),
        }
    }

    /// Identifier for a digest algorithm.
    pub fn digest(alg: DigestAlgorithm) -> Self {
        Self::new(alg.oid(), alg.name())
    }

    /// Resolve the signature scheme this identifier denotes.
    ///
    /// CMS signer infos frequently use plain `rsaEncryption` as the signature
    /// algorithm; the digest then comes from the separate digest algorithm,
    /// passed as `digest_hint`.
    pub fn signature_scheme(&self, digest_hint: Option<DigestAlgorithm>) -> SignatureScheme {
        use DigestAlgorithm::*;
        match self.oid.as_str() {
            "1.2.840.113549.1.1.1" => match digest_hint {
                Some(d) => SignatureScheme::RsaPkcs1v15(d),
                None => SignatureScheme::Unknown,
            },
            "1.2.840.113549.1.1.4" => SignatureScheme::RsaPkcs1v15(Md5),
            "1.2.840.113549.1.1.5" => SignatureScheme::RsaPkcs1v15(Sha1),
            "1.2.840.113549.1.1.14" => SignatureScheme::RsaPkcs1v15(Sha224),
            "1.2.840.113549.1.1.11" => SignatureScheme::RsaPkcs1v15(Sha256),
            "1.2.840.113549.1.1.12" => SignatureScheme::RsaPkcs1v15(Sha384),
            "1.2.840.113549.1.1.13" => SignatureScheme::RsaPkcs1v15(Sha512),
            "1.2.840.113549.1.1.10" => SignatureScheme::RsaPss,
            "1.2.840.10045.4.1" => SignatureScheme::Ecdsa(Sha1),
            "1.2.840.10045.4.3.1" => SignatureScheme::Ecdsa(Sha224),
            "1.2.840.10045.4.3.2" => SignatureScheme::Ecdsa(Sha256),
            "1.2.840.10045.4.3.3" => SignatureScheme::Ecdsa(Sha384),
            "1.2.840.10045.4.3.4" => SignatureScheme::Ecdsa(Sha512),
            "1.3.101.112" => SignatureScheme::Ed25519,
            _ => SignatureScheme::Unknown,
        }
    }
}

impl fmt::Display for AlgorithmIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.oid)
    }
}

/// Concrete signature scheme handed to the crypto provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// RSASSA-PKCS1-v1_5 with the given digest
    RsaPkcs1v15(DigestAlgorithm),
    /// RSASSA-PSS (parameters carried in the identifier)
    RsaPss,
    /// ECDSA with the given digest
    Ecdsa(DigestAlgorithm),
    /// Ed25519
    Ed25519,
    /// Not recognised here; providers may still know the OID
    Unknown,
}

/// Information about an existing signature in a PDF.
#[derive(Debug, Clone, Default)]
pub struct SignatureInfo {
    /// Name of the signer
    pub signer_name: Option<String>,
    /// Signing time as written in /M
    pub signing_time: Option<String>,
    /// Reason for signing
    pub reason: Option<String>,
    /// Signing location
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Signature sub-filter type
    pub sub_filter: Option<SignatureSubFilter>,
    /// Whether the ByteRange has the two-segment shape of a whole-document signature
    pub covers_whole_document: bool,
    /// Byte range of the signed data
    pub byte_range: Vec<i64>,
    /// Raw /Contents bytes (the CMS or timestamp token)
    pub contents: Vec<u8>,
}

impl SignatureInfo {
    /// Read the entries of a signature dictionary.
    pub fn from_dictionary(sig_dict: &Object) -> Result<SignatureInfo> {
        let dict = sig_dict.as_dict().ok_or_else(|| {
            Error::InvalidSignatureDictionary(format!(
                "signature must be a dictionary, found {}",
                sig_dict.type_name()
            ))
        })?;

        let mut info = SignatureInfo::default();

        // Extract /Name
        if let Some(Object::String(name)) = dict.get("Name") {
            info.signer_name = Some(String::from_utf8_lossy(name).to_string());
        }

        // Extract /M (signing time)
        if let Some(Object::String(time)) = dict.get("M") {
            info.signing_time = Some(String::from_utf8_lossy(time).to_string());
        }

        // Extract /Reason
        if let Some(Object::String(reason)) = dict.get("Reason") {
            info.reason = Some(String::from_utf8_lossy(reason).to_string());
        }

        // Extract /Location
        if let Some(Object::String(location)) = dict.get("Location") {
            info.location = Some(String::from_utf8_lossy(location).to_string());
        }

        // Extract /ContactInfo
        if let Some(Object::String(contact)) = dict.get("ContactInfo") {
            info.contact_info = Some(String::from_utf8_lossy(contact).to_string());
        }

        // Extract /SubFilter
        if let Some(Object::Name(sub_filter)) = dict.get("SubFilter") {
            info.sub_filter = SignatureSubFilter::from_pdf_name(sub_filter);
            if info.sub_filter.is_none() {
                log::debug!("unrecognised signature sub-filter {}", sub_filter);
            }
        }

        // Extract /ByteRange
        if let Some(Object::Array(byte_range)) = dict.get("ByteRange") {
            info.byte_range = byte_range.iter().filter_map(Object::as_integer).collect();
        }

        // Extract /Contents (already hex-decoded by the object parser)
        if let Some(Object::String(contents)) = dict.get("Contents") {
            info.contents = contents.clone();
        }

        // Check if signature covers whole document (ByteRange should be 4 elements)
        info.covers_whole_document = info.byte_range.len() == 4;

        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_algorithm_names() {
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
        assert_eq!(DigestAlgorithm::Sha1.name(), "SHA-1");
        assert_eq!(DigestAlgorithm::Md5.to_string(), "MD5");
    }

    #[test]
    fn test_digest_algorithm_oid_lookup() {
        for alg in [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha224,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(DigestAlgorithm::from_oid(alg.oid()), Some(alg));
        }
        assert_eq!(DigestAlgorithm::from_oid("1.2.3"), None);
    }

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("adbe.pkcs7.detached"),
            Some(SignatureSubFilter::Pkcs7Detached)
        );
        assert!(SignatureSubFilter::Rfc3161.is_document_timestamp());
        assert!(!SignatureSubFilter::CadesDetached.is_document_timestamp());
    }

    #[test]
    fn test_signature_scheme_resolution() {
        let rsa = AlgorithmIdentifier::from_oid("1.2.840.113549.1.1.1");
        assert_eq!(
            rsa.signature_scheme(Some(DigestAlgorithm::Sha384)),
            SignatureScheme::RsaPkcs1v15(DigestAlgorithm::Sha384)
        );
        assert_eq!(rsa.signature_scheme(None), SignatureScheme::Unknown);

        let sha256_rsa = AlgorithmIdentifier::from_oid("1.2.840.113549.1.1.11");
        assert_eq!(
            sha256_rsa.signature_scheme(Some(DigestAlgorithm::Sha1)),
            SignatureScheme::RsaPkcs1v15(DigestAlgorithm::Sha256)
        );
        assert_eq!(
            AlgorithmIdentifier::from_oid("1.3.101.112").signature_scheme(None),
            SignatureScheme::Ed25519
        );
    }

    #[test]
    fn test_algorithm_identifier_names() {
        assert_eq!(AlgorithmIdentifier::from_oid("2.16.840.1.101.3.4.2.1").name, "SHA-256");
        let unknown = AlgorithmIdentifier::from_oid("1.2.3.4");
        assert_eq!(unknown.name, "1.2.3.4");
        assert_eq!(AlgorithmIdentifier::digest(DigestAlgorithm::Sha512).oid, "2.16.840.1.101.3.4.2.3");
    }
}
