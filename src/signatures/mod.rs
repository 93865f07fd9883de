//! PDF Digital Signatures module.
//!
//! This module reads digital signatures embedded in PDF documents according
//! to the PDF specification and PAdES (PDF Advanced Electronic Signatures).
//!
//! ## Features
//!
//! - **Signature Dictionaries**: Extract `/ByteRange`, `/Contents`, `/M` and friends
//! - **ByteRange Handling**: Validate byte ranges and extract the signed bytes
//! - **CMS Decoding**: SignedData, signer attributes and RFC 3161 timestamp tokens
//! - **Signature Verification**: Signer, certificate and timestamp imprint checks
//!
//! ## Signature Types Supported
//!
//! - PKCS#7 detached signatures (adbe.pkcs7.detached)
//! - PKCS#7 SHA-1 signatures (adbe.pkcs7.sha1)
//! - PAdES signatures (ETSI.CAdES.detached)
//! - Document timestamps (ETSI.RFC3161)
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ISO 32000-2:2020 Section 12.8 - Digital Signatures
//! - ETSI EN 319 142 - PAdES

mod byterange;
pub mod cms;
pub mod crypto;
mod date;
mod types;
mod verifier;

pub use byterange::{decode_hex, ByteRange};
pub use self::cms::{CmsSignedData, SignerId, SignerInfo, TimestampToken, TstInfo};
pub use crypto::{CryptoProvider, RustCryptoProvider};
pub use date::parse_pdf_date;
pub use types::{
    AlgorithmIdentifier, DigestAlgorithm, SignatureInfo, SignatureScheme, SignatureSubFilter,
};
pub use verifier::{SignatureCheck, SignatureVerifier};
