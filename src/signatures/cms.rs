//! CMS SignedData and RFC 3161 timestamp tokens.
//!
//! The `/Contents` of a PDF signature is a DER `ContentInfo` wrapping a
//! detached `SignedData`, zero padded to the size reserved in the file.
//! Decoding keeps what validation needs: the embedded certificates, the
//! first signer info with its signed attributes, and any timestamp token
//! carried as an unsigned attribute.

use chrono::{DateTime, NaiveDateTime, Utc};
use cms::content_info::ContentInfo;
use cms::cert::CertificateChoices;
use cms::signed_data::{SignedData, SignerIdentifier};
use der::asn1::{Any, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Reader, Sequence, SliceReader, Tag, Tagged};
use std::sync::Arc;
use x509_cert::attr::Attribute;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::time::Time;

use super::types::AlgorithmIdentifier;
use crate::error::{Error, Result};
use crate::validation::certificate::{normalize_serial, Certificate};

const OID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
const OID_MESSAGE_DIGEST: &str = "1.2.840.113549.1.9.4";
const OID_SIGNING_TIME: &str = "1.2.840.113549.1.9.5";
const OID_TIMESTAMP_TOKEN: &str = "1.2.840.113549.1.9.16.2.14";

fn cms_err(e: impl std::fmt::Display) -> Error {
    Error::InvalidCms(e.to_string())
}

/// How the signer info points at its certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerId {
    /// Issuer DER name and serial
    IssuerAndSerial {
        /// DER issuer name
        issuer_raw: Vec<u8>,
        /// Serial, big-endian without leading zeros
        serial: Vec<u8>,
    },
    /// Subject key identifier
    KeyId(Vec<u8>),
}

impl SignerId {
    /// Whether `cert` is the certificate this id names.
    pub fn matches(&self, cert: &Certificate) -> bool {
        match self {
            SignerId::IssuerAndSerial { issuer_raw, serial } => {
                issuer_raw.as_slice() == cert.issuer_raw() && serial.as_slice() == cert.serial()
            },
            SignerId::KeyId(kid) => cert.subject_key_id() == Some(kid.as_slice()),
        }
    }
}

/// The signer of a CMS SignedData.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfo {
    /// Signer certificate reference
    pub signer_id: SignerId,
    /// Digest algorithm over the content
    pub digest_algorithm: AlgorithmIdentifier,
    /// Signature algorithm
    pub signature_algorithm: AlgorithmIdentifier,
    /// DER of the signed attributes as a SET OF (what the signature covers)
    pub signed_attributes: Option<Vec<u8>>,
    /// messageDigest attribute
    pub message_digest: Option<Vec<u8>>,
    /// signingTime attribute
    pub signing_time: Option<DateTime<Utc>>,
    /// Signature value
    pub signature: Vec<u8>,
    /// Unsigned signature timestamp token (DER ContentInfo)
    pub timestamp_token: Option<Vec<u8>>,
}

/// Decoded CMS SignedData.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmsSignedData {
    /// Certificates shipped in the container
    pub certificates: Vec<Arc<Certificate>>,
    /// The (first) signer
    pub signer: SignerInfo,
    /// Encapsulated content, for attached signatures and timestamp tokens
    pub encapsulated_content: Option<Vec<u8>>,
}

impl CmsSignedData {
    /// Decode a DER `ContentInfo`; trailing bytes (padding) are ignored.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let mut reader = SliceReader::new(bytes).map_err(cms_err)?;
        let content_info: ContentInfo = reader.decode().map_err(cms_err)?;
        if content_info.content_type.to_string() != OID_SIGNED_DATA {
            return Err(Error::InvalidCms(format!(
                "content type {} is not signedData",
                content_info.content_type
            )));
        }
        let signed_data: SignedData = content_info.content.decode_as().map_err(cms_err)?;

        let mut certificates = Vec::new();
        if let Some(set) = &signed_data.certificates {
            for choice in set.0.iter() {
                if let CertificateChoices::Certificate(cert) = choice {
                    match cert.to_der().map_err(Error::from).and_then(|d| Certificate::from_der(&d)) {
                        Ok(cert) => certificates.push(Arc::new(cert)),
                        Err(e) => log::warn!("skipping undecodable CMS certificate: {}", e),
                    }
                }
            }
        }

        let signer_info = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .ok_or_else(|| Error::InvalidCms("no signer info".to_string()))?;

        let signer_id = match &signer_info.sid {
            SignerIdentifier::IssuerAndSerialNumber(isn) => SignerId::IssuerAndSerial {
                issuer_raw: isn.issuer.to_der().map_err(cms_err)?,
                serial: normalize_serial(isn.serial_number.as_bytes()),
            },
            SignerIdentifier::SubjectKeyIdentifier(ski) => SignerId::KeyId(ski.0.as_bytes().to_vec()),
        };

        let mut message_digest = None;
        let mut signing_time = None;
        let signed_attributes = match &signer_info.signed_attrs {
            Some(attrs) => {
                for attr in attrs.iter() {
                    match attr.oid.to_string().as_str() {
                        OID_MESSAGE_DIGEST => {
                            let value = first_value(attr)?;
                            let digest: OctetString = value.decode_as().map_err(cms_err)?;
                            message_digest = Some(digest.as_bytes().to_vec());
                        },
                        OID_SIGNING_TIME => {
                            let value = first_value(attr)?;
                            let time = Time::from_der(&value.to_der().map_err(cms_err)?)
                                .map_err(cms_err)?;
                            signing_time = unix_to_utc(time.to_unix_duration().as_secs());
                        },
                        _ => {},
                    }
                }
                Some(attrs.to_der().map_err(cms_err)?)
            },
            None => None,
        };

        let mut timestamp_token = None;
        if let Some(attrs) = &signer_info.unsigned_attrs {
            for attr in attrs.iter() {
                if attr.oid.to_string() == OID_TIMESTAMP_TOKEN {
                    timestamp_token = Some(first_value(attr)?.to_der().map_err(cms_err)?);
                }
            }
        }

        let encapsulated_content = match &signed_data.encap_content_info.econtent {
            Some(any) => {
                let octets: OctetString = any.decode_as().map_err(cms_err)?;
                Some(octets.as_bytes().to_vec())
            },
            None => None,
        };

        Ok(Self {
            certificates,
            signer: SignerInfo {
                signer_id,
                digest_algorithm: algorithm(&signer_info.digest_alg),
                signature_algorithm: algorithm(&signer_info.signature_algorithm),
                signed_attributes,
                message_digest,
                signing_time,
                signature: signer_info.signature.as_bytes().to_vec(),
                timestamp_token,
            },
            encapsulated_content,
        })
    }

    /// Certificate of the signer among the embedded ones.
    pub fn signer_certificate(&self) -> Option<Arc<Certificate>> {
        self.certificates
            .iter()
            .find(|cert| self.signer.signer_id.matches(cert))
            .cloned()
    }
}

fn first_value(attr: &Attribute) -> Result<&Any> {
    attr.values
        .iter()
        .next()
        .ok_or_else(|| Error::InvalidCms(format!("attribute {} has no value", attr.oid)))
}

fn algorithm(id: &AlgorithmIdentifierOwned) -> AlgorithmIdentifier {
    AlgorithmIdentifier::from_oid(id.oid.to_string())
}

fn unix_to_utc(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs).ok().and_then(|s| DateTime::from_timestamp(s, 0))
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct MessageImprintDer {
    hash_algorithm: AlgorithmIdentifierOwned,
    hashed_message: OctetString,
}

/// `YYYYMMDDHHMMSS[.f*]Z`; fractional seconds are common in TSA responses
/// and rejected by strict DER time types.
fn parse_generalized_time(value: &[u8]) -> Result<DateTime<Utc>> {
    let text = std::str::from_utf8(value).map_err(cms_err)?;
    let text = text
        .strip_suffix('Z')
        .ok_or_else(|| Error::InvalidCms(format!("genTime not in UTC: {}", text)))?;
    let whole = text.split('.').next().unwrap_or(text);
    NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::InvalidCms(format!("genTime '{}': {}", text, e)))
}

/// Content of a timestamp token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TstInfo {
    /// genTime
    pub gen_time: DateTime<Utc>,
    /// Hash algorithm of the message imprint
    pub imprint_algorithm: AlgorithmIdentifier,
    /// Hashed message
    pub message_imprint: Vec<u8>,
    /// Token serial
    pub serial: Vec<u8>,
}

impl TstInfo {
    /// Decode a DER `TSTInfo`.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let mut reader = SliceReader::new(bytes).map_err(cms_err)?;
        let (imprint, serial, gen_time) = reader
            .sequence(|seq| {
                let _version: u8 = seq.decode()?;
                let _policy: ObjectIdentifier = seq.decode()?;
                let imprint: MessageImprintDer = seq.decode()?;
                let serial: SerialNumber = seq.decode()?;
                let gen_time: Any = seq.decode()?;
                // accuracy, ordering, nonce, tsa, extensions
                while !seq.is_finished() {
                    let _: Any = seq.decode()?;
                }
                Ok((imprint, serial, gen_time))
            })
            .map_err(cms_err)?;

        if gen_time.tag() != Tag::GeneralizedTime {
            return Err(Error::InvalidCms(format!("genTime has tag {}", gen_time.tag())));
        }

        Ok(Self {
            gen_time: parse_generalized_time(gen_time.value())?,
            imprint_algorithm: algorithm(&imprint.hash_algorithm),
            message_imprint: imprint.hashed_message.as_bytes().to_vec(),
            serial: normalize_serial(serial.as_bytes()),
        })
    }
}

/// RFC 3161 timestamp token: a SignedData over a `TSTInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampToken {
    /// The token's own signature container
    pub signed_data: CmsSignedData,
    /// Decoded content
    pub info: TstInfo,
}

impl TimestampToken {
    /// Decode a DER timestamp token.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let signed_data = CmsSignedData::from_der(bytes)?;
        let content = signed_data
            .encapsulated_content
            .as_deref()
            .ok_or_else(|| Error::InvalidCms("timestamp token without TSTInfo".to_string()))?;
        let info = TstInfo::from_der(content)?;
        Ok(Self { signed_data, info })
    }
}
