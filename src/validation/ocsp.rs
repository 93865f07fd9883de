//! OCSP responses (RFC 6960).
//!
//! DSS `/OCSPs` entries hold either a complete `OCSPResponse` or just the
//! `BasicOCSPResponse` inside it; [`OcspResponse::from_der`] accepts both.

use chrono::{DateTime, Utc};
use der::asn1::{Any, BitString, GeneralizedTime, Null, ObjectIdentifier, OctetString};
use der::{Choice, Decode, Encode, Enumerated, Sequence};
use std::sync::Arc;
use x509_cert::ext::pkix::CrlReason;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::AlgorithmIdentifierOwned;

use super::certificate::{normalize_serial, Certificate};
use super::evidence::{CertStatus, RevocationReason};
use crate::error::{Error, Result};
use crate::signatures::crypto::CryptoProvider;
use crate::signatures::{AlgorithmIdentifier, DigestAlgorithm};

const OID_PKIX_OCSP_BASIC: &str = "1.3.6.1.5.5.7.48.1.1";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Enumerated)]
#[repr(u32)]
enum ResponseStatusDer {
    Successful = 0,
    MalformedRequest = 1,
    InternalError = 2,
    TryLater = 3,
    SigRequired = 5,
    Unauthorized = 6,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct OcspResponseDer {
    response_status: ResponseStatusDer,
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    response_bytes: Option<ResponseBytesDer>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct ResponseBytesDer {
    response_type: ObjectIdentifier,
    response: OctetString,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct BasicOcspResponseDer {
    tbs_response_data: Any,
    signature_algorithm: AlgorithmIdentifierOwned,
    signature: BitString,
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    certs: Option<Vec<Any>>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct ResponseDataDer {
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    version: Option<u8>,
    responder_id: ResponderIdDer,
    produced_at: GeneralizedTime,
    responses: Vec<SingleResponseDer>,
    #[asn1(context_specific = "1", optional = "true", tag_mode = "EXPLICIT")]
    response_extensions: Option<Any>,
}

#[derive(Clone, Debug, Eq, PartialEq, Choice)]
enum ResponderIdDer {
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", constructed = "true")]
    ByName(Name),
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", constructed = "true")]
    ByKey(OctetString),
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct SingleResponseDer {
    cert_id: CertIdDer,
    cert_status: CertStatusDer,
    this_update: GeneralizedTime,
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    next_update: Option<GeneralizedTime>,
    #[asn1(context_specific = "1", optional = "true", tag_mode = "EXPLICIT")]
    single_extensions: Option<Any>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct CertIdDer {
    hash_algorithm: AlgorithmIdentifierOwned,
    issuer_name_hash: OctetString,
    issuer_key_hash: OctetString,
    serial_number: SerialNumber,
}

#[derive(Clone, Debug, Eq, PartialEq, Choice)]
enum CertStatusDer {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT")]
    Good(Null),
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", constructed = "true")]
    Revoked(RevokedInfoDer),
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT")]
    Unknown(Null),
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct RevokedInfoDer {
    revocation_time: GeneralizedTime,
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    revocation_reason: Option<CrlReason>,
}

fn generalized_to_utc(time: &GeneralizedTime) -> Result<DateTime<Utc>> {
    let secs = time.to_unix_duration().as_secs();
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| Error::InvalidOcsp(format!("time out of range: {}", secs)))
}

fn reason_from_der(reason: CrlReason) -> RevocationReason {
    RevocationReason::from_code(reason as u8)
}

/// How the responder identified itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderId {
    /// By subject name
    ByName {
        /// Display form
        name: String,
        /// DER form
        raw: Vec<u8>,
    },
    /// By SHA-1 of the responder public key
    ByKey(Vec<u8>),
}

/// Identifies the certificate a single response is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertId {
    /// Hash used for the issuer name and key
    pub hash_algorithm: AlgorithmIdentifier,
    /// Hash of the issuer's DER subject name
    pub issuer_name_hash: Vec<u8>,
    /// Hash of the issuer's public key bits
    pub issuer_key_hash: Vec<u8>,
    /// Serial, big-endian without leading zeros
    pub serial: Vec<u8>,
}

impl CertId {
    /// Build the id of `certificate` issued by `issuer` using `algorithm`.
    pub fn for_certificate(
        certificate: &Certificate,
        issuer: &Certificate,
        algorithm: DigestAlgorithm,
        crypto: &dyn CryptoProvider,
    ) -> Result<Self> {
        Ok(Self {
            hash_algorithm: AlgorithmIdentifier::digest(algorithm),
            issuer_name_hash: crypto.digest(issuer.subject_raw(), algorithm)?,
            issuer_key_hash: crypto.digest(issuer.public_key_bits(), algorithm)?,
            serial: certificate.serial().to_vec(),
        })
    }

    /// Whether this id names `certificate` under `issuer`.
    pub fn matches(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        crypto: &dyn CryptoProvider,
    ) -> bool {
        if self.serial != certificate.serial() {
            return false;
        }
        let Some(algorithm) = DigestAlgorithm::from_oid(&self.hash_algorithm.oid) else {
            log::debug!("OCSP cert id uses unknown hash {}", self.hash_algorithm);
            return false;
        };
        match CertId::for_certificate(certificate, issuer, algorithm, crypto) {
            Ok(expected) => {
                expected.issuer_name_hash == self.issuer_name_hash
                    && expected.issuer_key_hash == self.issuer_key_hash
            },
            Err(e) => {
                log::debug!("cannot hash issuer for OCSP cert id: {}", e);
                false
            },
        }
    }
}

/// Status of one certificate inside a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleResponse {
    /// Which certificate
    pub cert_id: CertId,
    /// Its status
    pub status: CertStatus,
    /// thisUpdate
    pub this_update: DateTime<Utc>,
    /// nextUpdate
    pub next_update: Option<DateTime<Utc>>,
}

impl SingleResponse {
    /// `this_update <= time < next_update`, open-ended without nextUpdate.
    pub fn covers(&self, time: DateTime<Utc>) -> bool {
        self.this_update <= time && self.next_update.map_or(true, |next| time < next)
    }
}

/// Decoded basic OCSP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    der: Vec<u8>,
    responder_id: ResponderId,
    produced_at: DateTime<Utc>,
    responses: Vec<SingleResponse>,
    certificates: Vec<Arc<Certificate>>,
    tbs: Vec<u8>,
    signature_algorithm: AlgorithmIdentifier,
    signature_value: Vec<u8>,
}

impl OcspResponse {
    /// Decode an `OCSPResponse` or a bare `BasicOCSPResponse`.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let basic = match OcspResponseDer::from_der(der) {
            Ok(outer) => {
                if outer.response_status != ResponseStatusDer::Successful {
                    return Err(Error::InvalidOcsp(format!(
                        "response status {:?}",
                        outer.response_status
                    )));
                }
                let bytes = outer
                    .response_bytes
                    .ok_or_else(|| Error::InvalidOcsp("missing response bytes".to_string()))?;
                if bytes.response_type.to_string() != OID_PKIX_OCSP_BASIC {
                    return Err(Error::InvalidOcsp(format!(
                        "unsupported response type {}",
                        bytes.response_type
                    )));
                }
                BasicOcspResponseDer::from_der(bytes.response.as_bytes())
                    .map_err(|e| Error::InvalidOcsp(e.to_string()))?
            },
            Err(_) => BasicOcspResponseDer::from_der(der)
                .map_err(|e| Error::InvalidOcsp(e.to_string()))?,
        };

        let tbs = basic
            .tbs_response_data
            .to_der()
            .map_err(|e| Error::InvalidOcsp(e.to_string()))?;
        let data = ResponseDataDer::from_der(&tbs).map_err(|e| Error::InvalidOcsp(e.to_string()))?;

        let responder_id = match &data.responder_id {
            ResponderIdDer::ByName(name) => ResponderId::ByName {
                name: name.to_string(),
                raw: name.to_der().map_err(|e| Error::InvalidOcsp(e.to_string()))?,
            },
            ResponderIdDer::ByKey(hash) => ResponderId::ByKey(hash.as_bytes().to_vec()),
        };

        let mut responses = Vec::with_capacity(data.responses.len());
        for single in &data.responses {
            let status = match &single.cert_status {
                CertStatusDer::Good(_) => CertStatus::Good,
                CertStatusDer::Revoked(info) => CertStatus::Revoked {
                    reason: info.revocation_reason.map(reason_from_der),
                    revocation_time: generalized_to_utc(&info.revocation_time)?,
                },
                CertStatusDer::Unknown(_) => CertStatus::Unknown,
            };
            responses.push(SingleResponse {
                cert_id: CertId {
                    hash_algorithm: AlgorithmIdentifier::from_oid(
                        single.cert_id.hash_algorithm.oid.to_string(),
                    ),
                    issuer_name_hash: single.cert_id.issuer_name_hash.as_bytes().to_vec(),
                    issuer_key_hash: single.cert_id.issuer_key_hash.as_bytes().to_vec(),
                    serial: normalize_serial(single.cert_id.serial_number.as_bytes()),
                },
                status,
                this_update: generalized_to_utc(&single.this_update)?,
                next_update: single.next_update.as_ref().map(generalized_to_utc).transpose()?,
            });
        }

        let mut certificates = Vec::new();
        for cert in basic.certs.iter().flatten() {
            match cert.to_der().map_err(Error::from).and_then(|d| Certificate::from_der(&d)) {
                Ok(cert) => certificates.push(Arc::new(cert)),
                Err(e) => log::warn!("skipping undecodable OCSP responder certificate: {}", e),
            }
        }

        Ok(Self {
            der: der.to_vec(),
            responder_id,
            produced_at: generalized_to_utc(&data.produced_at)?,
            responses,
            certificates,
            tbs,
            signature_algorithm: AlgorithmIdentifier::from_oid(
                basic.signature_algorithm.oid.to_string(),
            ),
            signature_value: basic.signature.raw_bytes().to_vec(),
        })
    }

    /// Start building a response from already-decoded fields.
    pub fn builder(responder_id: ResponderId, produced_at: DateTime<Utc>) -> OcspResponseBuilder {
        OcspResponseBuilder {
            response: OcspResponse {
                der: Vec::new(),
                responder_id,
                produced_at,
                responses: Vec::new(),
                certificates: Vec::new(),
                tbs: Vec::new(),
                signature_algorithm: AlgorithmIdentifier::from_oid("1.2.840.113549.1.1.11"),
                signature_value: Vec::new(),
            },
        }
    }

    /// Original DER (empty for built responses).
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Responder identification.
    pub fn responder_id(&self) -> &ResponderId {
        &self.responder_id
    }

    /// producedAt
    pub fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    /// All single responses.
    pub fn responses(&self) -> &[SingleResponse] {
        &self.responses
    }

    /// Certificates shipped with the response (delegated responder chain).
    pub fn certificates(&self) -> &[Arc<Certificate>] {
        &self.certificates
    }

    /// Signed ResponseData bytes.
    pub fn tbs(&self) -> &[u8] {
        &self.tbs
    }

    /// Signature algorithm.
    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier {
        &self.signature_algorithm
    }

    /// Signature value.
    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    /// Single response about `certificate` issued by `issuer`.
    pub fn find(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        crypto: &dyn CryptoProvider,
    ) -> Option<&SingleResponse> {
        self.responses
            .iter()
            .find(|single| single.cert_id.matches(certificate, issuer, crypto))
    }

    /// Whether `candidate` is the certificate named by the responder id.
    pub fn is_responder(&self, candidate: &Certificate, crypto: &dyn CryptoProvider) -> bool {
        match &self.responder_id {
            ResponderId::ByName { raw, .. } => raw.as_slice() == candidate.subject_raw(),
            ResponderId::ByKey(hash) => crypto
                .digest(candidate.public_key_bits(), DigestAlgorithm::Sha1)
                .map(|digest| &digest == hash)
                .unwrap_or(false),
        }
    }
}

/// Builder for [`OcspResponse`] values decoded elsewhere.
#[derive(Debug, Clone)]
pub struct OcspResponseBuilder {
    response: OcspResponse,
}

impl OcspResponseBuilder {
    /// Add a single response.
    pub fn response(mut self, single: SingleResponse) -> Self {
        self.response.responses.push(single);
        self
    }

    /// Add a responder certificate.
    pub fn certificate(mut self, cert: Arc<Certificate>) -> Self {
        self.response.certificates.push(cert);
        self
    }

    /// Set the TBS bytes and responder signature.
    pub fn signature(
        mut self,
        tbs: Vec<u8>,
        algorithm: AlgorithmIdentifier,
        value: Vec<u8>,
    ) -> Self {
        self.response.tbs = tbs;
        self.response.signature_algorithm = algorithm;
        self.response.signature_value = value;
        self
    }

    /// Finish.
    pub fn build(self) -> OcspResponse {
        self.response
    }
}
