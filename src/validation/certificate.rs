//! X.509 certificates as seen by the validator.
//!
//! [`Certificate`] is an immutable, decoded view holding exactly the fields
//! chain building and revocation checking need. It is shared between chains,
//! DSS indexes and events through `Arc`, and never mutated after decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::signatures::crypto::to_hex;
use crate::signatures::AlgorithmIdentifier;

/// id-kp-OCSPSigning
pub const OID_KP_OCSP_SIGNING: &str = "1.3.6.1.5.5.7.3.9";
/// id-kp-timeStamping
pub const OID_KP_TIME_STAMPING: &str = "1.3.6.1.5.5.7.3.8";
/// id-pkix-ocsp-nocheck
pub const OID_OCSP_NO_CHECK: &str = "1.3.6.1.5.5.7.48.1.5";
const OID_AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";
const OID_AD_CA_ISSUERS: &str = "1.3.6.1.5.5.7.48.2";

/// Key usage bits relevant to validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyUsage {
    /// digitalSignature
    pub digital_signature: bool,
    /// nonRepudiation / contentCommitment
    pub non_repudiation: bool,
    /// keyCertSign
    pub key_cert_sign: bool,
    /// cRLSign
    pub crl_sign: bool,
}

/// Strip leading zero octets so serials compare independent of encoding.
pub(crate) fn normalize_serial(serial: &[u8]) -> Vec<u8> {
    let first = serial.iter().position(|b| *b != 0).unwrap_or(serial.len());
    let trimmed = &serial[first..];
    if trimmed.is_empty() {
        vec![0]
    } else {
        trimmed.to_vec()
    }
}

pub(crate) fn timestamp_to_utc(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::InvalidCertificate(format!("time out of range: {}", secs)))
}

/// Immutable snapshot of a certificate carried by events and errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateSummary {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// Serial number in lowercase hex
    pub serial: String,
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (serial {})", self.subject, self.serial)
    }
}

/// Decoded X.509 certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    subject_raw: Vec<u8>,
    issuer_raw: Vec<u8>,
    serial: Vec<u8>,
    public_key: Vec<u8>,
    public_key_bits: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    subject_key_id: Option<Vec<u8>>,
    authority_key_id: Option<Vec<u8>>,
    crl_distribution_points: Vec<String>,
    ca_issuers: Vec<String>,
    ocsp_responders: Vec<String>,
    is_ca: bool,
    key_usage: Option<KeyUsage>,
    extended_key_usage: Vec<String>,
    ocsp_no_check: bool,
    tbs: Vec<u8>,
    signature_algorithm: AlgorithmIdentifier,
    signature_value: Vec<u8>,
}

impl Certificate {
    /// Decode a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::InvalidCertificate(e.to_string()))?;

        let mut subject_key_id = None;
        let mut authority_key_id = None;
        let mut crl_distribution_points = Vec::new();
        let mut ca_issuers = Vec::new();
        let mut ocsp_responders = Vec::new();
        let mut is_ca = false;
        let mut key_usage = None;
        let mut extended_key_usage = Vec::new();
        let mut ocsp_no_check = false;

        for ext in cert.extensions() {
            if ext.oid.to_id_string() == OID_OCSP_NO_CHECK {
                ocsp_no_check = true;
            }
            match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(kid) => {
                    subject_key_id = Some(kid.0.to_vec());
                },
                ParsedExtension::AuthorityKeyIdentifier(aki) => {
                    authority_key_id = aki.key_identifier.as_ref().map(|kid| kid.0.to_vec());
                },
                ParsedExtension::BasicConstraints(bc) => {
                    is_ca = bc.ca;
                },
                ParsedExtension::KeyUsage(ku) => {
                    key_usage = Some(KeyUsage {
                        digital_signature: ku.digital_signature(),
                        non_repudiation: ku.non_repudiation(),
                        key_cert_sign: ku.key_cert_sign(),
                        crl_sign: ku.crl_sign(),
                    });
                },
                ParsedExtension::ExtendedKeyUsage(eku) => {
                    if eku.ocsp_signing {
                        extended_key_usage.push(OID_KP_OCSP_SIGNING.to_string());
                    }
                    if eku.time_stamping {
                        extended_key_usage.push(OID_KP_TIME_STAMPING.to_string());
                    }
                    extended_key_usage.extend(eku.other.iter().map(|oid| oid.to_id_string()));
                },
                ParsedExtension::CRLDistributionPoints(points) => {
                    for point in points.points.iter() {
                        if let Some(DistributionPointName::FullName(names)) =
                            &point.distribution_point
                        {
                            for name in names {
                                if let GeneralName::URI(uri) = name {
                                    crl_distribution_points.push(uri.to_string());
                                }
                            }
                        }
                    }
                },
                ParsedExtension::AuthorityInfoAccess(aia) => {
                    for desc in aia.accessdescs.iter() {
                        if let GeneralName::URI(uri) = &desc.access_location {
                            match desc.access_method.to_id_string().as_str() {
                                OID_AD_CA_ISSUERS => ca_issuers.push(uri.to_string()),
                                OID_AD_OCSP => ocsp_responders.push(uri.to_string()),
                                _ => {},
                            }
                        }
                    }
                },
                _ => {},
            }
        }

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            subject_raw: cert.subject().as_raw().to_vec(),
            issuer_raw: cert.issuer().as_raw().to_vec(),
            serial: normalize_serial(cert.raw_serial()),
            public_key: cert.public_key().raw.to_vec(),
            public_key_bits: cert.public_key().subject_public_key.data.to_vec(),
            not_before: timestamp_to_utc(cert.validity().not_before.timestamp())?,
            not_after: timestamp_to_utc(cert.validity().not_after.timestamp())?,
            subject_key_id,
            authority_key_id,
            crl_distribution_points,
            ca_issuers,
            ocsp_responders,
            is_ca,
            key_usage,
            extended_key_usage,
            ocsp_no_check,
            tbs: cert.tbs_certificate.as_ref().to_vec(),
            signature_algorithm: AlgorithmIdentifier::from_oid(
                cert.signature_algorithm.algorithm.to_id_string(),
            ),
            signature_value: cert.signature_value.data.to_vec(),
        })
    }

    /// Start building a certificate from already-decoded fields.
    ///
    /// Useful when certificates come from another ASN.1 stack.
    pub fn builder(subject: impl Into<String>, issuer: impl Into<String>) -> CertificateBuilder {
        CertificateBuilder::new(subject.into(), issuer.into())
    }

    /// Original DER encoding (empty for built certificates).
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer distinguished name.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// DER encoding of the subject name.
    pub fn subject_raw(&self) -> &[u8] {
        &self.subject_raw
    }

    /// DER encoding of the issuer name.
    pub fn issuer_raw(&self) -> &[u8] {
        &self.issuer_raw
    }

    /// Serial number, big-endian without leading zeros.
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Serial number in lowercase hex.
    pub fn serial_hex(&self) -> String {
        to_hex(&self.serial)
    }

    /// DER `SubjectPublicKeyInfo`.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Contents of the subjectPublicKey BIT STRING (hashed into OCSP cert ids).
    pub fn public_key_bits(&self) -> &[u8] {
        &self.public_key_bits
    }

    /// Start of the validity period.
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the validity period.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Subject key identifier extension.
    pub fn subject_key_id(&self) -> Option<&[u8]> {
        self.subject_key_id.as_deref()
    }

    /// Authority key identifier (keyIdentifier field).
    pub fn authority_key_id(&self) -> Option<&[u8]> {
        self.authority_key_id.as_deref()
    }

    /// CRL distribution point URLs.
    pub fn crl_distribution_points(&self) -> &[String] {
        &self.crl_distribution_points
    }

    /// AIA caIssuers URLs.
    pub fn ca_issuers(&self) -> &[String] {
        &self.ca_issuers
    }

    /// AIA OCSP responder URLs.
    pub fn ocsp_responders(&self) -> &[String] {
        &self.ocsp_responders
    }

    /// Basic constraints CA flag.
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// Key usage extension, if present.
    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.key_usage
    }

    /// Extended key usage OIDs.
    pub fn extended_key_usage(&self) -> &[String] {
        &self.extended_key_usage
    }

    /// Whether the certificate carries id-pkix-ocsp-nocheck.
    pub fn has_ocsp_no_check(&self) -> bool {
        self.ocsp_no_check
    }

    /// The signed TBSCertificate bytes.
    pub fn tbs(&self) -> &[u8] {
        &self.tbs
    }

    /// Algorithm of the issuer's signature.
    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier {
        &self.signature_algorithm
    }

    /// The issuer's signature value.
    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    /// Subject equals issuer.
    pub fn is_self_signed(&self) -> bool {
        self.subject_raw == self.issuer_raw
    }

    /// Name (and, when both sides carry one, key identifier) linkage to `issuer`.
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        if self.issuer_raw != issuer.subject_raw {
            return false;
        }
        match (self.authority_key_id(), issuer.subject_key_id()) {
            (Some(aki), Some(ski)) => aki == ski,
            _ => true,
        }
    }

    /// Whether `time` falls inside the validity period.
    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.not_before <= time && time <= self.not_after
    }

    /// Whether the certificate may sign OCSP responses on behalf of its issuer.
    pub fn is_ocsp_signer(&self) -> bool {
        self.extended_key_usage.iter().any(|oid| oid == OID_KP_OCSP_SIGNING)
    }

    /// Issuer name plus serial uniquely identify a certificate.
    pub fn same_identity(&self, other: &Certificate) -> bool {
        self.issuer_raw == other.issuer_raw && self.serial == other.serial
    }

    /// Snapshot for events.
    pub fn summary(&self) -> CertificateSummary {
        CertificateSummary {
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            serial: self.serial_hex(),
        }
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Builder for [`Certificate`] values decoded elsewhere.
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    cert: Certificate,
}

impl CertificateBuilder {
    fn new(subject: String, issuer: String) -> Self {
        let subject_raw = subject.as_bytes().to_vec();
        let issuer_raw = issuer.as_bytes().to_vec();
        Self {
            cert: Certificate {
                der: Vec::new(),
                subject,
                issuer,
                subject_raw,
                issuer_raw,
                serial: vec![1],
                public_key: Vec::new(),
                public_key_bits: Vec::new(),
                not_before: DateTime::<Utc>::MIN_UTC,
                not_after: DateTime::<Utc>::MAX_UTC,
                subject_key_id: None,
                authority_key_id: None,
                crl_distribution_points: Vec::new(),
                ca_issuers: Vec::new(),
                ocsp_responders: Vec::new(),
                is_ca: false,
                key_usage: None,
                extended_key_usage: Vec::new(),
                ocsp_no_check: false,
                tbs: Vec::new(),
                signature_algorithm: AlgorithmIdentifier::from_oid("1.2.840.113549.1.1.11"),
                signature_value: Vec::new(),
            },
        }
    }

    /// Override the raw DER names (defaults to the UTF-8 display strings).
    pub fn raw_names(mut self, subject_raw: Vec<u8>, issuer_raw: Vec<u8>) -> Self {
        self.cert.subject_raw = subject_raw;
        self.cert.issuer_raw = issuer_raw;
        self
    }

    /// Set the serial number.
    pub fn serial(mut self, serial: &[u8]) -> Self {
        self.cert.serial = normalize_serial(serial);
        self
    }

    /// Set the public key info; `bits` is the subjectPublicKey content.
    pub fn public_key(mut self, spki: Vec<u8>, bits: Vec<u8>) -> Self {
        self.cert.public_key = spki;
        self.cert.public_key_bits = bits;
        self
    }

    /// Set the validity period.
    pub fn validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.cert.not_before = not_before;
        self.cert.not_after = not_after;
        self
    }

    /// Set the subject key identifier.
    pub fn subject_key_id(mut self, kid: Vec<u8>) -> Self {
        self.cert.subject_key_id = Some(kid);
        self
    }

    /// Set the authority key identifier.
    pub fn authority_key_id(mut self, kid: Vec<u8>) -> Self {
        self.cert.authority_key_id = Some(kid);
        self
    }

    /// Add a CRL distribution point URL.
    pub fn crl_distribution_point(mut self, url: impl Into<String>) -> Self {
        self.cert.crl_distribution_points.push(url.into());
        self
    }

    /// Add an AIA caIssuers URL.
    pub fn ca_issuer(mut self, url: impl Into<String>) -> Self {
        self.cert.ca_issuers.push(url.into());
        self
    }

    /// Add an AIA OCSP URL.
    pub fn ocsp_responder(mut self, url: impl Into<String>) -> Self {
        self.cert.ocsp_responders.push(url.into());
        self
    }

    /// Mark as a CA certificate.
    pub fn ca(mut self, is_ca: bool) -> Self {
        self.cert.is_ca = is_ca;
        self
    }

    /// Set the key usage bits.
    pub fn key_usage(mut self, usage: KeyUsage) -> Self {
        self.cert.key_usage = Some(usage);
        self
    }

    /// Add an extended key usage OID.
    pub fn extended_key_usage(mut self, oid: impl Into<String>) -> Self {
        self.cert.extended_key_usage.push(oid.into());
        self
    }

    /// Set id-pkix-ocsp-nocheck.
    pub fn ocsp_no_check(mut self, value: bool) -> Self {
        self.cert.ocsp_no_check = value;
        self
    }

    /// Set the TBS bytes and the issuer signature over them.
    pub fn signature(
        mut self,
        tbs: Vec<u8>,
        algorithm: AlgorithmIdentifier,
        value: Vec<u8>,
    ) -> Self {
        self.cert.tbs = tbs;
        self.cert.signature_algorithm = algorithm;
        self.cert.signature_value = value;
        self
    }

    /// Finish.
    pub fn build(self) -> Certificate {
        self.cert
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ca() -> Certificate {
        Certificate::builder("CN=CA", "CN=CA")
            .subject_key_id(vec![1, 2, 3])
            .ca(true)
            .build()
    }

    #[test]
    fn test_self_signed_detection() {
        assert!(ca().is_self_signed());
        let leaf = Certificate::builder("CN=Leaf", "CN=CA").build();
        assert!(!leaf.is_self_signed());
    }

    #[test]
    fn test_issued_by_uses_key_identifiers() {
        let leaf = Certificate::builder("CN=Leaf", "CN=CA")
            .authority_key_id(vec![1, 2, 3])
            .build();
        assert!(leaf.is_issued_by(&ca()));

        let other_key = Certificate::builder("CN=Leaf", "CN=CA")
            .authority_key_id(vec![9, 9])
            .build();
        assert!(!other_key.is_issued_by(&ca()));

        let no_aki = Certificate::builder("CN=Leaf", "CN=CA").build();
        assert!(no_aki.is_issued_by(&ca()));
    }

    #[test]
    fn test_validity_window() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let cert = Certificate::builder("CN=A", "CN=B").validity(start, end).build();
        assert!(cert.is_valid_at(Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap()));
        assert!(!cert.is_valid_at(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_serial_normalization() {
        assert_eq!(normalize_serial(&[0, 0, 0x7f]), vec![0x7f]);
        assert_eq!(normalize_serial(&[0]), vec![0]);
        let cert = Certificate::builder("CN=A", "CN=B").serial(&[0x00, 0x81]).build();
        assert_eq!(cert.serial_hex(), "81");
    }

    #[test]
    fn test_summary_and_display() {
        let cert = Certificate::builder("CN=Leaf", "CN=CA").serial(&[0x0a]).build();
        let summary = cert.summary();
        assert_eq!(summary.serial, "0a");
        assert_eq!(cert.to_string(), "CN=Leaf (serial 0a)");
    }

    #[test]
    fn test_ocsp_signer_flag() {
        let responder = Certificate::builder("CN=OCSP", "CN=CA")
            .extended_key_usage(OID_KP_OCSP_SIGNING)
            .build();
        assert!(responder.is_ocsp_signer());
        assert!(!ca().is_ocsp_signer());
    }

    #[test]
    fn test_from_der_rejects_garbage() {
        assert!(Certificate::from_der(&[0x30, 0x03, 0x01, 0x01, 0x00]).is_err());
        assert!(Certificate::from_der(&[]).is_err());
    }
}
