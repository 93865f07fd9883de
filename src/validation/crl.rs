//! Certificate revocation lists.

use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

use super::certificate::{normalize_serial, Certificate};
use super::evidence::{CertStatus, RevocationReason};
use crate::error::{Error, Result};
use crate::signatures::AlgorithmIdentifier;

fn to_utc(time: ASN1Time) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| Error::InvalidCrl(format!("time out of range: {}", time)))
}

/// One revoked serial in a CRL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedEntry {
    /// Serial, big-endian without leading zeros
    pub serial: Vec<u8>,
    /// revocationDate
    pub revocation_time: DateTime<Utc>,
    /// reasonCode entry extension
    pub reason: Option<RevocationReason>,
}

/// Decoded CRL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crl {
    der: Vec<u8>,
    issuer: String,
    issuer_raw: Vec<u8>,
    authority_key_id: Option<Vec<u8>>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    revoked: Vec<RevokedEntry>,
    tbs: Vec<u8>,
    signature_algorithm: AlgorithmIdentifier,
    signature_value: Vec<u8>,
}

impl Crl {
    /// Decode a DER CRL.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, crl) = CertificateRevocationList::from_der(der)
            .map_err(|e| Error::InvalidCrl(e.to_string()))?;

        let mut revoked = Vec::new();
        for entry in crl.iter_revoked_certificates() {
            revoked.push(RevokedEntry {
                serial: normalize_serial(entry.raw_serial()),
                revocation_time: to_utc(entry.revocation_date)?,
                reason: entry.reason_code().map(|(_, code)| RevocationReason::from_code(code.0)),
            });
        }

        let mut authority_key_id = None;
        for ext in crl.extensions() {
            if let ParsedExtension::AuthorityKeyIdentifier(aki) = ext.parsed_extension() {
                authority_key_id = aki.key_identifier.as_ref().map(|kid| kid.0.to_vec());
            }
        }

        Ok(Self {
            der: der.to_vec(),
            issuer: crl.issuer().to_string(),
            issuer_raw: crl.issuer().as_raw().to_vec(),
            authority_key_id,
            this_update: to_utc(crl.last_update())?,
            next_update: crl.next_update().map(to_utc).transpose()?,
            revoked,
            tbs: crl.tbs_cert_list.as_ref().to_vec(),
            signature_algorithm: AlgorithmIdentifier::from_oid(
                crl.signature_algorithm.algorithm.to_id_string(),
            ),
            signature_value: crl.signature_value.data.to_vec(),
        })
    }

    /// Start building a CRL from already-decoded fields.
    pub fn builder(issuer: impl Into<String>, this_update: DateTime<Utc>) -> CrlBuilder {
        let issuer = issuer.into();
        CrlBuilder {
            crl: Crl {
                der: Vec::new(),
                issuer_raw: issuer.as_bytes().to_vec(),
                issuer,
                authority_key_id: None,
                this_update,
                next_update: None,
                revoked: Vec::new(),
                tbs: Vec::new(),
                signature_algorithm: AlgorithmIdentifier::from_oid("1.2.840.113549.1.1.11"),
                signature_value: Vec::new(),
            },
        }
    }

    /// Original DER (empty for built CRLs).
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Issuer distinguished name.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// DER issuer name.
    pub fn issuer_raw(&self) -> &[u8] {
        &self.issuer_raw
    }

    /// Authority key identifier extension.
    pub fn authority_key_id(&self) -> Option<&[u8]> {
        self.authority_key_id.as_deref()
    }

    /// thisUpdate
    pub fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    /// nextUpdate
    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }

    /// Revoked entries.
    pub fn revoked(&self) -> &[RevokedEntry] {
        &self.revoked
    }

    /// Signed TBSCertList bytes.
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

    /// `this_update <= time < next_update`, open-ended without nextUpdate.
    pub fn covers(&self, time: DateTime<Utc>) -> bool {
        self.this_update <= time && self.next_update.map_or(true, |next| time < next)
    }

    /// Whether this CRL was issued by `issuer`.
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        if self.issuer_raw != issuer.subject_raw() {
            return false;
        }
        match (self.authority_key_id(), issuer.subject_key_id()) {
            (Some(aki), Some(ski)) => aki == ski,
            _ => true,
        }
    }

    /// Status of `certificate` according to this list.
    pub fn status_of(&self, certificate: &Certificate) -> CertStatus {
        match self.revoked.iter().find(|entry| entry.serial == certificate.serial()) {
            Some(entry) => CertStatus::Revoked {
                reason: entry.reason,
                revocation_time: entry.revocation_time,
            },
            None => CertStatus::Good,
        }
    }
}

/// Builder for [`Crl`] values decoded elsewhere.
#[derive(Debug, Clone)]
pub struct CrlBuilder {
    crl: Crl,
}

impl CrlBuilder {
    /// Override the raw DER issuer name.
    pub fn issuer_raw(mut self, raw: Vec<u8>) -> Self {
        self.crl.issuer_raw = raw;
        self
    }

    /// Set nextUpdate.
    pub fn next_update(mut self, next: DateTime<Utc>) -> Self {
        self.crl.next_update = Some(next);
        self
    }

    /// Set the authority key identifier.
    pub fn authority_key_id(mut self, kid: Vec<u8>) -> Self {
        self.crl.authority_key_id = Some(kid);
        self
    }

    /// Add a revoked serial.
    pub fn revoke(
        mut self,
        serial: &[u8],
        revocation_time: DateTime<Utc>,
        reason: Option<RevocationReason>,
    ) -> Self {
        self.crl.revoked.push(RevokedEntry {
            serial: normalize_serial(serial),
            revocation_time,
            reason,
        });
        self
    }

    /// Set the TBS bytes and issuer signature.
    pub fn signature(
        mut self,
        tbs: Vec<u8>,
        algorithm: AlgorithmIdentifier,
        value: Vec<u8>,
    ) -> Self {
        self.crl.tbs = tbs;
        self.crl.signature_algorithm = algorithm;
        self.crl.signature_value = value;
        self
    }

    /// Finish.
    pub fn build(self) -> Crl {
        self.crl
    }
}
