//! Fixtures shared by the unit tests of the validation modules.
//!
//! Keys are plain byte strings and a "signature" is SHA-256(key || data),
//! which lets tests build chains and evidence without real key material.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::certificate::Certificate;
use super::crl::Crl;
use super::evidence::CertStatus;
use super::ocsp::{CertId, OcspResponse, ResponderId, SingleResponse};
use crate::error::Result;
use crate::signatures::{
    AlgorithmIdentifier, CryptoProvider, DigestAlgorithm, RustCryptoProvider, SignatureScheme,
};

pub(crate) const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";

pub(crate) struct KeyedHashCrypto;

impl CryptoProvider for KeyedHashCrypto {
    fn digest(&self, data: &[u8], algorithm: DigestAlgorithm) -> Result<Vec<u8>> {
        RustCryptoProvider::new().digest(data, algorithm)
    }

    fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        _scheme: SignatureScheme,
    ) -> Result<bool> {
        Ok(sign(public_key, data) == signature)
    }
}

pub(crate) fn sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    RustCryptoProvider::new()
        .digest(&[key, data].concat(), DigestAlgorithm::Sha256)
        .unwrap()
}

pub(crate) fn key_of(subject: &str) -> Vec<u8> {
    format!("{}-key", subject).into_bytes()
}

pub(crate) fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::TimeDelta::days(n as i64)
}

/// Certificate for `subject` signed with the key of `issuer`.
pub(crate) fn issued(subject: &str, issuer: &str, serial: u8) -> Arc<Certificate> {
    let tbs = format!("tbs:{}:{}", subject, serial).into_bytes();
    let signature = sign(&key_of(issuer), &tbs);
    Arc::new(
        Certificate::builder(subject, issuer)
            .serial(&[serial])
            .public_key(key_of(subject), key_of(subject))
            .ca(subject == issuer)
            .signature(tbs, AlgorithmIdentifier::from_oid(SHA256_WITH_RSA), signature)
            .build(),
    )
}

/// OCSP response about `cert` signed by `signer`.
pub(crate) fn ocsp(
    cert: &Certificate,
    issuer: &Certificate,
    signer: &Certificate,
    produced_at: DateTime<Utc>,
    status: CertStatus,
) -> Arc<OcspResponse> {
    let cert_id =
        CertId::for_certificate(cert, issuer, DigestAlgorithm::Sha1, &KeyedHashCrypto).unwrap();
    let tbs = format!("ocsp:{}:{}", cert.serial_hex(), produced_at).into_bytes();
    let signature = sign(signer.public_key(), &tbs);
    Arc::new(
        OcspResponse::builder(
            ResponderId::ByName {
                name: signer.subject().to_string(),
                raw: signer.subject_raw().to_vec(),
            },
            produced_at,
        )
        .response(SingleResponse {
            cert_id,
            status,
            this_update: produced_at,
            next_update: None,
        })
        .signature(tbs, AlgorithmIdentifier::from_oid(SHA256_WITH_RSA), signature)
        .build(),
    )
}

/// CRL from `issuer` revoking `revoked` serials at the given times.
pub(crate) fn crl(
    issuer: &Certificate,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    revoked: &[(&Certificate, DateTime<Utc>)],
) -> Arc<Crl> {
    let mut builder = Crl::builder(issuer.subject(), this_update);
    if let Some(next) = next_update {
        builder = builder.next_update(next);
    }
    for (cert, time) in revoked {
        builder = builder.revoke(cert.serial(), *time, None);
    }
    let tbs = format!("crl:{}:{}", issuer.subject(), this_update).into_bytes();
    let signature = sign(issuer.public_key(), &tbs);
    Arc::new(
        builder
            .signature(tbs, AlgorithmIdentifier::from_oid(SHA256_WITH_RSA), signature)
            .build(),
    )
}
