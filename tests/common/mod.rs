//! Shared fixtures for the integration tests.
//!
//! Keys are plain byte strings and a "signature" is SHA-256(key || data), so
//! chains, CRLs and OCSP responses can be built without real key material.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use pdf_ltv::signatures::{
    AlgorithmIdentifier, CmsSignedData, CryptoProvider, DigestAlgorithm, RustCryptoProvider,
    SignatureScheme, SignerId, SignerInfo,
};
use pdf_ltv::validation::{
    CertId, CertStatus, Certificate, CertificateBuilder, Crl, FetchResult, OcspResponse,
    ResponderId, RevocationFetcher, SignatureContainer, SingleResponse,
};
use pdf_ltv::{FetchError, InMemoryDocument, ValidationOptions, Validator};

pub const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
pub const CONTENT: &[u8] = b"%PDF-1.7 ... signed revision bytes ...";

pub struct KeyedHashCrypto;

impl CryptoProvider for KeyedHashCrypto {
    fn digest(&self, data: &[u8], algorithm: DigestAlgorithm) -> pdf_ltv::Result<Vec<u8>> {
        RustCryptoProvider::new().digest(data, algorithm)
    }

    fn verify_signature(
        &self,
        data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        _scheme: SignatureScheme,
    ) -> pdf_ltv::Result<bool> {
        Ok(sign(public_key, data) == signature)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    RustCryptoProvider::new()
        .digest(&[key, data].concat(), DigestAlgorithm::Sha256)
        .unwrap()
}

pub fn key_of(subject: &str) -> Vec<u8> {
    format!("{}-key", subject).into_bytes()
}

pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::days(n)
}

/// Certificate for `subject` signed by `issuer`, customised by `extra`.
pub fn issued_with(
    subject: &str,
    issuer: &str,
    serial: u8,
    extra: impl FnOnce(CertificateBuilder) -> CertificateBuilder,
) -> Arc<Certificate> {
    let tbs = format!("tbs:{}:{}", subject, serial).into_bytes();
    let signature = sign(&key_of(issuer), &tbs);
    let builder = Certificate::builder(subject, issuer)
        .serial(&[serial])
        .public_key(key_of(subject), key_of(subject))
        .ca(subject == issuer);
    Arc::new(
        extra(builder)
            .signature(tbs, AlgorithmIdentifier::from_oid(SHA256_WITH_RSA), signature)
            .build(),
    )
}

pub fn issued(subject: &str, issuer: &str, serial: u8) -> Arc<Certificate> {
    issued_with(subject, issuer, serial, |b| b)
}

/// Root, intermediate and signer.
pub fn three_level_chain() -> (Arc<Certificate>, Arc<Certificate>, Arc<Certificate>) {
    (
        issued("CN=Root CA", "CN=Root CA", 1),
        issued("CN=Intermediate CA", "CN=Root CA", 2),
        issued("CN=Signer", "CN=Intermediate CA", 3),
    )
}

pub fn ocsp(
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

pub fn crl(
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

/// Detached CMS by `signer` over `content`, shipping `extra` certificates.
pub fn signed_cms(
    signer: &Arc<Certificate>,
    content: &[u8],
    signing_time: DateTime<Utc>,
    extra: &[Arc<Certificate>],
) -> CmsSignedData {
    let mut certificates = vec![Arc::clone(signer)];
    certificates.extend(extra.iter().cloned());
    CmsSignedData {
        certificates,
        signer: SignerInfo {
            signer_id: SignerId::IssuerAndSerial {
                issuer_raw: signer.issuer_raw().to_vec(),
                serial: signer.serial().to_vec(),
            },
            digest_algorithm: AlgorithmIdentifier::digest(DigestAlgorithm::Sha256),
            signature_algorithm: AlgorithmIdentifier::from_oid(SHA256_WITH_RSA),
            signed_attributes: None,
            message_digest: None,
            signing_time: Some(signing_time),
            signature: sign(signer.public_key(), content),
            timestamp_token: None,
        },
        encapsulated_content: None,
    }
}

pub fn signature(
    name: &str,
    signer: &Arc<Certificate>,
    signing_time: DateTime<Utc>,
    extra: &[Arc<Certificate>],
) -> SignatureContainer {
    SignatureContainer::new(name, CONTENT.to_vec(), signed_cms(signer, CONTENT, signing_time, extra))
}

pub fn validator(document: InMemoryDocument, options: ValidationOptions) -> Validator {
    Validator::new(Arc::new(document), options).with_crypto(Arc::new(KeyedHashCrypto))
}

/// Fetcher serving canned answers and counting calls.
#[derive(Default)]
pub struct CannedFetcher {
    issuers: HashMap<String, Certificate>,
    crls: HashMap<String, Crl>,
    ocsp: HashMap<String, OcspResponse>,
    transient_failures: Mutex<usize>,
    pub issuer_calls: AtomicUsize,
    pub crl_calls: AtomicUsize,
    pub ocsp_calls: AtomicUsize,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issuer(mut self, url: &str, cert: &Certificate) -> Self {
        self.issuers.insert(url.to_string(), cert.clone());
        self
    }

    pub fn with_crl(mut self, url: &str, crl: &Crl) -> Self {
        self.crls.insert(url.to_string(), crl.clone());
        self
    }

    /// Answer OCSP requests about `subject`.
    pub fn with_ocsp(mut self, subject: &str, response: &OcspResponse) -> Self {
        self.ocsp.insert(subject.to_string(), response.clone());
        self
    }

    /// Fail the next `count` calls with a transient error.
    pub fn failing_first(self, count: usize) -> Self {
        *self.transient_failures.lock().unwrap() = count;
        self
    }

    fn transient(&self) -> Option<FetchError> {
        let mut remaining = self.transient_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Some(FetchError::Transient("connection reset".to_string()));
        }
        None
    }
}

impl RevocationFetcher for CannedFetcher {
    fn fetch_ocsp(
        &self,
        certificate: &Certificate,
        _issuer: &Certificate,
        _timeout: Duration,
    ) -> FetchResult<OcspResponse> {
        self.ocsp_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.transient() {
            return Err(e);
        }
        self.ocsp
            .get(certificate.subject())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(certificate.subject().to_string()))
    }

    fn fetch_crl(&self, url: &str, _timeout: Duration) -> FetchResult<Crl> {
        self.crl_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.transient() {
            return Err(e);
        }
        self.crls
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }

    fn fetch_issuer_certificate(&self, url: &str, _timeout: Duration) -> FetchResult<Certificate> {
        self.issuer_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.transient() {
            return Err(e);
        }
        self.issuers
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}
