//! Document Security Store indexing.
//!
//! A DSS dictionary carries `/Certs`, `/CRLs` and `/OCSPs` arrays of streams
//! holding DER data. The processor decodes every entry once and builds
//! lookup maps keyed by subject name, subject key identifier, CRL issuer and
//! OCSP serial. Undecodable entries are skipped and counted; they never stop
//! the rest of the store from being used.

use std::sync::Arc;

use indexmap::IndexMap;

use super::certificate::{normalize_serial, Certificate};
use super::crl::Crl;
use super::events::{EventBus, ValidationEvent};
use super::ocsp::OcspResponse;
use crate::object::{Dictionary, Object};

/// Revocation store as handed over by a document.
#[derive(Debug, Clone)]
pub enum RevocationStore {
    /// A PDF `/DSS` dictionary whose entries still need decoding
    Dictionary(Object),
    /// Entries already decoded by the caller
    Decoded(DssContents),
}

/// Decoded DSS entries.
#[derive(Debug, Clone, Default)]
pub struct DssContents {
    /// Certificates
    pub certificates: Vec<Arc<Certificate>>,
    /// CRLs
    pub crls: Vec<Arc<Crl>>,
    /// OCSP responses
    pub ocsp_responses: Vec<Arc<OcspResponse>>,
}

impl DssContents {
    /// Empty contents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a certificate.
    pub fn with_certificate(mut self, cert: Arc<Certificate>) -> Self {
        self.certificates.push(cert);
        self
    }

    /// Add a CRL.
    pub fn with_crl(mut self, crl: Arc<Crl>) -> Self {
        self.crls.push(crl);
        self
    }

    /// Add an OCSP response.
    pub fn with_ocsp(mut self, response: Arc<OcspResponse>) -> Self {
        self.ocsp_responses.push(response);
        self
    }
}

/// Counts reported by `DssEntryProcessed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DssStats {
    /// Certificates indexed
    pub certificates: usize,
    /// CRLs indexed
    pub crls: usize,
    /// OCSP responses indexed
    pub ocsp_responses: usize,
    /// Entries that could not be decoded
    pub skipped: usize,
}

/// Immutable lookup structure over one DSS snapshot.
#[derive(Debug, Clone, Default)]
pub struct DssIndex {
    certificates: Vec<Arc<Certificate>>,
    by_subject: IndexMap<Vec<u8>, Vec<usize>>,
    by_key_id: IndexMap<Vec<u8>, Vec<usize>>,
    crls: IndexMap<Vec<u8>, Vec<Arc<Crl>>>,
    ocsp: IndexMap<Vec<u8>, Vec<Arc<OcspResponse>>>,
    stats: DssStats,
}

impl DssIndex {
    /// An index with no entries, used when the document has no store.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index already decoded entries.
    pub fn from_contents(contents: DssContents) -> Self {
        let mut index = Self::default();
        for cert in contents.certificates {
            index.insert_certificate(cert);
        }
        for crl in contents.crls {
            index.insert_crl(crl);
        }
        for response in contents.ocsp_responses {
            index.insert_ocsp(response);
        }
        index
    }

    fn insert_certificate(&mut self, cert: Arc<Certificate>) {
        if self.certificates.iter().any(|known| **known == *cert) {
            log::debug!("duplicate DSS certificate {}", cert);
            return;
        }
        let position = self.certificates.len();
        self.by_subject
            .entry(cert.subject_raw().to_vec())
            .or_default()
            .push(position);
        if let Some(kid) = cert.subject_key_id() {
            self.by_key_id.entry(kid.to_vec()).or_default().push(position);
        }
        self.certificates.push(cert);
        self.stats.certificates += 1;
    }

    fn insert_crl(&mut self, crl: Arc<Crl>) {
        self.crls.entry(crl.issuer_raw().to_vec()).or_default().push(crl);
        self.stats.crls += 1;
    }

    fn insert_ocsp(&mut self, response: Arc<OcspResponse>) {
        for single in response.responses() {
            let entry = self.ocsp.entry(normalize_serial(&single.cert_id.serial)).or_default();
            if !entry.iter().any(|known| Arc::ptr_eq(known, &response)) {
                entry.push(Arc::clone(&response));
            }
        }
        self.stats.ocsp_responses += 1;
    }

    /// Counts of indexed and skipped entries.
    pub fn stats(&self) -> DssStats {
        self.stats
    }

    /// Whether the index holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty() && self.crls.is_empty() && self.ocsp.is_empty()
    }

    /// Every indexed certificate, in store order.
    pub fn certificates(&self) -> &[Arc<Certificate>] {
        &self.certificates
    }

    /// Candidate issuers of `cert`: by authority key id first, then by issuer name.
    pub fn issuers_of(&self, cert: &Certificate) -> Vec<Arc<Certificate>> {
        let positions = cert
            .authority_key_id()
            .and_then(|aki| self.by_key_id.get(aki))
            .or_else(|| self.by_subject.get(cert.issuer_raw()));
        positions
            .into_iter()
            .flatten()
            .map(|&position| Arc::clone(&self.certificates[position]))
            .filter(|candidate| cert.is_issued_by(candidate))
            .collect()
    }

    /// CRLs issued by `issuer`.
    pub fn crls_for(&self, issuer: &Certificate) -> Vec<Arc<Crl>> {
        self.crls
            .get(issuer.subject_raw())
            .into_iter()
            .flatten()
            .filter(|crl| crl.is_issued_by(issuer))
            .cloned()
            .collect()
    }

    /// OCSP responses mentioning the serial of `cert`.
    pub fn ocsp_for(&self, cert: &Certificate) -> Vec<Arc<OcspResponse>> {
        self.ocsp
            .get(&normalize_serial(cert.serial()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Builds [`DssIndex`] values from revocation stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct DssProcessor;

impl DssProcessor {
    /// Create a processor.
    pub fn new() -> Self {
        Self
    }

    /// Index the latest store and emit one `DssEntryProcessed`.
    pub fn index(&self, store: &RevocationStore, events: &EventBus) -> DssIndex {
        let index = self.decode(store);
        let stats = index.stats();
        log::debug!(
            "indexed DSS: {} certificates, {} CRLs, {} OCSP responses, {} skipped",
            stats.certificates,
            stats.crls,
            stats.ocsp_responses,
            stats.skipped
        );
        events.emit(ValidationEvent::DssEntryProcessed {
            certificates: stats.certificates,
            crls: stats.crls,
            ocsp_responses: stats.ocsp_responses,
            skipped: stats.skipped,
        });
        index
    }

    /// Index earlier snapshots, newest first. No events are emitted.
    pub fn index_history(&self, stores: &[RevocationStore]) -> Vec<DssIndex> {
        stores.iter().map(|store| self.decode(store)).collect()
    }

    fn decode(&self, store: &RevocationStore) -> DssIndex {
        match store {
            RevocationStore::Decoded(contents) => DssIndex::from_contents(contents.clone()),
            RevocationStore::Dictionary(object) => match object.as_dict() {
                Some(dict) => decode_dictionary(dict),
                None => {
                    log::warn!("DSS is a {}, not a dictionary; ignoring it", object.type_name());
                    DssIndex::empty()
                },
            },
        }
    }
}

fn decode_dictionary(dict: &Dictionary) -> DssIndex {
    let mut index = DssIndex::default();

    for data in entries(dict, "Certs", &mut index.stats.skipped) {
        match Certificate::from_der(data) {
            Ok(cert) => index.insert_certificate(Arc::new(cert)),
            Err(e) => {
                log::warn!("skipping corrupt DSS certificate: {}", e);
                index.stats.skipped += 1;
            },
        }
    }
    for data in entries(dict, "CRLs", &mut index.stats.skipped) {
        match Crl::from_der(data) {
            Ok(crl) => index.insert_crl(Arc::new(crl)),
            Err(e) => {
                log::warn!("skipping corrupt DSS CRL: {}", e);
                index.stats.skipped += 1;
            },
        }
    }
    for data in entries(dict, "OCSPs", &mut index.stats.skipped) {
        match OcspResponse::from_der(data) {
            Ok(response) => index.insert_ocsp(Arc::new(response)),
            Err(e) => {
                log::warn!("skipping corrupt DSS OCSP response: {}", e);
                index.stats.skipped += 1;
            },
        }
    }

    index
}

/// Payloads of one DSS array; non-stream members are counted as skipped.
fn entries<'a>(dict: &'a Dictionary, key: &str, skipped: &mut usize) -> Vec<&'a [u8]> {
    let Some(value) = dict.get(key) else {
        return Vec::new();
    };
    let Some(array) = value.as_array() else {
        log::warn!("DSS /{} is a {}, expected an array", key, value.type_name());
        *skipped += 1;
        return Vec::new();
    };

    let mut payloads = Vec::with_capacity(array.len());
    for item in array {
        match item.stream_data().or_else(|| item.as_string()) {
            Some(data) => payloads.push(data),
            None => {
                log::warn!("DSS /{} entry is a {}, expected a stream", key, item.type_name());
                *skipped += 1;
            },
        }
    }
    payloads
}
