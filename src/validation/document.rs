//! Access to the signatures and revocation stores of a document.
//!
//! Validation does not parse files. It consumes a [`DocumentModel`], which
//! hands out decoded signature containers and the document's DSS snapshots.
//! [`PdfSignatureDocument`] implements it over PDF objects and the raw file
//! bytes; [`InMemoryDocument`] over values built by the caller.

use std::collections::HashMap;

use bytes::Bytes;
use indexmap::IndexMap;

use super::dss::RevocationStore;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::signatures::{ByteRange, CmsSignedData, SignatureInfo, TimestampToken, TstInfo};

/// One decoded signature.
#[derive(Debug, Clone)]
pub struct SignatureContainer {
    /// Signature field name
    pub name: String,
    /// Dictionary entries
    pub info: SignatureInfo,
    /// Bytes covered by the ByteRange
    pub signed_bytes: Vec<u8>,
    /// Decoded CMS container
    pub cms: CmsSignedData,
    /// For document timestamps: the token content
    pub document_timestamp: Option<TstInfo>,
}

impl SignatureContainer {
    /// Container over already decoded parts.
    pub fn new(name: impl Into<String>, signed_bytes: Vec<u8>, cms: CmsSignedData) -> Self {
        Self {
            name: name.into(),
            info: SignatureInfo::default(),
            signed_bytes,
            cms,
            document_timestamp: None,
        }
    }

    /// Replace the dictionary entries.
    pub fn with_info(mut self, info: SignatureInfo) -> Self {
        self.info = info;
        self
    }

    /// Mark as a document timestamp over `signed_bytes`.
    pub fn with_document_timestamp(mut self, info: TstInfo) -> Self {
        self.document_timestamp = Some(info);
        self
    }

    /// Whether this is an RFC 3161 document timestamp.
    pub fn is_document_timestamp(&self) -> bool {
        self.document_timestamp.is_some()
            || self.info.sub_filter.is_some_and(|sub_filter| sub_filter.is_document_timestamp())
    }
}

/// What validation needs from a document.
pub trait DocumentModel: Send + Sync {
    /// Names of all signature fields, in document order.
    fn signature_names(&self) -> Vec<String>;

    /// Decode one signature.
    fn signature(&self, name: &str) -> Result<SignatureContainer>;

    /// The most recent DSS, if any.
    fn latest_revocation_store(&self) -> Option<RevocationStore>;

    /// Earlier DSS snapshots from previous revisions, newest first.
    fn older_revocation_stores(&self) -> Vec<RevocationStore> {
        Vec::new()
    }

    /// DER of the signature timestamp attached to `signature`.
    fn embedded_timestamp(&self, signature: &SignatureContainer) -> Option<Vec<u8>> {
        signature.cms.signer.timestamp_token.clone()
    }

    /// Decoded signature timestamp of `signature`.
    fn timestamp_token(&self, signature: &SignatureContainer) -> Result<Option<TimestampToken>> {
        self.embedded_timestamp(signature)
            .map(|der| TimestampToken::from_der(&der))
            .transpose()
    }
}

/// Document model over a PDF file and its signature dictionaries.
#[derive(Debug, Clone)]
pub struct PdfSignatureDocument {
    data: Bytes,
    signatures: IndexMap<String, Object>,
    stores: Vec<Object>,
}

impl PdfSignatureDocument {
    /// Wrap the complete file bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            signatures: IndexMap::new(),
            stores: Vec::new(),
        }
    }

    /// Register a signature dictionary under its field name.
    pub fn with_signature(mut self, name: impl Into<String>, dictionary: Object) -> Self {
        self.signatures.insert(name.into(), dictionary);
        self
    }

    /// Append a `/DSS` dictionary; the last one added is the latest.
    pub fn with_revocation_store(mut self, dss: Object) -> Self {
        self.stores.push(dss);
        self
    }

    /// Size of the file.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl DocumentModel for PdfSignatureDocument {
    fn signature_names(&self) -> Vec<String> {
        self.signatures.keys().cloned().collect()
    }

    fn signature(&self, name: &str) -> Result<SignatureContainer> {
        let dictionary = self
            .signatures
            .get(name)
            .ok_or_else(|| Error::SignatureNotFound(name.to_string()))?;
        let info = SignatureInfo::from_dictionary(dictionary)?;

        let byte_range = ByteRange::from_values(&info.byte_range)?;
        let signed_bytes = byte_range.extract_signed_bytes(&self.data)?;
        let contents = if info.contents.is_empty() {
            byte_range.extract_contents(&self.data)?
        } else {
            info.contents.clone()
        };
        if !byte_range.covers_whole_file(self.data.len()) {
            log::info!("signature {} does not cover the whole file", name);
        }

        let is_timestamp = info.sub_filter.is_some_and(|s| s.is_document_timestamp());
        let (cms, document_timestamp) = if is_timestamp {
            let token = TimestampToken::from_der(&contents)?;
            (token.signed_data, Some(token.info))
        } else {
            (CmsSignedData::from_der(&contents)?, None)
        };

        Ok(SignatureContainer {
            name: name.to_string(),
            info,
            signed_bytes,
            cms,
            document_timestamp,
        })
    }

    fn latest_revocation_store(&self) -> Option<RevocationStore> {
        self.stores.last().cloned().map(RevocationStore::Dictionary)
    }

    fn older_revocation_stores(&self) -> Vec<RevocationStore> {
        let older = self.stores.len().saturating_sub(1);
        self.stores[..older]
            .iter()
            .rev()
            .cloned()
            .map(RevocationStore::Dictionary)
            .collect()
    }
}

/// Document model over pre-built values.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocument {
    signatures: IndexMap<String, SignatureContainer>,
    timestamps: HashMap<String, TimestampToken>,
    latest: Option<RevocationStore>,
    older: Vec<RevocationStore>,
}

impl InMemoryDocument {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signature.
    pub fn with_signature(mut self, signature: SignatureContainer) -> Self {
        self.signatures.insert(signature.name.clone(), signature);
        self
    }

    /// Attach a decoded signature timestamp to the signature `name`.
    pub fn with_timestamp(mut self, name: impl Into<String>, token: TimestampToken) -> Self {
        self.timestamps.insert(name.into(), token);
        self
    }

    /// Set the latest revocation store.
    pub fn with_latest_store(mut self, store: RevocationStore) -> Self {
        self.latest = Some(store);
        self
    }

    /// Add an older snapshot; add newest first.
    pub fn with_older_store(mut self, store: RevocationStore) -> Self {
        self.older.push(store);
        self
    }
}

impl DocumentModel for InMemoryDocument {
    fn signature_names(&self) -> Vec<String> {
        self.signatures.keys().cloned().collect()
    }

    fn signature(&self, name: &str) -> Result<SignatureContainer> {
        self.signatures
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SignatureNotFound(name.to_string()))
    }

    fn latest_revocation_store(&self) -> Option<RevocationStore> {
        self.latest.clone()
    }

    fn older_revocation_stores(&self) -> Vec<RevocationStore> {
        self.older.clone()
    }

    fn timestamp_token(&self, signature: &SignatureContainer) -> Result<Option<TimestampToken>> {
        match self.timestamps.get(&signature.name) {
            Some(token) => Ok(Some(token.clone())),
            None => self
                .embedded_timestamp(signature)
                .map(|der| TimestampToken::from_der(&der))
                .transpose(),
        }
    }
}
