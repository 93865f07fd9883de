//! Long-term validation of PDF signatures.
//!
//! This module establishes trust in a signer certificate and decides, for
//! each certificate of its chain, whether it was revoked at the time that
//! matters. It works from the evidence embedded in the document (the DSS)
//! first and only reaches out to the network when allowed.
//!
//! ## Components
//!
//! - **Algorithm Policy**: allow-lists of digest and signature algorithms
//! - **DSS Processor**: indexes certificates, CRLs and OCSP responses of a DSS
//! - **Chain Builder**: walks issuer links up to a root or trust anchor
//! - **Revocation Resolver**: finds usable revocation evidence per certificate
//! - **Validator**: the per-signature state machine producing a verdict
//! - **Event Bus**: the typed audit trail every component reports to
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pdf_ltv::{PdfSignatureDocument, ValidationOptions, Validator};
//!
//! let document = PdfSignatureDocument::new(pdf_bytes)
//!     .with_signature("Signature1", signature_dictionary)
//!     .with_revocation_store(dss_dictionary);
//! let validator = Validator::new(Arc::new(document), ValidationOptions::default());
//! let report = validator.validate("Signature1")?;
//! println!("{}", report.to_json()?);
//! ```

mod algorithms;
pub(crate) mod certificate;
mod chain;
mod crl;
mod document;
mod dss;
mod events;
mod evidence;
mod fetch;
mod ocsp;
mod orchestrator;
mod revocation;

#[cfg(test)]
mod testing;

pub use algorithms::{
    algorithm_name, AlgorithmPolicy, AlgorithmPolicyChecker, AlgorithmPolicyMode, AlgorithmUsage,
    UsageLocation,
};
pub use certificate::{
    Certificate, CertificateBuilder, CertificateSummary, KeyUsage, OID_KP_OCSP_SIGNING,
    OID_KP_TIME_STAMPING, OID_OCSP_NO_CHECK,
};
pub use chain::{is_trust_anchor, CertificateChain, ChainBuilder, IssuerSources};
pub use crl::{Crl, CrlBuilder, RevokedEntry};
pub use document::{DocumentModel, InMemoryDocument, PdfSignatureDocument, SignatureContainer};
pub use dss::{DssContents, DssIndex, DssProcessor, DssStats, RevocationStore};
pub use events::{EventBus, EventRecord, EventStream, EventType, ValidationEvent};
pub use evidence::{CertStatus, EvidenceSource, RevocationEvidence, RevocationReason};
pub use fetch::{CancellationToken, FetchResult, OfflineFetcher, RetryingFetcher, RevocationFetcher};
pub use ocsp::{CertId, OcspResponse, OcspResponseBuilder, ResponderId, SingleResponse};
pub use orchestrator::{ValidationReport, ValidationState, ValidationVerdict, Validator};
pub use revocation::RevocationResolver;
