//! Per-signature validation.
//!
//! A [`Validator`] is created once per document. It indexes the document's
//! revocation stores up front and then validates signatures one by one, each
//! in its own pass through the state machine
//!
//! ```text
//! Started -> ChainBuilding -> RevocationChecking -> Aggregating -> Success | Failure
//! ```
//!
//! Every pass records its events on a fresh bus and returns them with the
//! verdict in a [`ValidationReport`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::algorithms::{AlgorithmPolicyChecker, AlgorithmPolicyMode, UsageLocation};
use super::certificate::{Certificate, CertificateSummary};
use super::chain::{is_trust_anchor, ChainBuilder, IssuerSources};
use super::document::{DocumentModel, SignatureContainer};
use super::dss::{DssIndex, DssProcessor};
use super::events::{EventBus, EventRecord, EventStream, EventType, ValidationEvent};
use super::fetch::{CancellationToken, RetryingFetcher, RevocationFetcher};
use super::revocation::RevocationResolver;
use crate::config::ValidationOptions;
use crate::error::{ChainError, Result};
use crate::signatures::{
    parse_pdf_date, CryptoProvider, RustCryptoProvider, SignatureCheck, SignatureVerifier,
    TimestampToken,
};

/// States of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    /// Signature decoded, claimed time read, CMS signature checked
    Started,
    /// Walking issuer links
    ChainBuilding,
    /// Resolving revocation status per link
    RevocationChecking,
    /// Timestamp validation and policy enforcement
    Aggregating,
    /// Terminal: valid
    Success,
    /// Terminal: invalid or undecided
    Failure,
}

/// Outcome of validating one signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum ValidationVerdict {
    /// Signature and chain are valid at the validation time
    Success,
    /// Validation failed
    Failure {
        /// Certificate the failure is about, when there is one
        certificate: Option<CertificateSummary>,
        /// Why
        reason: String,
        /// Could not prove validity or invalidity
        inconclusive: bool,
    },
}

impl ValidationVerdict {
    /// Whether the signature validated.
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationVerdict::Success)
    }

    /// Whether this is an undecided failure.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, ValidationVerdict::Failure { inconclusive: true, .. })
    }

    /// Failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationVerdict::Success => None,
            ValidationVerdict::Failure { reason, .. } => Some(reason),
        }
    }
}

/// Verdict plus the complete event trail of one pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Unique id of this pass
    pub run_id: Uuid,
    /// Signature field name
    pub signature: String,
    /// Time the chain was validated at
    pub validation_time: DateTime<Utc>,
    /// Verdict
    pub verdict: ValidationVerdict,
    /// Events in emission order
    pub events: Vec<EventRecord>,
}

impl ValidationReport {
    /// Serialize for audit storage.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of events of one type.
    pub fn count(&self, event_type: EventType) -> usize {
        self.events_of(event_type).count()
    }

    /// Events of one type, in order.
    pub fn events_of(&self, event_type: EventType) -> impl Iterator<Item = &ValidationEvent> + '_ {
        self.events
            .iter()
            .map(|record| &record.event)
            .filter(move |event| event.event_type() == event_type)
    }
}

/// Validates the signatures of one document.
pub struct Validator {
    document: Arc<dyn DocumentModel>,
    verifier: SignatureVerifier,
    fetcher: Option<Arc<dyn RevocationFetcher>>,
    options: ValidationOptions,
    latest: Arc<DssIndex>,
    older: Arc<Vec<DssIndex>>,
    has_store: bool,
    index_events: Vec<EventRecord>,
    cancel: CancellationToken,
}

impl Validator {
    /// Index the document's revocation stores and prepare for validation.
    pub fn new(document: Arc<dyn DocumentModel>, options: ValidationOptions) -> Self {
        let processor = DssProcessor::new();
        let bus = EventBus::new();
        let latest_store = document.latest_revocation_store();
        let latest = match &latest_store {
            Some(store) => processor.index(store, &bus),
            None => {
                log::info!("no embedded evidence: document has no DSS");
                DssIndex::empty()
            },
        };
        let older = processor.index_history(&document.older_revocation_stores());

        Self {
            document,
            verifier: SignatureVerifier::new(Arc::new(RustCryptoProvider::new())),
            fetcher: None,
            options,
            latest: Arc::new(latest),
            older: Arc::new(older),
            has_store: latest_store.is_some(),
            index_events: bus.finish(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different crypto backend.
    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.verifier = SignatureVerifier::new(crypto);
        self
    }

    /// Use `fetcher` for network access when live fetching is allowed.
    ///
    /// Calls go through a [`RetryingFetcher`], so a transient failure is
    /// retried once. Do not pass a fetcher that already retries.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn RevocationFetcher>) -> Self {
        let fetcher: Arc<dyn RevocationFetcher> = Arc::new(RetryingFetcher::new(fetcher));
        self.fetcher = Some(fetcher);
        self
    }

    /// Options in effect.
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// The index of the latest DSS.
    pub fn dss_index(&self) -> &Arc<DssIndex> {
        &self.latest
    }

    /// Whether the document carries any DSS at all.
    pub fn has_embedded_evidence(&self) -> bool {
        self.has_store
    }

    /// Validator-wide token. Cancelling it stops every running validation
    /// and every later one; it cannot be reset.
    ///
    /// To cancel a single pass use [`validate_cancellable`](Self::validate_cancellable).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// A streaming subscriber queue sized by the options.
    pub fn event_stream(&self) -> EventStream {
        EventStream::bounded(self.options.event_queue_capacity)
    }

    /// Validate the signature in field `name`.
    ///
    /// Errors only when the signature is missing or cannot be decoded; every
    /// validation outcome, including failures, is a report.
    pub fn validate(&self, name: &str) -> Result<ValidationReport> {
        self.run(name, None, None)
    }

    /// Like [`validate`](Self::validate), stopping early once `token` is
    /// cancelled. Other passes are unaffected.
    pub fn validate_cancellable(
        &self,
        name: &str,
        token: &CancellationToken,
    ) -> Result<ValidationReport> {
        self.run(name, None, Some(token))
    }

    /// Like [`validate`](Self::validate), also pushing events to `stream`.
    /// The stream is closed when the pass ends.
    pub fn validate_streaming(&self, name: &str, stream: &EventStream) -> Result<ValidationReport> {
        self.run(name, Some(stream), None)
    }

    /// Validate every signature concurrently, one thread per signature.
    ///
    /// Each pass gets its own cancellation scope; only the validator-wide
    /// token stops them all.
    pub fn validate_all(&self) -> Vec<(String, Result<ValidationReport>)> {
        let names = self.document.signature_names();
        std::thread::scope(|scope| {
            let handles: Vec<_> = names
                .iter()
                .map(|name| scope.spawn(move || self.validate(name)))
                .collect();
            names
                .iter()
                .cloned()
                .zip(handles)
                .map(|(name, handle)| {
                    let report = handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
                    (name, report)
                })
                .collect()
        })
    }

    fn run(
        &self,
        name: &str,
        stream: Option<&EventStream>,
        token: Option<&CancellationToken>,
    ) -> Result<ValidationReport> {
        let container = match self.document.signature(name) {
            Ok(container) => container,
            Err(e) => {
                if let Some(stream) = stream {
                    stream.close();
                }
                return Err(e);
            },
        };
        let bus = EventBus::new();
        if let Some(stream) = stream {
            bus.subscribe(stream.clone());
        }

        let cancel = match token {
            Some(token) => self.cancel.linked(token),
            None => self.cancel.child(),
        };
        let outcome =
            SignatureRun::new(self, &bus, &cancel, name.to_string(), false).execute(&container, None);
        Ok(ValidationReport {
            run_id: Uuid::new_v4(),
            signature: name.to_string(),
            validation_time: outcome.validation_time,
            verdict: outcome.verdict,
            events: bus.finish(),
        })
    }
}

struct RunOutcome {
    verdict: ValidationVerdict,
    validation_time: DateTime<Utc>,
}

/// Failures collected during one pass; a definite one outranks inconclusive ones.
#[derive(Default)]
struct Findings {
    definite: Option<(Option<CertificateSummary>, String)>,
    inconclusive: Option<(Option<CertificateSummary>, String)>,
}

impl Findings {
    fn fail(&mut self, certificate: Option<CertificateSummary>, reason: String, inconclusive: bool) {
        log::debug!("validation finding (inconclusive: {}): {}", inconclusive, reason);
        let slot = if inconclusive {
            &mut self.inconclusive
        } else {
            &mut self.definite
        };
        if slot.is_none() {
            *slot = Some((certificate, reason));
        }
    }

    fn has_definite(&self) -> bool {
        self.definite.is_some()
    }

    fn verdict(&self) -> ValidationVerdict {
        match (&self.definite, &self.inconclusive) {
            (Some((certificate, reason)), _) => ValidationVerdict::Failure {
                certificate: certificate.clone(),
                reason: reason.clone(),
                inconclusive: false,
            },
            (None, Some((certificate, reason))) => ValidationVerdict::Failure {
                certificate: certificate.clone(),
                reason: reason.clone(),
                inconclusive: true,
            },
            (None, None) => ValidationVerdict::Success,
        }
    }
}

struct SignatureRun<'v> {
    validator: &'v Validator,
    bus: &'v EventBus,
    cancel: &'v CancellationToken,
    policy: AlgorithmPolicyChecker<'v>,
    label: String,
    nested: bool,
    state: ValidationState,
    findings: Findings,
    now: DateTime<Utc>,
}

impl<'v> SignatureRun<'v> {
    fn new(
        validator: &'v Validator,
        bus: &'v EventBus,
        cancel: &'v CancellationToken,
        label: String,
        nested: bool,
    ) -> Self {
        Self {
            validator,
            bus,
            cancel,
            policy: AlgorithmPolicyChecker::new(&validator.options.algorithm_policy, bus),
            label,
            nested,
            state: ValidationState::Started,
            findings: Findings::default(),
            now: validator.options.now(),
        }
    }

    fn transition(&mut self, next: ValidationState) {
        log::debug!("{}: {:?} -> {:?}", self.label, self.state, next);
        self.state = next;
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn record(&mut self, check: SignatureCheck, certificate: Option<CertificateSummary>) -> bool {
        match check {
            SignatureCheck::Valid => true,
            SignatureCheck::Invalid(e) => {
                self.findings.fail(certificate, e.to_string(), false);
                false
            },
            SignatureCheck::Indeterminate(why) => {
                self.findings
                    .fail(certificate, format!("signature could not be verified: {}", why), true);
                false
            },
        }
    }

    fn claimed_signing_time(&self, container: &SignatureContainer) -> Option<DateTime<Utc>> {
        if let Some(info) = &container.document_timestamp {
            return Some(info.gen_time);
        }
        let from_dictionary = container.info.signing_time.as_deref().and_then(|m| {
            parse_pdf_date(m)
                .map_err(|e| log::debug!("{}: ignoring /M: {}", self.label, e))
                .ok()
        });
        from_dictionary.or(container.cms.signer.signing_time)
    }

    fn execute(mut self, container: &SignatureContainer, time_override: Option<DateTime<Utc>>) -> RunOutcome {
        let validator = self.validator;
        let options = &validator.options;
        let verifier = &validator.verifier;
        let cms = &container.cms;

        // Started
        let claimed = self.claimed_signing_time(container);
        self.bus.emit(ValidationEvent::SignatureValidationStarted {
            signature: self.label.clone(),
            claimed_signing_time: claimed,
        });
        if !self.nested {
            self.bus.replay(&validator.index_events);
        }

        self.policy
            .check_identifier(&cms.signer.digest_algorithm, UsageLocation::SignerDigest);
        self.policy
            .check_identifier(&cms.signer.signature_algorithm, UsageLocation::SignerSignature);

        let Some(signer) = cms.signer_certificate() else {
            self.findings.fail(
                None,
                "signer certificate not found in the signature container".to_string(),
                true,
            );
            let at = time_override.or(options.validation_time).or(claimed).unwrap_or(self.now);
            return self.finish(None, at);
        };

        let content: &[u8] = if container.is_document_timestamp() {
            cms.encapsulated_content.as_deref().unwrap_or_default()
        } else {
            &container.signed_bytes
        };
        let check = verifier.verify_cms(cms, content, &signer);
        if !self.record(check, Some(signer.summary())) {
            let at = time_override.or(options.validation_time).or(claimed).unwrap_or(self.now);
            return self.finish(Some(&signer), at);
        }

        if let Some(info) = &container.document_timestamp {
            self.policy
                .check_identifier(&info.imprint_algorithm, UsageLocation::TimestampImprint);
            let token = TimestampToken {
                signed_data: cms.clone(),
                info: info.clone(),
            };
            let check = verifier.verify_timestamp_imprint(&token, &container.signed_bytes);
            if !self.record(check, Some(signer.summary())) {
                return self.finish(Some(&signer), info.gen_time);
            }
        }

        let mut proof_of_existence = None;
        let mut timestamp = None;
        if !self.nested {
            match validator.document.timestamp_token(container) {
                Ok(Some(token)) => {
                    self.bus.emit(ValidationEvent::ProofOfExistenceFound {
                        signature: self.label.clone(),
                        time: token.info.gen_time,
                    });
                    self.policy
                        .check_identifier(&token.info.imprint_algorithm, UsageLocation::TimestampImprint);
                    match verifier.verify_timestamp_imprint(&token, &cms.signer.signature) {
                        SignatureCheck::Valid => {
                            proof_of_existence = Some(token.info.gen_time);
                            timestamp = Some(token);
                        },
                        check => {
                            let definite = matches!(check, SignatureCheck::Invalid(_));
                            self.record(check, Some(signer.summary()));
                            if definite {
                                let at = time_override
                                    .or(options.validation_time)
                                    .or(claimed)
                                    .unwrap_or(self.now);
                                return self.finish(Some(&signer), at);
                            }
                        },
                    }
                },
                Ok(None) => {},
                Err(e) => log::warn!("{}: unreadable signature timestamp ignored: {}", self.label, e),
            }
        }

        let validation_time = time_override
            .or(options.validation_time)
            .or(proof_of_existence)
            .or(claimed)
            .unwrap_or(self.now);
        log::debug!("{}: validating at {}", self.label, validation_time);

        // ChainBuilding
        self.transition(ValidationState::ChainBuilding);
        let sources = IssuerSources {
            trust_anchors: &options.trust_anchors,
            latest: &validator.latest,
            older: &validator.older,
            embedded: &cms.certificates,
        };
        let mut builder = ChainBuilder::new(sources, self.bus).with_cancellation(self.cancel);
        if options.allow_live_fetch {
            if let Some(fetcher) = &validator.fetcher {
                builder = builder.with_fetcher(fetcher.as_ref(), options.fetch_timeout);
            }
        }
        let chain = match builder.build_chain(Arc::clone(&signer), options.max_chain_depth) {
            Ok(chain) => chain,
            Err(e) => {
                let certificate = match &e {
                    ChainError::CycleDetected { certificate }
                    | ChainError::IssuerUnresolvable { certificate } => certificate.clone(),
                    ChainError::TooLong { .. } | ChainError::Cancelled => signer.summary(),
                };
                self.findings.fail(Some(certificate), e.to_string(), e.is_inconclusive());
                return self.finish(Some(&signer), validation_time);
            },
        };

        for cert in chain.certificates() {
            if !cert.is_valid_at(validation_time) {
                self.findings.fail(
                    Some(cert.summary()),
                    format!("certificate {} not valid at {}", cert, validation_time),
                    false,
                );
            }
        }
        for (cert, issuer) in chain.links() {
            self.policy
                .check_identifier(cert.signature_algorithm(), UsageLocation::CertificateSignature);
            let check = verifier.verify_certificate(cert, issuer);
            let definite = matches!(check, SignatureCheck::Invalid(_));
            if !self.record(check, Some(cert.summary())) && definite {
                return self.finish(Some(&signer), validation_time);
            }
        }
        if !options.trust_anchors.is_empty() && !is_trust_anchor(chain.root(), &options.trust_anchors) {
            self.findings.fail(
                Some(chain.root().summary()),
                format!("chain ends at untrusted root {}", chain.root()),
                false,
            );
        }

        // RevocationChecking
        self.transition(ValidationState::RevocationChecking);
        {
            let mut resolver = RevocationResolver::new(
                &validator.latest,
                verifier,
                &self.policy,
                self.bus,
                options,
            )
            .with_older(&validator.older)
            .with_cancellation(self.cancel)
            .with_current_time(self.now);
            if let Some(fetcher) = &validator.fetcher {
                resolver = resolver.with_fetcher(fetcher.as_ref());
            }

            for (cert, issuer) in chain.links() {
                if self.cancel.is_cancelled() {
                    self.findings
                        .fail(Some(cert.summary()), "validation cancelled".to_string(), true);
                    break;
                }
                let evidence = resolver.resolve(cert, issuer, validation_time);
                if evidence.is_revoked_at(validation_time) {
                    self.findings.fail(
                        Some(cert.summary()),
                        format!("certificate {} revoked", cert),
                        false,
                    );
                } else if evidence.is_inconclusive_at(validation_time) {
                    self.findings.fail(
                        Some(cert.summary()),
                        format!("revocation status of {} could not be established", cert),
                        true,
                    );
                }
            }
        }

        // Aggregating
        self.transition(ValidationState::Aggregating);
        if let Some(token) = timestamp {
            if self.cancelled() {
                self.findings.fail(None, "validation cancelled".to_string(), true);
            } else if !self.findings.has_definite() {
                self.validate_timestamp(token);
            }
        }
        if options.algorithm_policy_mode == AlgorithmPolicyMode::Enforce {
            for violation in self.policy.violations() {
                self.findings.fail(None, violation.to_string(), false);
            }
        }

        self.finish(Some(&signer), validation_time)
    }

    /// Validate the signer chain of a signature timestamp at the current time.
    fn validate_timestamp(&mut self, token: TimestampToken) {
        let label = format!("{}/timestamp", self.label);
        let content = token.signed_data.encapsulated_content.clone().unwrap_or_default();
        let container = SignatureContainer::new(label.clone(), content, token.signed_data);
        let nested = SignatureRun::new(self.validator, self.bus, self.cancel, label, true);
        let outcome = nested.execute(&container, Some(self.now));
        if let ValidationVerdict::Failure {
            certificate,
            reason,
            inconclusive,
        } = outcome.verdict
        {
            self.findings
                .fail(certificate, format!("signature timestamp: {}", reason), inconclusive);
        }
    }

    fn finish(mut self, signer: Option<&Certificate>, validation_time: DateTime<Utc>) -> RunOutcome {
        let verdict = self.findings.verdict();
        match &verdict {
            ValidationVerdict::Success => {
                self.transition(ValidationState::Success);
                if let Some(signer) = signer {
                    self.bus.emit(ValidationEvent::CertificateChainValidationSuccess {
                        certificate: signer.summary(),
                        inconclusive: false,
                    });
                }
                self.bus.emit(ValidationEvent::SignatureValidationSuccess {
                    signature: self.label.clone(),
                });
                log::info!("{}: valid at {}", self.label, validation_time);
            },
            ValidationVerdict::Failure {
                certificate,
                reason,
                inconclusive,
            } => {
                self.transition(ValidationState::Failure);
                if let Some(signer) = signer {
                    self.bus.emit(ValidationEvent::CertificateChainValidationFailure {
                        certificate: certificate.clone().unwrap_or_else(|| signer.summary()),
                        reason: reason.clone(),
                        inconclusive: *inconclusive,
                    });
                }
                self.bus.emit(ValidationEvent::SignatureValidationFailure {
                    signature: self.label.clone(),
                    reason: reason.clone(),
                    inconclusive: *inconclusive,
                });
                log::info!(
                    "{}: {} failure: {}",
                    self.label,
                    if *inconclusive { "inconclusive" } else { "definite" },
                    reason
                );
            },
        }
        RunOutcome {
            verdict,
            validation_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::{AlgorithmIdentifier, CmsSignedData, DigestAlgorithm, SignerId, SignerInfo};
    use crate::validation::document::InMemoryDocument;
    use crate::validation::dss::{DssContents, RevocationStore};
    use crate::validation::evidence::CertStatus;
    use crate::validation::testing::*;

    const CONTENT: &[u8] = b"%PDF-1.7 signed revision";

    fn signed_cms(signer: &Arc<Certificate>, content: &[u8], extra: Vec<Arc<Certificate>>) -> CmsSignedData {
        let mut certificates = vec![Arc::clone(signer)];
        certificates.extend(extra);
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
                signing_time: Some(day(10)),
                signature: sign(signer.public_key(), content),
                timestamp_token: None,
            },
            encapsulated_content: None,
        }
    }

    fn validator(document: InMemoryDocument, options: ValidationOptions) -> Validator {
        Validator::new(Arc::new(document), options).with_crypto(Arc::new(KeyedHashCrypto))
    }

    fn chain() -> (Arc<Certificate>, Arc<Certificate>, Arc<Certificate>) {
        (
            issued("CN=Root", "CN=Root", 1),
            issued("CN=Intermediate", "CN=Root", 2),
            issued("CN=Signer", "CN=Intermediate", 3),
        )
    }

    #[test]
    fn test_missing_signature_is_an_error() {
        let v = validator(InMemoryDocument::new(), ValidationOptions::new());
        assert!(v.validate("Nope").is_err());
        assert!(!v.has_embedded_evidence());
    }

    #[test]
    fn test_successful_validation_state_trail() {
        let (root, intermediate, signer) = chain();
        let dss = DssContents::new()
            .with_certificate(Arc::clone(&root))
            .with_certificate(Arc::clone(&intermediate))
            .with_ocsp(ocsp(&signer, &intermediate, &intermediate, day(10), CertStatus::Good))
            .with_ocsp(ocsp(&intermediate, &root, &root, day(10), CertStatus::Good));
        let doc = InMemoryDocument::new()
            .with_signature(SignatureContainer::new("Sig1", CONTENT.to_vec(), signed_cms(&signer, CONTENT, vec![])))
            .with_latest_store(RevocationStore::Decoded(dss));
        let v = validator(doc, ValidationOptions::new().with_current_time(day(30)));

        let report = v.validate("Sig1").unwrap();
        assert!(report.verdict.is_success(), "{:?}", report.verdict);
        assert_eq!(report.validation_time, day(10));
        assert_eq!(report.events[0].event.event_type(), EventType::SignatureValidationStarted);
        assert_eq!(report.count(EventType::DssEntryProcessed), 1);
        assert_eq!(
            report.events.last().unwrap().event.event_type(),
            EventType::SignatureValidationSuccess
        );
        assert!(report.events.iter().all(|r| !r.event.is_inconclusive()));
    }

    #[test]
    fn test_tampered_content_is_definite_failure() {
        let (root, intermediate, signer) = chain();
        let doc = InMemoryDocument::new().with_signature(SignatureContainer::new(
            "Sig1",
            b"tampered".to_vec(),
            signed_cms(&signer, CONTENT, vec![intermediate, root]),
        ));
        let report = validator(doc, ValidationOptions::new()).validate("Sig1").unwrap();
        assert!(!report.verdict.is_success());
        assert!(!report.verdict.is_inconclusive());
        assert_eq!(report.count(EventType::CertificateIssuerRetrievedOutsideDss), 0);
    }

    #[test]
    fn test_untrusted_root_fails() {
        let (root, intermediate, signer) = chain();
        let other_root = issued("CN=Other Root", "CN=Other Root", 9);
        let doc = InMemoryDocument::new().with_signature(SignatureContainer::new(
            "Sig1",
            CONTENT.to_vec(),
            signed_cms(&signer, CONTENT, vec![intermediate, root]),
        ));
        let options = ValidationOptions::new().with_trust_anchor(other_root);
        let report = validator(doc, options).validate("Sig1").unwrap();
        assert!(report.verdict.reason().unwrap().contains("untrusted root"));
        assert!(!report.verdict.is_inconclusive());
    }

    #[test]
    fn test_cancelled_validation_is_inconclusive() {
        let (root, intermediate, signer) = chain();
        let doc = InMemoryDocument::new().with_signature(SignatureContainer::new(
            "Sig1",
            CONTENT.to_vec(),
            signed_cms(&signer, CONTENT, vec![intermediate, root]),
        ));
        let v = validator(doc, ValidationOptions::new());
        v.cancellation_token().cancel();
        let report = v.validate("Sig1").unwrap();
        assert!(report.verdict.is_inconclusive());
        assert!(report.verdict.reason().unwrap().contains("cancelled"));
    }

    #[test]
    fn test_cancelling_one_pass_leaves_others_alone() {
        let (root, intermediate, signer) = chain();
        let doc = InMemoryDocument::new().with_signature(SignatureContainer::new(
            "Sig1",
            CONTENT.to_vec(),
            signed_cms(&signer, CONTENT, vec![intermediate, root]),
        ));
        let v = validator(doc, ValidationOptions::new());
        let token = CancellationToken::new();
        token.cancel();

        let cancelled = v.validate_cancellable("Sig1", &token).unwrap();
        assert!(cancelled.verdict.reason().unwrap().contains("cancelled"));
        assert!(!v.cancellation_token().is_cancelled());

        let report = v.validate("Sig1").unwrap();
        assert!(report.verdict.reason().map_or(true, |r| !r.contains("cancelled")));
    }

    #[test]
    fn test_report_serializes() {
        let (root, _, _) = chain();
        let doc = InMemoryDocument::new().with_signature(SignatureContainer::new(
            "Self",
            CONTENT.to_vec(),
            signed_cms(&root, CONTENT, vec![]),
        ));
        let report = validator(doc, ValidationOptions::new()).validate("Self").unwrap();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"signature\": \"Self\""));
        assert!(json.contains("SignatureValidationStarted"));
    }
}
