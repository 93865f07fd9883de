//! Revocation status resolution.
//!
//! Evidence is searched tier by tier and the first usable piece wins:
//!
//! 1. OCSP responses from the latest DSS, produced no earlier than the
//!    validation time minus the freshness tolerance
//! 2. CRLs from the latest DSS covering the validation time
//! 3. older DSS snapshots, only for historical validation times
//! 4. live OCSP, then live CRLs, when fetching is allowed
//!
//! Every OCSP or CRL signature is checked before the evidence is used. An
//! OCSP response may be signed by the issuer itself or by a delegated
//! responder certificate issued by it for OCSP signing; the responder's own
//! status is chased with a bounded depth unless it carries ocsp-nocheck.
//! Failures along the way are logged and the next candidate is tried.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::algorithms::{AlgorithmPolicyChecker, UsageLocation};
use super::certificate::Certificate;
use super::crl::Crl;
use super::dss::DssIndex;
use super::events::{EventBus, ValidationEvent};
use super::evidence::{CertStatus, EvidenceSource, RevocationEvidence};
use super::fetch::{CancellationToken, RevocationFetcher};
use super::ocsp::{OcspResponse, ResponderId, SingleResponse};
use crate::config::ValidationOptions;
use crate::error::{RevocationError, SignatureVerificationError};
use crate::signatures::crypto::to_hex;
use crate::signatures::SignatureVerifier;

type Usable = std::result::Result<(), RevocationError>;

/// Resolves the revocation status of certificates for one validation pass.
pub struct RevocationResolver<'a> {
    latest: &'a DssIndex,
    older: &'a [DssIndex],
    verifier: &'a SignatureVerifier,
    policy: &'a AlgorithmPolicyChecker<'a>,
    events: &'a EventBus,
    options: &'a ValidationOptions,
    current_time: DateTime<Utc>,
    fetcher: Option<&'a dyn RevocationFetcher>,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> RevocationResolver<'a> {
    /// Resolver over the latest DSS index only.
    pub fn new(
        latest: &'a DssIndex,
        verifier: &'a SignatureVerifier,
        policy: &'a AlgorithmPolicyChecker<'a>,
        events: &'a EventBus,
        options: &'a ValidationOptions,
    ) -> Self {
        Self {
            latest,
            older: &[],
            verifier,
            policy,
            events,
            options,
            current_time: options.now(),
            fetcher: None,
            cancel: None,
        }
    }

    /// Also consult earlier DSS snapshots, newest first.
    pub fn with_older(mut self, older: &'a [DssIndex]) -> Self {
        self.older = older;
        self
    }

    /// Fetch live evidence through `fetcher` when options allow it.
    pub fn with_fetcher(mut self, fetcher: &'a dyn RevocationFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Skip network access once `token` is cancelled.
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Pin the time separating historical from current validation.
    pub fn with_current_time(mut self, now: DateTime<Utc>) -> Self {
        self.current_time = now;
        self
    }

    /// Find evidence for `certificate` issued by `issuer` at `validation_time`
    /// and report the outcome for that certificate.
    pub fn resolve(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        validation_time: DateTime<Utc>,
    ) -> RevocationEvidence {
        let evidence = self.lookup(certificate, issuer, validation_time, 0);
        self.report(certificate, &evidence, validation_time);
        evidence
    }

    fn report(&self, certificate: &Certificate, evidence: &RevocationEvidence, at: DateTime<Utc>) {
        let event = match evidence.status().at(at) {
            CertStatus::Good => ValidationEvent::CertificateChainValidationSuccess {
                certificate: certificate.summary(),
                inconclusive: evidence.is_inconclusive_at(at),
            },
            CertStatus::Revoked {
                reason,
                revocation_time,
            } => ValidationEvent::CertificateChainValidationFailure {
                certificate: certificate.summary(),
                reason: format!(
                    "revoked{} at {} according to {} {}",
                    reason.map(|r| format!(" ({})", r)).unwrap_or_default(),
                    revocation_time,
                    evidence.kind(),
                    evidence.source().map(|s| s.to_string()).unwrap_or_default(),
                ),
                inconclusive: false,
            },
            CertStatus::Unknown => ValidationEvent::CertificateChainValidationFailure {
                certificate: certificate.summary(),
                reason: match evidence {
                    RevocationEvidence::None => "no revocation evidence found".to_string(),
                    _ => format!("revocation status unknown per {}", evidence.kind()),
                },
                inconclusive: true,
            },
        };
        self.events.emit(event);
    }

    fn lookup(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        at: DateTime<Utc>,
        depth: usize,
    ) -> RevocationEvidence {
        if let Some(evidence) = self.latest_ocsp(certificate, issuer, at, depth) {
            log::debug!("{}: OCSP from latest DSS", certificate);
            return evidence;
        }
        if let Some(evidence) = self.latest_crl(certificate, issuer, at) {
            log::debug!("{}: CRL from latest DSS", certificate);
            return evidence;
        }
        if at < self.current_time {
            if let Some(evidence) = self.older_evidence(certificate, issuer, at, depth) {
                log::debug!("{}: {} from older DSS", certificate, evidence.kind());
                return evidence;
            }
        }
        if let Some(evidence) = self.live_evidence(certificate, issuer, at, depth) {
            log::debug!("{}: live {}", certificate, evidence.kind());
            return evidence;
        }
        log::info!("no revocation evidence for {} at {}", certificate, at);
        RevocationEvidence::None
    }

    fn latest_ocsp(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        at: DateTime<Utc>,
        depth: usize,
    ) -> Option<RevocationEvidence> {
        let earliest = at - self.options.freshness_tolerance;
        self.latest
            .ocsp_for(certificate)
            .into_iter()
            .filter(|response| response.produced_at() >= earliest)
            .filter_map(|response| {
                let single = self.single_for(&response, certificate, issuer)?;
                self.usable(self.check_ocsp(&response, issuer, at, depth), "OCSP response")
                    .then_some((response, single))
            })
            .max_by_key(|(response, _)| response.produced_at())
            .map(|(response, single)| ocsp_evidence(response, &single, EvidenceSource::FromLatestStore))
    }

    fn latest_crl(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        at: DateTime<Utc>,
    ) -> Option<RevocationEvidence> {
        self.latest
            .crls_for(issuer)
            .into_iter()
            .filter(|crl| crl.covers(at))
            .filter(|crl| self.usable(self.check_crl(crl, issuer), "CRL"))
            .max_by_key(|crl| crl.this_update())
            .map(|crl| crl_evidence(crl, certificate, EvidenceSource::FromLatestStore))
    }

    fn older_evidence(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        at: DateTime<Utc>,
        depth: usize,
    ) -> Option<RevocationEvidence> {
        let mut candidates: Vec<(bool, RevocationEvidence)> = Vec::new();
        for index in self.older {
            for response in index.ocsp_for(certificate) {
                let Some(single) = self.single_for(&response, certificate, issuer) else {
                    continue;
                };
                if self.usable(self.check_ocsp(&response, issuer, at, depth), "older OCSP response") {
                    let covers = single.covers(at);
                    candidates.push((
                        covers,
                        ocsp_evidence(response, &single, EvidenceSource::FromOlderStoreEntry),
                    ));
                }
            }
            for crl in index.crls_for(issuer) {
                if self.usable(self.check_crl(&crl, issuer), "older CRL") {
                    let covers = crl.covers(at);
                    candidates.push((
                        covers,
                        crl_evidence(crl, certificate, EvidenceSource::FromOlderStoreEntry),
                    ));
                }
            }
        }

        let (_, evidence) = candidates
            .into_iter()
            .max_by_key(|(covers, evidence)| (*covers, evidence.issued_at()))?;

        match &evidence {
            RevocationEvidence::Ocsp { response, .. } => {
                self.events.emit(ValidationEvent::OlderOcspResponseUsed {
                    certificate: certificate.summary(),
                    produced_at: response.produced_at(),
                });
            },
            RevocationEvidence::Crl { crl, .. } => {
                self.events.emit(ValidationEvent::OlderCrlResponseUsed {
                    certificate: certificate.summary(),
                    this_update: crl.this_update(),
                });
            },
            RevocationEvidence::None => {},
        }
        self.events.emit(ValidationEvent::RevocationNotFromDss {
            certificate: certificate.summary(),
            source: EvidenceSource::FromOlderStoreEntry,
        });
        Some(evidence)
    }

    fn live_evidence(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        at: DateTime<Utc>,
        depth: usize,
    ) -> Option<RevocationEvidence> {
        if !self.options.allow_live_fetch {
            return None;
        }
        let fetcher = self.fetcher?;
        if self.cancel.is_some_and(|token| token.is_cancelled()) {
            return None;
        }
        let timeout = self.options.fetch_timeout;
        let earliest = at - self.options.freshness_tolerance;

        if !certificate.ocsp_responders().is_empty() {
            self.events.emit(ValidationEvent::OcspRequest {
                certificate: certificate.summary(),
            });
            match fetcher.fetch_ocsp(certificate, issuer, timeout) {
                Ok(response) => {
                    let response = Arc::new(response);
                    let usable = response.produced_at() >= earliest
                        && self.usable(self.check_ocsp(&response, issuer, at, depth), "live OCSP response");
                    match self.single_for(&response, certificate, issuer) {
                        Some(single) if usable => {
                            return Some(self.fetched(
                                certificate,
                                ocsp_evidence(response, &single, EvidenceSource::FetchedLive),
                            ));
                        },
                        _ => log::debug!("live OCSP response for {} not usable", certificate),
                    }
                },
                Err(e) => log::debug!("OCSP fetch for {} failed: {}", certificate, e),
            }
        }

        for url in certificate.crl_distribution_points() {
            self.events.emit(ValidationEvent::CrlRequest {
                certificate: certificate.summary(),
                url: url.clone(),
            });
            match fetcher.fetch_crl(url, timeout) {
                Ok(crl) if crl.is_issued_by(issuer) => {
                    let crl = Arc::new(crl);
                    let timely = crl.covers(at) || crl.this_update() >= earliest;
                    if timely && self.usable(self.check_crl(&crl, issuer), "live CRL") {
                        return Some(self.fetched(
                            certificate,
                            crl_evidence(crl, certificate, EvidenceSource::FetchedLive),
                        ));
                    }
                    log::debug!("CRL from {} not usable at {}", url, at);
                },
                Ok(crl) => log::debug!("CRL from {} issued by {}, not {}", url, crl.issuer(), issuer),
                Err(e) => log::debug!("CRL fetch from {} failed: {}", url, e),
            }
        }
        None
    }

    fn fetched(&self, certificate: &Certificate, evidence: RevocationEvidence) -> RevocationEvidence {
        self.events.emit(ValidationEvent::RevocationNotFromDss {
            certificate: certificate.summary(),
            source: EvidenceSource::FetchedLive,
        });
        evidence
    }

    /// The single response about `certificate`, skipping Unknown answers.
    fn single_for(
        &self,
        response: &OcspResponse,
        certificate: &Certificate,
        issuer: &Certificate,
    ) -> Option<SingleResponse> {
        let single = response.find(certificate, issuer, self.verifier.crypto())?;
        if single.status == CertStatus::Unknown {
            log::debug!("OCSP responder does not know {}", certificate);
            return None;
        }
        Some(single.clone())
    }

    fn usable(&self, check: Usable, what: &str) -> bool {
        match check {
            Ok(()) => true,
            Err(e) => {
                log::debug!("{} rejected: {}", what, e);
                false
            },
        }
    }

    fn check_crl(&self, crl: &Crl, issuer: &Certificate) -> Usable {
        self.policy
            .check_identifier(crl.signature_algorithm(), UsageLocation::CrlSignature);
        let check = self.verifier.verify_signed(
            crl.tbs(),
            crl.signature_value(),
            crl.signature_algorithm(),
            None,
            issuer.public_key(),
            SignatureVerificationError::SignatureMismatch,
        );
        if check.is_valid() {
            Ok(())
        } else {
            Err(RevocationError::InvalidSignature)
        }
    }

    fn signed_by(&self, response: &OcspResponse, signer: &Certificate) -> bool {
        self.verifier
            .verify_signed(
                response.tbs(),
                response.signature_value(),
                response.signature_algorithm(),
                None,
                signer.public_key(),
                SignatureVerificationError::SignatureMismatch,
            )
            .is_valid()
    }

    fn check_ocsp(
        &self,
        response: &OcspResponse,
        issuer: &Certificate,
        at: DateTime<Utc>,
        depth: usize,
    ) -> Usable {
        self.policy
            .check_identifier(response.signature_algorithm(), UsageLocation::OcspSignature);
        if self.signed_by(response, issuer) {
            return Ok(());
        }

        let crypto = self.verifier.crypto();
        let candidates = response
            .certificates()
            .iter()
            .chain(self.latest.certificates())
            .filter(|candidate| response.is_responder(candidate, crypto));
        let mut unsigned = false;
        for responder in candidates {
            if !responder.is_issued_by(issuer) || !responder.is_ocsp_signer() {
                log::debug!("{} is not an OCSP signer delegated by {}", responder, issuer);
                continue;
            }
            if !self.verifier.verify_certificate(responder, issuer).is_valid() {
                log::debug!("responder {} not signed by {}", responder, issuer);
                continue;
            }
            if !responder.is_valid_at(response.produced_at()) {
                log::debug!("responder {} expired at {}", responder, response.produced_at());
                continue;
            }
            if !self.signed_by(response, responder) {
                log::debug!("response not signed by responder {}", responder);
                unsigned = true;
                continue;
            }
            if !responder.has_ocsp_no_check() {
                if depth >= self.options.max_responder_depth {
                    log::debug!("responder {} nested too deep to check", responder);
                    continue;
                }
                if self.lookup(responder, issuer, at, depth + 1).is_revoked_at(at) {
                    log::info!("delegated responder {} is revoked", responder);
                    continue;
                }
            }
            return Ok(());
        }

        if unsigned {
            return Err(RevocationError::InvalidSignature);
        }
        Err(RevocationError::UnauthorizedResponder(match response.responder_id() {
            ResponderId::ByName { name, .. } => name.clone(),
            ResponderId::ByKey(hash) => to_hex(hash),
        }))
    }
}

fn ocsp_evidence(
    response: Arc<OcspResponse>,
    single: &SingleResponse,
    source: EvidenceSource,
) -> RevocationEvidence {
    RevocationEvidence::Ocsp {
        status: single.status,
        this_update: single.this_update,
        next_update: single.next_update,
        response,
        source,
    }
}

fn crl_evidence(crl: Arc<Crl>, certificate: &Certificate, source: EvidenceSource) -> RevocationEvidence {
    RevocationEvidence::Crl {
        status: crl.status_of(certificate),
        crl,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::algorithms::AlgorithmPolicy;
    use crate::validation::certificate::OID_KP_OCSP_SIGNING;
    use crate::validation::dss::DssContents;
    use crate::validation::events::EventType;
    use crate::validation::testing::*;
    use crate::signatures::AlgorithmIdentifier;

    struct Fixture {
        root: Arc<Certificate>,
        leaf: Arc<Certificate>,
        verifier: SignatureVerifier,
        policy: AlgorithmPolicy,
        bus: EventBus,
        options: ValidationOptions,
    }

    fn fixture() -> Fixture {
        Fixture {
            root: issued("CN=Root", "CN=Root", 1),
            leaf: issued("CN=Leaf", "CN=Root", 2),
            verifier: SignatureVerifier::new(Arc::new(KeyedHashCrypto)),
            policy: AlgorithmPolicy::default(),
            bus: EventBus::new(),
            options: ValidationOptions::new().with_current_time(day(30)),
        }
    }

    fn resolve(f: &Fixture, latest: &DssIndex, older: &[DssIndex], at: DateTime<Utc>) -> RevocationEvidence {
        let checker = AlgorithmPolicyChecker::new(&f.policy, &f.bus);
        RevocationResolver::new(latest, &f.verifier, &checker, &f.bus, &f.options)
            .with_older(older)
            .resolve(&f.leaf, &f.root, at)
    }

    #[test]
    fn test_latest_ocsp_preferred_over_crl() {
        let f = fixture();
        let latest = DssIndex::from_contents(
            DssContents::new()
                .with_ocsp(ocsp(&f.leaf, &f.root, &f.root, day(10), CertStatus::Good))
                .with_crl(crl(&f.root, day(9), None, &[(&f.leaf, day(1))])),
        );
        let evidence = resolve(&f, &latest, &[], day(10));
        assert_eq!(evidence.kind(), "OCSP");
        assert_eq!(evidence.status(), CertStatus::Good);
        assert_eq!(evidence.source(), Some(EvidenceSource::FromLatestStore));
        assert_eq!(f.bus.count(EventType::CertificateChainValidationSuccess), 1);
    }

    #[test]
    fn test_stale_ocsp_falls_back_to_crl() {
        let f = fixture();
        let latest = DssIndex::from_contents(
            DssContents::new()
                .with_ocsp(ocsp(&f.leaf, &f.root, &f.root, day(2), CertStatus::Good))
                .with_crl(crl(&f.root, day(9), Some(day(20)), &[])),
        );
        let evidence = resolve(&f, &latest, &[], day(10));
        assert_eq!(evidence.kind(), "CRL");
        assert!(!evidence.is_inconclusive_at(day(10)));
    }

    #[test]
    fn test_bad_signature_is_not_usable() {
        let f = fixture();
        let stranger = issued("CN=Stranger", "CN=Stranger", 9);
        let latest = DssIndex::from_contents(
            DssContents::new().with_ocsp(ocsp(&f.leaf, &f.root, &stranger, day(10), CertStatus::Good)),
        );
        let evidence = resolve(&f, &latest, &[], day(10));
        assert_eq!(evidence, RevocationEvidence::None);
        assert_eq!(f.bus.count(EventType::CertificateChainValidationFailure), 1);
        assert!(f.bus.records().last().unwrap().event.is_inconclusive());
    }

    #[test]
    fn test_revocation_after_validation_time_is_good() {
        let f = fixture();
        let latest = DssIndex::from_contents(
            DssContents::new().with_crl(crl(&f.root, day(5), None, &[(&f.leaf, day(8))])),
        );
        let before = resolve(&f, &latest, &[], day(6));
        assert!(!before.is_revoked_at(day(6)));
        assert_eq!(f.bus.count(EventType::CertificateChainValidationSuccess), 1);

        let after = resolve(&f, &latest, &[], day(9));
        assert!(after.is_revoked_at(day(9)));
        assert!(!after.is_inconclusive_at(day(9)));
    }

    #[test]
    fn test_older_store_only_for_historical_time() {
        let f = fixture();
        let latest = DssIndex::empty();
        let older = vec![
            DssIndex::from_contents(DssContents::new().with_crl(crl(&f.root, day(3), Some(day(4)), &[]))),
            DssIndex::from_contents(DssContents::new().with_crl(crl(&f.root, day(1), Some(day(8)), &[]))),
        ];

        let evidence = resolve(&f, &latest, &older, day(5));
        assert_eq!(evidence.source(), Some(EvidenceSource::FromOlderStoreEntry));
        assert_eq!(evidence.issued_at(), Some(day(1)));
        assert!(evidence.is_inconclusive_at(day(5)));
        assert_eq!(f.bus.count(EventType::OlderCrlResponseUsed), 1);
        assert_eq!(f.bus.count(EventType::RevocationNotFromDss), 1);

        let now = resolve(&f, &latest, &older, day(30));
        assert_eq!(now, RevocationEvidence::None);
    }

    #[test]
    fn test_delegated_responder() {
        let f = fixture();
        let responder = {
            let tbs = b"tbs:responder".to_vec();
            let signature = sign(&key_of("CN=Root"), &tbs);
            Arc::new(
                Certificate::builder("CN=Responder", "CN=Root")
                    .serial(&[7])
                    .public_key(key_of("CN=Responder"), key_of("CN=Responder"))
                    .extended_key_usage(OID_KP_OCSP_SIGNING)
                    .ocsp_no_check(true)
                    .signature(tbs, AlgorithmIdentifier::from_oid(SHA256_WITH_RSA), signature)
                    .build(),
            )
        };
        let response = ocsp(&f.leaf, &f.root, &responder, day(10), CertStatus::Good);
        let with_cert = Arc::new(
            OcspResponse::builder(response.responder_id().clone(), response.produced_at())
                .response(response.responses()[0].clone())
                .certificate(Arc::clone(&responder))
                .signature(
                    response.tbs().to_vec(),
                    response.signature_algorithm().clone(),
                    response.signature_value().to_vec(),
                )
                .build(),
        );
        let latest = DssIndex::from_contents(DssContents::new().with_ocsp(with_cert));
        let evidence = resolve(&f, &latest, &[], day(10));
        assert_eq!(evidence.kind(), "OCSP");

        let no_eku = issued("CN=Responder", "CN=Root", 8);
        let rogue = ocsp(&f.leaf, &f.root, &no_eku, day(10), CertStatus::Good);
        let latest = DssIndex::from_contents(
            DssContents::new().with_ocsp(rogue).with_certificate(no_eku),
        );
        assert_eq!(resolve(&f, &latest, &[], day(10)), RevocationEvidence::None);
    }

    fn responder_with_key(serial: u8, key: &[u8]) -> Arc<Certificate> {
        let tbs = format!("tbs:responder:{}", serial).into_bytes();
        let signature = sign(&key_of("CN=Root"), &tbs);
        Arc::new(
            Certificate::builder("CN=Responder", "CN=Root")
                .serial(&[serial])
                .public_key(key.to_vec(), key.to_vec())
                .extended_key_usage(OID_KP_OCSP_SIGNING)
                .ocsp_no_check(true)
                .signature(tbs, AlgorithmIdentifier::from_oid(SHA256_WITH_RSA), signature)
                .build(),
        )
    }

    #[test]
    fn test_renewed_responder_is_found_among_same_name_certificates() {
        let f = fixture();
        let old = responder_with_key(7, b"old-key");
        let renewed = responder_with_key(8, b"new-key");
        let response = ocsp(&f.leaf, &f.root, &renewed, day(10), CertStatus::Good);

        let latest = DssIndex::from_contents(
            DssContents::new()
                .with_certificate(Arc::clone(&old))
                .with_certificate(Arc::clone(&renewed))
                .with_ocsp(Arc::clone(&response)),
        );
        let evidence = resolve(&f, &latest, &[], day(10));
        assert_eq!(evidence.kind(), "OCSP");
        assert_eq!(evidence.source(), Some(EvidenceSource::FromLatestStore));

        // Only the old certificate available: nobody signed the response
        let latest = DssIndex::from_contents(
            DssContents::new().with_certificate(old).with_ocsp(response),
        );
        assert_eq!(resolve(&f, &latest, &[], day(10)), RevocationEvidence::None);
    }

    #[test]
    fn test_live_fetch_disabled_by_default() {
        let f = fixture();
        let latest = DssIndex::empty();
        let checker = AlgorithmPolicyChecker::new(&f.policy, &f.bus);
        let fetcher = crate::validation::fetch::OfflineFetcher;
        let evidence = RevocationResolver::new(&latest, &f.verifier, &checker, &f.bus, &f.options)
            .with_fetcher(&fetcher)
            .resolve(&f.leaf, &f.root, day(10));
        assert_eq!(evidence, RevocationEvidence::None);
        assert_eq!(f.bus.count(EventType::OcspRequest), 0);
    }
}
