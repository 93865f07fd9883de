//! Certificate chain construction.
//!
//! Starting from the signer certificate the builder repeatedly looks up the
//! issuer of the chain's tail until it reaches a self-signed certificate or
//! a configured trust anchor. Issuers are searched in this order:
//!
//! 1. configured trust anchors
//! 2. the latest DSS index
//! 3. certificates embedded in the signature container, then older DSS
//!    snapshots (`CertificateIssuerRetrievedOutsideDss`)
//! 4. AIA caIssuers URLs, when a fetcher is configured
//!    (`CertificateIssuerExternalRetrieval` per attempt)
//!
//! The walk is a bounded loop: at most `max_depth` issuer lookups happen
//! before the chain is either complete or rejected as too long. The lookup
//! made once the chain already holds `max_depth` certificates only consults
//! local sources; the chain is too long whatever it finds.

use std::sync::Arc;
use std::time::Duration;

use super::certificate::Certificate;
use super::dss::DssIndex;
use super::events::{EventBus, ValidationEvent};
use super::fetch::{CancellationToken, RevocationFetcher};
use crate::error::ChainError;

/// Where issuer certificates may be found.
#[derive(Debug, Clone, Copy)]
pub struct IssuerSources<'a> {
    /// Configured trust anchors
    pub trust_anchors: &'a [Arc<Certificate>],
    /// Latest DSS snapshot
    pub latest: &'a DssIndex,
    /// Earlier DSS snapshots, newest first
    pub older: &'a [DssIndex],
    /// Certificates shipped in the signature container
    pub embedded: &'a [Arc<Certificate>],
}

/// Ordered chain, signer first and root last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<Arc<Certificate>>,
}

impl CertificateChain {
    /// The signer certificate.
    pub fn signer(&self) -> &Arc<Certificate> {
        &self.certificates[0]
    }

    /// The terminal certificate (self-signed root or trust anchor).
    pub fn root(&self) -> &Arc<Certificate> {
        &self.certificates[self.certificates.len() - 1]
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Always false; a chain holds at least its signer.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// All certificates, signer first.
    pub fn certificates(&self) -> &[Arc<Certificate>] {
        &self.certificates
    }

    /// `(certificate, issuer)` pairs from the signer upwards.
    pub fn links(&self) -> impl Iterator<Item = (&Arc<Certificate>, &Arc<Certificate>)> + '_ {
        self.certificates.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}

/// Whether `cert` is one of `anchors`.
pub fn is_trust_anchor(cert: &Certificate, anchors: &[Arc<Certificate>]) -> bool {
    anchors.iter().any(|anchor| {
        anchor.subject_raw() == cert.subject_raw() && anchor.public_key() == cert.public_key()
    })
}

/// Walks issuer links for one signature.
pub struct ChainBuilder<'a> {
    sources: IssuerSources<'a>,
    events: &'a EventBus,
    fetcher: Option<&'a dyn RevocationFetcher>,
    fetch_timeout: Duration,
    cancel: Option<&'a CancellationToken>,
    lookups: usize,
}

impl<'a> ChainBuilder<'a> {
    /// Builder over `sources` reporting to `events`; no network access.
    pub fn new(sources: IssuerSources<'a>, events: &'a EventBus) -> Self {
        Self {
            sources,
            events,
            fetcher: None,
            fetch_timeout: Duration::from_secs(10),
            cancel: None,
            lookups: 0,
        }
    }

    /// Allow AIA retrieval through `fetcher`.
    pub fn with_fetcher(mut self, fetcher: &'a dyn RevocationFetcher, timeout: Duration) -> Self {
        self.fetcher = Some(fetcher);
        self.fetch_timeout = timeout;
        self
    }

    /// Stop walking when `token` is cancelled.
    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Issuer lookups performed so far.
    pub fn lookups(&self) -> usize {
        self.lookups
    }

    /// Build the chain of `signer`, holding at most `max_depth` certificates.
    pub fn build_chain(
        &mut self,
        signer: Arc<Certificate>,
        max_depth: usize,
    ) -> Result<CertificateChain, ChainError> {
        if max_depth == 0 {
            return Err(ChainError::TooLong { max_depth });
        }

        let mut chain = vec![signer];
        loop {
            if self.cancel.is_some_and(|token| token.is_cancelled()) {
                return Err(ChainError::Cancelled);
            }

            let tail = Arc::clone(&chain[chain.len() - 1]);
            if tail.is_self_signed() || is_trust_anchor(&tail, self.sources.trust_anchors) {
                log::debug!("chain of {} certificates ends at {}", chain.len(), tail);
                return Ok(CertificateChain {
                    certificates: chain,
                });
            }

            // A full chain still counts the lookup but never goes to the network
            let full = chain.len() >= max_depth;
            let issuer = self.find_issuer(&tail, !full);
            if full {
                return Err(ChainError::TooLong { max_depth });
            }
            let issuer = issuer.ok_or_else(|| ChainError::IssuerUnresolvable {
                certificate: tail.summary(),
            })?;

            if chain
                .iter()
                .any(|known| known.same_identity(&issuer) || **known == *issuer)
            {
                return Err(ChainError::CycleDetected {
                    certificate: issuer.summary(),
                });
            }
            chain.push(issuer);
        }
    }

    fn find_issuer(&mut self, cert: &Certificate, allow_fetch: bool) -> Option<Arc<Certificate>> {
        self.lookups += 1;

        if let Some(anchor) = self
            .sources
            .trust_anchors
            .iter()
            .find(|anchor| cert.is_issued_by(anchor))
        {
            return Some(Arc::clone(anchor));
        }

        if let Some(issuer) = self.sources.latest.issuers_of(cert).into_iter().next() {
            return Some(issuer);
        }

        if let Some(issuer) = self
            .sources
            .embedded
            .iter()
            .find(|candidate| cert.is_issued_by(candidate))
        {
            self.retrieved_outside_dss(cert, issuer, "signature container");
            return Some(Arc::clone(issuer));
        }

        for older in self.sources.older {
            if let Some(issuer) = older.issuers_of(cert).into_iter().next() {
                self.retrieved_outside_dss(cert, &issuer, "older DSS");
                return Some(issuer);
            }
        }

        if !allow_fetch {
            log::debug!("chain already at maximum depth; not fetching the issuer of {}", cert);
            return None;
        }
        self.fetch_issuer(cert)
    }

    fn retrieved_outside_dss(&self, cert: &Certificate, issuer: &Certificate, source: &str) {
        log::debug!("issuer of {} found in {}", cert, source);
        self.events.emit(ValidationEvent::CertificateIssuerRetrievedOutsideDss {
            certificate: cert.summary(),
            issuer: issuer.summary(),
            source: source.to_string(),
        });
    }

    fn fetch_issuer(&self, cert: &Certificate) -> Option<Arc<Certificate>> {
        let fetcher = self.fetcher?;
        for url in cert.ca_issuers() {
            self.events.emit(ValidationEvent::CertificateIssuerExternalRetrieval {
                certificate: cert.summary(),
                url: url.clone(),
            });
            match fetcher.fetch_issuer_certificate(url, self.fetch_timeout) {
                Ok(candidate) if cert.is_issued_by(&candidate) => return Some(Arc::new(candidate)),
                Ok(candidate) => {
                    log::debug!("certificate from {} ({}) did not issue {}", url, candidate, cert)
                },
                Err(e) => log::debug!("issuer fetch from {} failed: {}", url, e),
            }
        }
        None
    }
}
