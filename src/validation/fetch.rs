//! Network access for revocation data and issuer certificates.
//!
//! The validation core never opens sockets itself. Everything goes through
//! [`RevocationFetcher`], and any error simply means the evidence is
//! unavailable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::certificate::Certificate;
use super::crl::Crl;
use super::ocsp::OcspResponse;
use crate::error::FetchError;

/// Outcome of one fetch.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Retrieves revocation evidence and certificates from the network.
pub trait RevocationFetcher: Send + Sync {
    /// Ask the OCSP responder of `certificate` about its status.
    fn fetch_ocsp(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        timeout: Duration,
    ) -> FetchResult<OcspResponse>;

    /// Download a CRL from a distribution point.
    fn fetch_crl(&self, url: &str, timeout: Duration) -> FetchResult<Crl>;

    /// Download an issuer certificate from an AIA caIssuers URL.
    fn fetch_issuer_certificate(&self, url: &str, timeout: Duration) -> FetchResult<Certificate>;
}

impl<F: RevocationFetcher + ?Sized> RevocationFetcher for Arc<F> {
    fn fetch_ocsp(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        timeout: Duration,
    ) -> FetchResult<OcspResponse> {
        (**self).fetch_ocsp(certificate, issuer, timeout)
    }

    fn fetch_crl(&self, url: &str, timeout: Duration) -> FetchResult<Crl> {
        (**self).fetch_crl(url, timeout)
    }

    fn fetch_issuer_certificate(&self, url: &str, timeout: Duration) -> FetchResult<Certificate> {
        (**self).fetch_issuer_certificate(url, timeout)
    }
}

/// Fetcher for air-gapped validation: every call reports `Disabled`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl RevocationFetcher for OfflineFetcher {
    fn fetch_ocsp(&self, _: &Certificate, _: &Certificate, _: Duration) -> FetchResult<OcspResponse> {
        Err(FetchError::Disabled)
    }

    fn fetch_crl(&self, _: &str, _: Duration) -> FetchResult<Crl> {
        Err(FetchError::Disabled)
    }

    fn fetch_issuer_certificate(&self, _: &str, _: Duration) -> FetchResult<Certificate> {
        Err(FetchError::Disabled)
    }
}

/// Wraps a fetcher and retries once after a transient failure.
///
/// `NotFound`, `Unauthorized` and the other permanent errors are returned
/// as they are.
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
}

impl<F: RevocationFetcher> RetryingFetcher<F> {
    /// Wrap `inner`.
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    /// The wrapped fetcher.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn with_retry<T>(&self, what: &str, mut call: impl FnMut() -> FetchResult<T>) -> FetchResult<T> {
        match call() {
            Err(e) if e.is_transient() => {
                log::debug!("transient failure fetching {}, retrying once: {}", what, e);
                call()
            },
            other => other,
        }
    }
}

impl<F: RevocationFetcher> RevocationFetcher for RetryingFetcher<F> {
    fn fetch_ocsp(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        timeout: Duration,
    ) -> FetchResult<OcspResponse> {
        self.with_retry("OCSP response", || self.inner.fetch_ocsp(certificate, issuer, timeout))
    }

    fn fetch_crl(&self, url: &str, timeout: Duration) -> FetchResult<Crl> {
        self.with_retry(url, || self.inner.fetch_crl(url, timeout))
    }

    fn fetch_issuer_certificate(&self, url: &str, timeout: Duration) -> FetchResult<Certificate> {
        self.with_retry(url, || self.inner.fetch_issuer_certificate(url, timeout))
    }
}

/// Cooperative cancellation flag shared between a caller and running validations.
///
/// A token is cancelled when its own flag is set or when any token it was
/// derived from with [`child`](Self::child) is cancelled. Cancelling a child
/// never affects its parent.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    parents: Vec<CancellationToken>,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new token that also observes cancellation of `self`.
    pub fn child(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parents: vec![self.clone()],
        }
    }

    /// A new token cancelled by either `self` or `other`.
    pub(crate) fn linked(&self, other: &CancellationToken) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parents: vec![self.clone(), other.clone()],
        }
    }

    /// Request cancellation; all clones and children observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.parents.iter().any(|p| p.is_cancelled())
    }
}
