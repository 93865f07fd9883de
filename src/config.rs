//! Configuration for signature validation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::validation::{AlgorithmPolicy, AlgorithmPolicyMode, Certificate};

/// Options for one validation run.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Maximum number of certificates in a chain, signer included.
    pub max_chain_depth: usize,

    /// How far before the validation time an OCSP response (or a freshly
    /// fetched CRL) may have been produced and still count as current.
    pub freshness_tolerance: TimeDelta,

    /// Allow network retrieval of issuers and revocation data.
    pub allow_live_fetch: bool,

    /// Allowed digest and signature algorithms.
    pub algorithm_policy: AlgorithmPolicy,

    /// Whether disallowed algorithms fail the signature.
    pub algorithm_policy_mode: AlgorithmPolicyMode,

    /// Certificates that terminate a chain. When empty, any self-signed
    /// root is accepted as the end of the chain.
    pub trust_anchors: Vec<Arc<Certificate>>,

    /// Fixed validation time, overriding timestamps and claimed times.
    pub validation_time: Option<DateTime<Utc>>,

    /// "Now" for this run; the system clock when unset.
    pub current_time: Option<DateTime<Utc>>,

    /// Per-call network timeout.
    pub fetch_timeout: Duration,

    /// Capacity of streaming subscriber queues.
    pub event_queue_capacity: usize,

    /// How deep delegated OCSP responder certificates are themselves checked.
    pub max_responder_depth: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self {
            max_chain_depth: 10,
            freshness_tolerance: TimeDelta::days(1),
            allow_live_fetch: false,
            algorithm_policy: AlgorithmPolicy::default(),
            algorithm_policy_mode: AlgorithmPolicyMode::Advisory,
            trust_anchors: Vec::new(),
            validation_time: None,
            current_time: None,
            fetch_timeout: Duration::from_secs(10),
            event_queue_capacity: 256,
            max_responder_depth: 2,
        }
    }

    /// Options that reject disallowed algorithms.
    pub fn strict() -> Self {
        Self::new().with_algorithm_policy_mode(AlgorithmPolicyMode::Enforce)
    }

    /// Set the maximum chain depth.
    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    /// Set the OCSP/CRL freshness tolerance.
    pub fn with_freshness_tolerance(mut self, tolerance: TimeDelta) -> Self {
        self.freshness_tolerance = tolerance;
        self
    }

    /// Enable or disable live fetching.
    pub fn with_live_fetch(mut self, enable: bool) -> Self {
        self.allow_live_fetch = enable;
        self
    }

    /// Replace the algorithm policy.
    pub fn with_algorithm_policy(mut self, policy: AlgorithmPolicy) -> Self {
        self.algorithm_policy = policy;
        self
    }

    /// Set the algorithm policy mode.
    pub fn with_algorithm_policy_mode(mut self, mode: AlgorithmPolicyMode) -> Self {
        self.algorithm_policy_mode = mode;
        self
    }

    /// Add a trust anchor.
    pub fn with_trust_anchor(mut self, anchor: Arc<Certificate>) -> Self {
        self.trust_anchors.push(anchor);
        self
    }

    /// Validate at a fixed time.
    pub fn with_validation_time(mut self, time: DateTime<Utc>) -> Self {
        self.validation_time = Some(time);
        self
    }

    /// Pin "now".
    pub fn with_current_time(mut self, time: DateTime<Utc>) -> Self {
        self.current_time = Some(time);
        self
    }

    /// Set the per-call fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the streaming queue capacity.
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Set how deep delegated responders are checked.
    pub fn with_max_responder_depth(mut self, depth: usize) -> Self {
        self.max_responder_depth = depth;
        self
    }

    /// `current_time`, or the system clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.current_time.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let options = ValidationOptions::default();
        assert_eq!(options.max_chain_depth, 10);
        assert!(!options.allow_live_fetch);
        assert_eq!(options.algorithm_policy_mode, AlgorithmPolicyMode::Advisory);
        assert!(options.trust_anchors.is_empty());
        assert_eq!(options.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_strict_enforces_policy() {
        assert_eq!(ValidationOptions::strict().algorithm_policy_mode, AlgorithmPolicyMode::Enforce);
    }

    #[test]
    fn test_builders_and_pinned_now() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let options = ValidationOptions::new()
            .with_max_chain_depth(4)
            .with_live_fetch(true)
            .with_current_time(now)
            .with_event_queue_capacity(8);
        assert_eq!(options.max_chain_depth, 4);
        assert!(options.allow_live_fetch);
        assert_eq!(options.now(), now);
        assert_eq!(options.event_queue_capacity, 8);
    }
}
