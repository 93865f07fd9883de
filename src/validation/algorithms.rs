//! Algorithm policy checking.
//!
//! Every digest or signature algorithm observed during a validation pass is
//! looked up in an [`AlgorithmPolicy`]: two allow-lists (digest and signature
//! algorithms) keyed by OID, with a fallback on the algorithm name. The
//! default policy follows ETSI TS 119 312. A policy is plain configuration
//! handed to the checker, so each run may carry its own.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use super::events::{EventBus, ValidationEvent};
use crate::error::PolicyViolation;
use crate::signatures::AlgorithmIdentifier;

lazy_static::lazy_static! {
    /// Well-known algorithm OIDs and their display names.
    static ref ALGORITHM_NAMES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        // Digests
        m.insert("1.2.840.113549.2.5", "MD5");
        m.insert("1.3.14.3.2.26", "SHA-1");
        m.insert("2.16.840.1.101.3.4.2.4", "SHA-224");
        m.insert("2.16.840.1.101.3.4.2.1", "SHA-256");
        m.insert("2.16.840.1.101.3.4.2.2", "SHA-384");
        m.insert("2.16.840.1.101.3.4.2.3", "SHA-512");
        m.insert("2.16.840.1.101.3.4.2.8", "SHA3-256");
        m.insert("2.16.840.1.101.3.4.2.9", "SHA3-384");
        m.insert("2.16.840.1.101.3.4.2.10", "SHA3-512");
        // RSA
        m.insert("1.2.840.113549.1.1.1", "RSA");
        m.insert("1.2.840.113549.1.1.4", "MD5withRSA");
        m.insert("1.2.840.113549.1.1.5", "SHA1withRSA");
        m.insert("1.2.840.113549.1.1.14", "SHA224withRSA");
        m.insert("1.2.840.113549.1.1.11", "SHA256withRSA");
        m.insert("1.2.840.113549.1.1.12", "SHA384withRSA");
        m.insert("1.2.840.113549.1.1.13", "SHA512withRSA");
        m.insert("1.2.840.113549.1.1.10", "RSASSA-PSS");
        // ECDSA / EdDSA
        m.insert("1.2.840.10045.2.1", "EC");
        m.insert("1.2.840.10045.4.1", "SHA1withECDSA");
        m.insert("1.2.840.10045.4.3.1", "SHA224withECDSA");
        m.insert("1.2.840.10045.4.3.2", "SHA256withECDSA");
        m.insert("1.2.840.10045.4.3.3", "SHA384withECDSA");
        m.insert("1.2.840.10045.4.3.4", "SHA512withECDSA");
        m.insert("1.3.101.112", "Ed25519");
        m.insert("1.3.101.113", "Ed448");
        // DSA
        m.insert("1.2.840.10040.4.3", "SHA1withDSA");
        m.insert("2.16.840.1.101.3.4.3.2", "SHA256withDSA");
        m
    };

    static ref ETSI_DIGESTS: Vec<&'static str> = vec![
        "2.16.840.1.101.3.4.2.1",
        "2.16.840.1.101.3.4.2.2",
        "2.16.840.1.101.3.4.2.3",
        "2.16.840.1.101.3.4.2.8",
        "2.16.840.1.101.3.4.2.9",
        "2.16.840.1.101.3.4.2.10",
    ];

    static ref ETSI_SIGNATURES: Vec<&'static str> = vec![
        "1.2.840.113549.1.1.1",
        "1.2.840.113549.1.1.11",
        "1.2.840.113549.1.1.12",
        "1.2.840.113549.1.1.13",
        "1.2.840.113549.1.1.10",
        "1.2.840.10045.2.1",
        "1.2.840.10045.4.3.2",
        "1.2.840.10045.4.3.3",
        "1.2.840.10045.4.3.4",
        "1.3.101.112",
        "1.3.101.113",
    ];
}

/// Display name of a well-known algorithm OID.
pub fn algorithm_name(oid: &str) -> Option<&'static str> {
    ALGORITHM_NAMES.get(oid).copied()
}

fn policy_entry(oid: &str) -> (String, String) {
    (oid.to_string(), algorithm_name(oid).unwrap_or(oid).to_string())
}

/// Where an algorithm was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageLocation {
    /// Digest over the signed byte ranges
    SignerDigest,
    /// Signer signature algorithm
    SignerSignature,
    /// Certificate signature in the chain
    CertificateSignature,
    /// CRL signature
    CrlSignature,
    /// OCSP response signature
    OcspSignature,
    /// Hash of a timestamp message imprint
    TimestampImprint,
}

impl UsageLocation {
    /// Whether the algorithm at this location is a plain digest.
    pub fn is_digest(&self) -> bool {
        matches!(self, UsageLocation::SignerDigest | UsageLocation::TimestampImprint)
    }
}

impl fmt::Display for UsageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UsageLocation::SignerDigest => "signer digest",
            UsageLocation::SignerSignature => "signer signature",
            UsageLocation::CertificateSignature => "certificate signature",
            UsageLocation::CrlSignature => "CRL signature",
            UsageLocation::OcspSignature => "OCSP signature",
            UsageLocation::TimestampImprint => "timestamp imprint",
        };
        f.write_str(s)
    }
}

/// One observed algorithm and the policy decision about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmUsage {
    /// Algorithm name
    pub name: String,
    /// Dotted OID
    pub oid: String,
    /// Where it was used
    pub location: UsageLocation,
    /// Whether the policy allows it
    pub allowed: bool,
}

/// What a disallowed algorithm does to the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlgorithmPolicyMode {
    /// Record the usage only
    #[default]
    Advisory,
    /// A disallowed algorithm fails the signature
    Enforce,
}

/// Digest and signature allow-lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmPolicy {
    digests: IndexMap<String, String>,
    signatures: IndexMap<String, String>,
}

impl Default for AlgorithmPolicy {
    fn default() -> Self {
        Self::etsi_ts_119_312()
    }
}

impl AlgorithmPolicy {
    /// Policy that allows nothing.
    pub fn empty() -> Self {
        Self {
            digests: IndexMap::new(),
            signatures: IndexMap::new(),
        }
    }

    /// ETSI TS 119 312 recommended algorithms: SHA-2/SHA-3 digests, RSA
    /// PKCS#1 v1.5 and PSS, ECDSA and EdDSA with SHA-2.
    pub fn etsi_ts_119_312() -> Self {
        Self {
            digests: ETSI_DIGESTS.iter().map(|oid| policy_entry(oid)).collect(),
            signatures: ETSI_SIGNATURES.iter().map(|oid| policy_entry(oid)).collect(),
        }
    }

    /// Also allow a digest algorithm.
    pub fn with_digest(mut self, oid: impl Into<String>, name: impl Into<String>) -> Self {
        self.digests.insert(oid.into(), name.into());
        self
    }

    /// Also allow a signature algorithm.
    pub fn with_signature(mut self, oid: impl Into<String>, name: impl Into<String>) -> Self {
        self.signatures.insert(oid.into(), name.into());
        self
    }

    /// Remove an algorithm from both lists.
    pub fn without(mut self, oid: &str) -> Self {
        self.digests.shift_remove(oid);
        self.signatures.shift_remove(oid);
        self
    }

    /// Pure lookup: OID first, then name (case-insensitive).
    pub fn evaluate(&self, name: &str, oid: &str, location: UsageLocation) -> AlgorithmUsage {
        let list = if location.is_digest() {
            &self.digests
        } else {
            &self.signatures
        };
        let allowed = if !oid.is_empty() && list.contains_key(oid) {
            true
        } else {
            !name.is_empty() && list.values().any(|known| known.eq_ignore_ascii_case(name))
        };
        AlgorithmUsage {
            name: name.to_string(),
            oid: oid.to_string(),
            location,
            allowed,
        }
    }
}

/// Applies a policy and records decisions on the event bus.
///
/// One checker lives for one validation pass; each distinct algorithm and
/// location is reported once.
pub struct AlgorithmPolicyChecker<'a> {
    policy: &'a AlgorithmPolicy,
    events: &'a EventBus,
    seen: Mutex<Vec<AlgorithmUsage>>,
}

impl<'a> AlgorithmPolicyChecker<'a> {
    /// Create a checker reporting to `events`.
    pub fn new(policy: &'a AlgorithmPolicy, events: &'a EventBus) -> Self {
        Self {
            policy,
            events,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Check one algorithm; never fails and emits `AlgorithmUsage` on first sight.
    pub fn check(&self, name: &str, oid: &str, location: UsageLocation) -> AlgorithmUsage {
        let usage = self.policy.evaluate(name, oid, location);
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !seen.contains(&usage) {
            if !usage.allowed {
                log::info!("algorithm {} ({}) not allowed for {}", name, oid, location);
            }
            seen.push(usage.clone());
            self.events.emit(ValidationEvent::AlgorithmUsage(usage.clone()));
        }
        usage
    }

    /// Check an algorithm identifier.
    pub fn check_identifier(
        &self,
        algorithm: &AlgorithmIdentifier,
        location: UsageLocation,
    ) -> AlgorithmUsage {
        self.check(&algorithm.name, &algorithm.oid, location)
    }

    /// Disallowed algorithms observed so far.
    pub fn violations(&self) -> Vec<PolicyViolation> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|usage| !usage.allowed)
            .map(|usage| PolicyViolation {
                name: usage.name.clone(),
                oid: usage.oid.clone(),
                location: usage.location.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(algorithm_name("2.16.840.1.101.3.4.2.1"), Some("SHA-256"));
        assert_eq!(algorithm_name("1.2.840.113549.1.1.11"), Some("SHA256withRSA"));
        assert_eq!(algorithm_name("9.9.9"), None);
    }

    #[test]
    fn test_etsi_default() {
        let policy = AlgorithmPolicy::default();
        assert!(policy.evaluate("SHA-256", "2.16.840.1.101.3.4.2.1", UsageLocation::SignerDigest).allowed);
        assert!(!policy.evaluate("SHA-1", "1.3.14.3.2.26", UsageLocation::SignerDigest).allowed);
        assert!(!policy.evaluate("MD5", "1.2.840.113549.2.5", UsageLocation::SignerDigest).allowed);
        assert!(policy
            .evaluate("SHA256withRSA", "1.2.840.113549.1.1.11", UsageLocation::CertificateSignature)
            .allowed);
        assert!(!policy
            .evaluate("SHA1withRSA", "1.2.840.113549.1.1.5", UsageLocation::CertificateSignature)
            .allowed);
    }

    #[test]
    fn test_lists_are_separate() {
        let policy = AlgorithmPolicy::default();
        // A signature OID is not an allowed digest
        assert!(!policy
            .evaluate("SHA256withRSA", "1.2.840.113549.1.1.11", UsageLocation::SignerDigest)
            .allowed);
    }

    #[test]
    fn test_name_fallback() {
        let policy = AlgorithmPolicy::default();
        assert!(policy.evaluate("sha-384", "", UsageLocation::SignerDigest).allowed);
        assert!(!policy.evaluate("", "", UsageLocation::SignerDigest).allowed);
    }

    #[test]
    fn test_unknown_oid_not_allowed() {
        let policy = AlgorithmPolicy::default();
        let usage = policy.evaluate("1.2.3.4.5", "1.2.3.4.5", UsageLocation::SignerSignature);
        assert!(!usage.allowed);
    }

    #[test]
    fn test_overrides() {
        let policy = AlgorithmPolicy::default()
            .with_digest("1.3.14.3.2.26", "SHA-1")
            .without("2.16.840.1.101.3.4.2.1");
        assert!(policy.evaluate("SHA-1", "1.3.14.3.2.26", UsageLocation::SignerDigest).allowed);
        assert!(!policy.evaluate("SHA-256", "2.16.840.1.101.3.4.2.1", UsageLocation::SignerDigest).allowed);
        assert!(!AlgorithmPolicy::empty()
            .evaluate("SHA-256", "2.16.840.1.101.3.4.2.1", UsageLocation::SignerDigest)
            .allowed);
    }

    #[test]
    fn test_checker_emits_usage() {
        let bus = EventBus::new();
        let policy = AlgorithmPolicy::default();
        let checker = AlgorithmPolicyChecker::new(&policy, &bus);
        let usage = checker.check("X", "1.2.3", UsageLocation::SignerSignature);
        assert!(!usage.allowed);
        let records = bus.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, ValidationEvent::AlgorithmUsage(usage));
    }

    #[test]
    fn test_checker_reports_each_algorithm_once() {
        let bus = EventBus::new();
        let policy = AlgorithmPolicy::default();
        let checker = AlgorithmPolicyChecker::new(&policy, &bus);
        let sha1 = AlgorithmIdentifier::from_oid("1.2.840.113549.1.1.5");
        checker.check_identifier(&sha1, UsageLocation::CertificateSignature);
        checker.check_identifier(&sha1, UsageLocation::CertificateSignature);
        checker.check_identifier(&sha1, UsageLocation::CrlSignature);
        assert_eq!(bus.len(), 2);

        let violations = checker.violations();
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].name, "SHA1withRSA");
        assert_eq!(violations[0].location, "certificate signature");
    }
}
