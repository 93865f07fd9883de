//! Revocation evidence and its provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::crl::Crl;
use super::ocsp::OcspResponse;

/// RFC 5280 CRL reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevocationReason {
    /// unspecified (0)
    Unspecified,
    /// keyCompromise (1)
    KeyCompromise,
    /// cACompromise (2)
    CaCompromise,
    /// affiliationChanged (3)
    AffiliationChanged,
    /// superseded (4)
    Superseded,
    /// cessationOfOperation (5)
    CessationOfOperation,
    /// certificateHold (6)
    CertificateHold,
    /// removeFromCRL (8)
    RemoveFromCrl,
    /// privilegeWithdrawn (9)
    PrivilegeWithdrawn,
    /// aACompromise (10)
    AaCompromise,
}

impl RevocationReason {
    /// Map a reason code; unknown codes become `Unspecified`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RevocationReason::KeyCompromise,
            2 => RevocationReason::CaCompromise,
            3 => RevocationReason::AffiliationChanged,
            4 => RevocationReason::Superseded,
            5 => RevocationReason::CessationOfOperation,
            6 => RevocationReason::CertificateHold,
            8 => RevocationReason::RemoveFromCrl,
            9 => RevocationReason::PrivilegeWithdrawn,
            10 => RevocationReason::AaCompromise,
            _ => RevocationReason::Unspecified,
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RevocationReason::Unspecified => "unspecified",
            RevocationReason::KeyCompromise => "keyCompromise",
            RevocationReason::CaCompromise => "cACompromise",
            RevocationReason::AffiliationChanged => "affiliationChanged",
            RevocationReason::Superseded => "superseded",
            RevocationReason::CessationOfOperation => "cessationOfOperation",
            RevocationReason::CertificateHold => "certificateHold",
            RevocationReason::RemoveFromCrl => "removeFromCRL",
            RevocationReason::PrivilegeWithdrawn => "privilegeWithdrawn",
            RevocationReason::AaCompromise => "aACompromise",
        };
        f.write_str(name)
    }
}

/// Status of one certificate according to one piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertStatus {
    /// Not revoked
    Good,
    /// Revoked at `revocation_time`
    Revoked {
        /// Reason code, if given
        reason: Option<RevocationReason>,
        /// When the revocation took effect
        revocation_time: DateTime<Utc>,
    },
    /// Responder does not know the certificate
    Unknown,
}

impl CertStatus {
    /// Status as of `time`: a revocation that happened later does not count yet.
    pub fn at(self, time: DateTime<Utc>) -> CertStatus {
        match self {
            CertStatus::Revoked {
                revocation_time, ..
            } if revocation_time > time => CertStatus::Good,
            other => other,
        }
    }
}

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceSource {
    /// The most recent document security store
    FromLatestStore,
    /// An earlier store snapshot
    FromOlderStoreEntry,
    /// Retrieved over the network during this run
    FetchedLive,
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceSource::FromLatestStore => write!(f, "latest DSS"),
            EvidenceSource::FromOlderStoreEntry => write!(f, "older DSS"),
            EvidenceSource::FetchedLive => write!(f, "live fetch"),
        }
    }
}

/// Outcome of a revocation lookup for one certificate.
#[derive(Debug, Clone, PartialEq)]
pub enum RevocationEvidence {
    /// Status taken from a CRL
    Crl {
        /// The CRL
        crl: Arc<Crl>,
        /// Status of the certificate in it
        status: CertStatus,
        /// Provenance
        source: EvidenceSource,
    },
    /// Status taken from an OCSP response
    Ocsp {
        /// The response
        response: Arc<OcspResponse>,
        /// Status of the certificate in it
        status: CertStatus,
        /// thisUpdate of the matching single response
        this_update: DateTime<Utc>,
        /// nextUpdate of the matching single response
        next_update: Option<DateTime<Utc>>,
        /// Provenance
        source: EvidenceSource,
    },
    /// Nothing usable was found
    None,
}

impl RevocationEvidence {
    /// Reported status; `None` evidence is `Unknown`.
    pub fn status(&self) -> CertStatus {
        match self {
            RevocationEvidence::Crl { status, .. } | RevocationEvidence::Ocsp { status, .. } => {
                *status
            },
            RevocationEvidence::None => CertStatus::Unknown,
        }
    }

    /// Provenance, absent for `None`.
    pub fn source(&self) -> Option<EvidenceSource> {
        match self {
            RevocationEvidence::Crl { source, .. } | RevocationEvidence::Ocsp { source, .. } => {
                Some(*source)
            },
            RevocationEvidence::None => None,
        }
    }

    /// thisUpdate (CRL) or producedAt (OCSP).
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RevocationEvidence::Crl { crl, .. } => Some(crl.this_update()),
            RevocationEvidence::Ocsp { response, .. } => Some(response.produced_at()),
            RevocationEvidence::None => None,
        }
    }

    /// nextUpdate, when the evidence carries one.
    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        match self {
            RevocationEvidence::Crl { crl, .. } => crl.next_update(),
            RevocationEvidence::Ocsp { next_update, .. } => *next_update,
            RevocationEvidence::None => None,
        }
    }

    /// Whether the evidence proves a revocation effective at `time`.
    pub fn is_revoked_at(&self, time: DateTime<Utc>) -> bool {
        matches!(self.status().at(time), CertStatus::Revoked { .. })
    }

    /// Whether this evidence leaves the status undecided at `time`.
    ///
    /// Unknown is always inconclusive. Good from an older snapshot is too,
    /// since a later revocation may be missing from it. A revocation is
    /// definite wherever it came from.
    pub fn is_inconclusive_at(&self, time: DateTime<Utc>) -> bool {
        match self.status().at(time) {
            CertStatus::Revoked { .. } => false,
            CertStatus::Unknown => true,
            CertStatus::Good => self.source() == Some(EvidenceSource::FromOlderStoreEntry),
        }
    }

    /// Short description for events.
    pub fn kind(&self) -> &'static str {
        match self {
            RevocationEvidence::Crl { .. } => "CRL",
            RevocationEvidence::Ocsp { .. } => "OCSP",
            RevocationEvidence::None => "none",
        }
    }
}
