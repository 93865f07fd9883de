//! Validation events and the audit bus.
//!
//! Everything the validator concludes is reported as a [`ValidationEvent`].
//! Events are immutable, timestamped when emitted, and carry snapshots
//! ([`CertificateSummary`]) instead of references into the document.
//!
//! The [`EventBus`] keeps every record of a run in emission order. Callers
//! wanting incremental delivery attach an [`EventStream`]: a bounded queue
//! that drops the oldest undelivered record when full, so a slow consumer
//! never blocks validation. [`EventStream::dropped`] reports how many
//! records a consumer missed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::algorithms::AlgorithmUsage;
use super::certificate::CertificateSummary;
use super::evidence::EvidenceSource;

/// Discriminant of [`ValidationEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    /// Validation of a signature started
    SignatureValidationStarted,
    /// Signature validated
    SignatureValidationSuccess,
    /// Signature failed validation
    SignatureValidationFailure,
    /// A certificate of the chain validated
    CertificateChainValidationSuccess,
    /// A certificate of the chain failed validation
    CertificateChainValidationFailure,
    /// Issuer found outside the latest DSS
    CertificateIssuerRetrievedOutsideDss,
    /// Issuer fetched through AIA
    CertificateIssuerExternalRetrieval,
    /// DSS indexed
    DssEntryProcessed,
    /// OCSP from an older DSS snapshot used
    OlderOcspResponseUsed,
    /// CRL from an older DSS snapshot used
    OlderCrlResponseUsed,
    /// Revocation evidence not taken from the latest DSS
    RevocationNotFromDss,
    /// Live OCSP request issued
    OcspRequest,
    /// Live CRL request issued
    CrlRequest,
    /// Timestamp token found
    ProofOfExistenceFound,
    /// Algorithm observed
    AlgorithmUsage,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One validation event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ValidationEvent {
    /// Validation of `signature` started
    SignatureValidationStarted {
        /// Signature field name
        signature: String,
        /// Claimed signing time (/M or CMS signing-time)
        claimed_signing_time: Option<DateTime<Utc>>,
    },
    /// Final verdict: success
    SignatureValidationSuccess {
        /// Signature field name
        signature: String,
    },
    /// Final verdict: failure
    SignatureValidationFailure {
        /// Signature field name
        signature: String,
        /// Why
        reason: String,
        /// Could not prove validity or invalidity
        inconclusive: bool,
    },
    /// A certificate passed validation
    CertificateChainValidationSuccess {
        /// The certificate
        certificate: CertificateSummary,
        /// Whether the evidence behind it was inconclusive
        inconclusive: bool,
    },
    /// A certificate failed validation
    CertificateChainValidationFailure {
        /// The certificate
        certificate: CertificateSummary,
        /// Why
        reason: String,
        /// Could not prove validity or invalidity
        inconclusive: bool,
    },
    /// Issuer taken from a document source other than the latest DSS
    CertificateIssuerRetrievedOutsideDss {
        /// Certificate whose issuer was found
        certificate: CertificateSummary,
        /// The issuer
        issuer: CertificateSummary,
        /// Which source
        source: String,
    },
    /// An AIA caIssuers fetch was attempted
    CertificateIssuerExternalRetrieval {
        /// Certificate whose issuer is fetched
        certificate: CertificateSummary,
        /// AIA URL
        url: String,
    },
    /// The latest DSS was indexed
    DssEntryProcessed {
        /// Certificates indexed
        certificates: usize,
        /// CRLs indexed
        crls: usize,
        /// OCSP responses indexed
        ocsp_responses: usize,
        /// Entries skipped as corrupt
        skipped: usize,
    },
    /// Older OCSP evidence used
    OlderOcspResponseUsed {
        /// Certificate checked
        certificate: CertificateSummary,
        /// producedAt of the response
        produced_at: DateTime<Utc>,
    },
    /// Older CRL evidence used
    OlderCrlResponseUsed {
        /// Certificate checked
        certificate: CertificateSummary,
        /// thisUpdate of the CRL
        this_update: DateTime<Utc>,
    },
    /// Evidence came from somewhere other than the latest DSS
    RevocationNotFromDss {
        /// Certificate checked
        certificate: CertificateSummary,
        /// Where it came from
        source: EvidenceSource,
    },
    /// A live OCSP request is about to be issued
    OcspRequest {
        /// Certificate checked
        certificate: CertificateSummary,
    },
    /// A live CRL request is about to be issued
    CrlRequest {
        /// Certificate checked
        certificate: CertificateSummary,
        /// Distribution point URL
        url: String,
    },
    /// A timestamp token proves existence at `time`
    ProofOfExistenceFound {
        /// Signature field name
        signature: String,
        /// genTime of the token
        time: DateTime<Utc>,
    },
    /// An algorithm was observed
    AlgorithmUsage(AlgorithmUsage),
}

impl ValidationEvent {
    /// Type tag.
    pub fn event_type(&self) -> EventType {
        match self {
            ValidationEvent::SignatureValidationStarted { .. } => {
                EventType::SignatureValidationStarted
            },
            ValidationEvent::SignatureValidationSuccess { .. } => {
                EventType::SignatureValidationSuccess
            },
            ValidationEvent::SignatureValidationFailure { .. } => {
                EventType::SignatureValidationFailure
            },
            ValidationEvent::CertificateChainValidationSuccess { .. } => {
                EventType::CertificateChainValidationSuccess
            },
            ValidationEvent::CertificateChainValidationFailure { .. } => {
                EventType::CertificateChainValidationFailure
            },
            ValidationEvent::CertificateIssuerRetrievedOutsideDss { .. } => {
                EventType::CertificateIssuerRetrievedOutsideDss
            },
            ValidationEvent::CertificateIssuerExternalRetrieval { .. } => {
                EventType::CertificateIssuerExternalRetrieval
            },
            ValidationEvent::DssEntryProcessed { .. } => EventType::DssEntryProcessed,
            ValidationEvent::OlderOcspResponseUsed { .. } => EventType::OlderOcspResponseUsed,
            ValidationEvent::OlderCrlResponseUsed { .. } => EventType::OlderCrlResponseUsed,
            ValidationEvent::RevocationNotFromDss { .. } => EventType::RevocationNotFromDss,
            ValidationEvent::OcspRequest { .. } => EventType::OcspRequest,
            ValidationEvent::CrlRequest { .. } => EventType::CrlRequest,
            ValidationEvent::ProofOfExistenceFound { .. } => EventType::ProofOfExistenceFound,
            ValidationEvent::AlgorithmUsage(_) => EventType::AlgorithmUsage,
        }
    }

    /// Certificate the event is about, if any.
    pub fn certificate(&self) -> Option<&CertificateSummary> {
        match self {
            ValidationEvent::CertificateChainValidationSuccess { certificate, .. }
            | ValidationEvent::CertificateChainValidationFailure { certificate, .. }
            | ValidationEvent::CertificateIssuerRetrievedOutsideDss { certificate, .. }
            | ValidationEvent::CertificateIssuerExternalRetrieval { certificate, .. }
            | ValidationEvent::OlderOcspResponseUsed { certificate, .. }
            | ValidationEvent::OlderCrlResponseUsed { certificate, .. }
            | ValidationEvent::RevocationNotFromDss { certificate, .. }
            | ValidationEvent::OcspRequest { certificate }
            | ValidationEvent::CrlRequest { certificate, .. } => Some(certificate),
            _ => None,
        }
    }

    /// Whether the event carries an inconclusive flag that is set.
    pub fn is_inconclusive(&self) -> bool {
        match self {
            ValidationEvent::SignatureValidationFailure { inconclusive, .. }
            | ValidationEvent::CertificateChainValidationSuccess { inconclusive, .. }
            | ValidationEvent::CertificateChainValidationFailure { inconclusive, .. } => {
                *inconclusive
            },
            _ => false,
        }
    }
}

/// An event with its emission time and position in the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Position in emission order, starting at 0
    pub sequence: u64,
    /// When it was emitted
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: ValidationEvent,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Append-only collector for one validation run.
#[derive(Debug, Default)]
pub struct EventBus {
    records: Mutex<Vec<EventRecord>>,
    subscribers: Mutex<Vec<EventStream>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every future record to `stream` as well.
    pub fn subscribe(&self, stream: EventStream) {
        lock(&self.subscribers).push(stream);
    }

    /// Record an event.
    pub fn emit(&self, event: ValidationEvent) {
        let mut records = lock(&self.records);
        let record = EventRecord {
            sequence: records.len() as u64,
            timestamp: Utc::now(),
            event,
        };
        for stream in lock(&self.subscribers).iter() {
            stream.push(record.clone());
        }
        records.push(record);
    }

    /// Re-emit records collected elsewhere, keeping their timestamps.
    pub fn replay(&self, records: &[EventRecord]) {
        let mut own = lock(&self.records);
        for record in records {
            let record = EventRecord {
                sequence: own.len() as u64,
                timestamp: record.timestamp,
                event: record.event.clone(),
            };
            for stream in lock(&self.subscribers).iter() {
                stream.push(record.clone());
            }
            own.push(record);
        }
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<EventRecord> {
        lock(&self.records).clone()
    }

    /// Number of records so far.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    /// Whether nothing was emitted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records of one type.
    pub fn count(&self, event_type: EventType) -> usize {
        lock(&self.records)
            .iter()
            .filter(|r| r.event.event_type() == event_type)
            .count()
    }

    /// Close all subscribed streams and return the records.
    pub fn finish(self) -> Vec<EventRecord> {
        for stream in lock(&self.subscribers).iter() {
            stream.close();
        }
        self.records.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
struct StreamState {
    queue: VecDeque<EventRecord>,
    dropped: u64,
    closed: bool,
}

#[derive(Debug)]
struct StreamShared {
    state: Mutex<StreamState>,
    ready: Condvar,
    capacity: usize,
}

/// Bounded, drop-oldest event queue for a streaming subscriber.
///
/// Clones share the same queue: the bus pushes into one handle while the
/// consumer receives from another, usually on a different thread.
#[derive(Debug, Clone)]
pub struct EventStream {
    shared: Arc<StreamShared>,
}

impl EventStream {
    /// Create a stream holding at most `capacity` undelivered records.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            shared: Arc::new(StreamShared {
                state: Mutex::new(StreamState {
                    queue: VecDeque::with_capacity(capacity.max(1)),
                    dropped: 0,
                    closed: false,
                }),
                ready: Condvar::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    fn push(&self, record: EventRecord) {
        let mut state = lock(&self.shared.state);
        if state.closed {
            return;
        }
        if state.queue.len() == self.shared.capacity {
            state.queue.pop_front();
            state.dropped += 1;
        }
        state.queue.push_back(record);
        self.shared.ready.notify_one();
    }

    /// Mark the end of the run; receivers drain what is left, then get `None`.
    pub fn close(&self) {
        lock(&self.shared.state).closed = true;
        self.shared.ready.notify_all();
    }

    /// Block until a record is available or the stream is closed and drained.
    pub fn recv(&self) -> Option<EventRecord> {
        let mut state = lock(&self.shared.state);
        loop {
            if let Some(record) = state.queue.pop_front() {
                return Some(record);
            }
            if state.closed {
                return None;
            }
            state = self
                .shared
                .ready
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Wait at most `timeout` for a record.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EventRecord> {
        let state = lock(&self.shared.state);
        let (mut state, _) = self
            .shared
            .ready
            .wait_timeout_while(state, timeout, |s| s.queue.is_empty() && !s.closed)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.queue.pop_front()
    }

    /// Take a record if one is queued.
    pub fn try_recv(&self) -> Option<EventRecord> {
        lock(&self.shared.state).queue.pop_front()
    }

    /// Records discarded because the consumer fell behind.
    pub fn dropped(&self) -> u64 {
        lock(&self.shared.state).dropped
    }

    /// Whether the producer has finished.
    pub fn is_closed(&self) -> bool {
        lock(&self.shared.state).closed
    }

    /// Blocking iterator until the stream closes.
    pub fn iter(&self) -> impl Iterator<Item = EventRecord> + '_ {
        std::iter::from_fn(move || self.recv())
    }
}
