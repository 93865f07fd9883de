//! Integration tests for streaming validation events to a subscriber.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use pdf_ltv::validation::{CertStatus, DssContents};
use pdf_ltv::{
    Error, EventStream, EventType, InMemoryDocument, RevocationStore, ValidationOptions, Validator,
};

fn signed_document() -> (InMemoryDocument, ValidationOptions) {
    let (root, intermediate, signer) = three_level_chain();
    let dss = DssContents::new()
        .with_certificate(Arc::clone(&intermediate))
        .with_ocsp(ocsp(&signer, &intermediate, &intermediate, day(10), CertStatus::Good))
        .with_ocsp(ocsp(&intermediate, &root, &root, day(10), CertStatus::Good));
    let document = InMemoryDocument::new()
        .with_signature(signature("Signature1", &signer, day(10), &[]))
        .with_latest_store(RevocationStore::Decoded(dss));
    let options = ValidationOptions::new()
        .with_trust_anchor(root)
        .with_current_time(day(40));
    (document, options)
}

#[test]
fn test_stream_delivers_events_in_order() {
    init_logging();
    let (document, options) = signed_document();
    let validator = validator(document, options);
    let stream = validator.event_stream();

    let consumer = {
        let stream = stream.clone();
        thread::spawn(move || stream.iter().collect::<Vec<_>>())
    };
    let report = validator.validate_streaming("Signature1", &stream).unwrap();
    let received = consumer.join().unwrap();

    assert!(report.verdict.is_success(), "{:?}", report.verdict);
    assert_eq!(received, report.events);
    assert!(stream.is_closed());
    assert_eq!(stream.dropped(), 0);
    for (position, record) in received.iter().enumerate() {
        assert_eq!(record.sequence, position as u64);
    }
}

#[test]
fn test_slow_consumer_loses_oldest_events() {
    let (document, options) = signed_document();
    let validator = validator(document, options.with_event_queue_capacity(2));
    let stream = validator.event_stream();

    let report = validator.validate_streaming("Signature1", &stream).unwrap();

    let total = report.events.len();
    assert!(total > 2);
    assert_eq!(stream.dropped(), (total - 2) as u64);
    let kept: Vec<_> = stream.iter().collect();
    assert_eq!(kept, report.events[total - 2..].to_vec());
    assert_eq!(kept[1].event.event_type(), EventType::SignatureValidationSuccess);
    // The report keeps everything regardless
    assert_eq!(report.events[0].event.event_type(), EventType::SignatureValidationStarted);
}

#[test]
fn test_stream_closed_when_signature_missing() {
    let (document, options) = signed_document();
    let validator = validator(document, options);
    let stream = validator.event_stream();

    let result = validator.validate_streaming("Signature9", &stream);

    assert!(matches!(result, Err(Error::SignatureNotFound(ref name)) if name == "Signature9"));
    assert!(stream.is_closed());
    assert!(stream.recv().is_none());
}

#[test]
fn test_recv_timeout_on_idle_stream() {
    let stream = EventStream::bounded(4);
    assert!(stream.recv_timeout(Duration::from_millis(10)).is_none());
    assert!(!stream.is_closed());
    stream.close();
    assert!(stream.recv().is_none());
}

#[test]
fn test_one_stream_per_validation() {
    let (document, options) = signed_document();
    let validator = Validator::new(Arc::new(document), options)
        .with_crypto(Arc::new(KeyedHashCrypto));

    let first = validator.event_stream();
    let second = validator.event_stream();
    let report_a = validator.validate_streaming("Signature1", &first).unwrap();
    let report_b = validator.validate_streaming("Signature1", &second).unwrap();

    let a: Vec<_> = first.iter().map(|r| r.event).collect();
    let b: Vec<_> = second.iter().map(|r| r.event).collect();
    assert_eq!(a, b);
    assert_eq!(a.len(), report_a.events.len());
    assert_ne!(report_a.run_id, report_b.run_id);
}
