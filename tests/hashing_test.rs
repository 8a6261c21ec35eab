//! Record hashing tests

use ledger_verify::ledger::record::{BASE_FIELDS, CONFIDENCE_FIELDS};
use ledger_verify::ledger::{
    ChainHasher, ConfidenceBlock, ConfidenceLevel, FormatVariant, LedgerRecord, LedgerSecret,
};
use sha2::{Digest, Sha256};

mod common;
use common::*;

#[test]
fn test_digest_is_deterministic() {
    let record = create_test_record(4);
    let secret = test_secret();
    assert_eq!(
        ChainHasher::digest(&record, &secret),
        ChainHasher::digest(&record, &secret)
    );
}

#[test]
fn test_known_digest_vector() {
    let record = LedgerRecord::new("00000000-0000-0000-0000-000000000001", "2024-01-01T00:00:00Z");
    let secret = LedgerSecret::new("x").unwrap();

    let blob = "x00000000-0000-0000-0000-000000000001|2024-01-01T00:00:00Z|||||||||||";
    let expected = hex::encode(Sha256::digest(blob.as_bytes()));

    assert_eq!(ChainHasher::digest(&record, &secret), expected);
}

#[test]
fn test_variant_sensitivity() {
    let base = create_test_record(0);
    assert_eq!(base.variant(), FormatVariant::Base);

    let mut with_confidence = base.clone();
    with_confidence.confidence = Some(ConfidenceBlock {
        level: ConfidenceLevel::UnknownUnknown,
        uuid: String::new(),
        justification: String::new(),
    });
    assert_eq!(with_confidence.variant(), FormatVariant::Confidence);

    let secret = test_secret();
    assert_ne!(
        ChainHasher::digest(&base, &secret),
        ChainHasher::digest(&with_confidence, &secret)
    );
    assert_eq!(base.canonical_fields().len(), BASE_FIELDS.len());
    assert_eq!(with_confidence.canonical_fields().len(), CONFIDENCE_FIELDS.len());
}

#[test]
fn test_normalization_equivalence() {
    let secret = test_secret();
    let mut precomposed = create_test_record(1);
    precomposed.text = "Na\u{ef}ve r\u{e9}sum\u{e9}".to_string();
    let mut decomposed = precomposed.clone();
    decomposed.text = "Nai\u{308}ve re\u{301}sume\u{301}".to_string();

    assert_eq!(
        ChainHasher::digest(&precomposed, &secret),
        ChainHasher::digest(&decomposed, &secret)
    );
}

#[test]
fn test_compatibility_forms_normalize() {
    // NFKD folds compatibility characters such as the "fi" ligature.
    let secret = test_secret();
    let mut ligature = create_test_record(1);
    ligature.text = "\u{fb01}nal".to_string();
    let mut plain = ligature.clone();
    plain.text = "final".to_string();

    assert_eq!(
        ChainHasher::digest(&ligature, &secret),
        ChainHasher::digest(&plain, &secret)
    );
}

#[test]
fn test_every_hashed_field_matters() {
    let secret = test_secret();
    let original = create_test_record(2);
    let digest = ChainHasher::digest(&original, &secret);

    let edits: Vec<fn(&mut LedgerRecord)> = vec![
        |r| r.uuid.push('0'),
        |r| r.timestamp.push('0'),
        |r| r.actor.push('0'),
        |r| r.event_type.push('0'),
        |r| r.text.push('0'),
        |r| r.gift.push('0'),
        |r| r.prev_hash.push('0'),
        |r| r.status = None,
        |r| r.provision_ids.push('0'),
        |r| r.provision_titles.push('0'),
        |r| r.provision_snippets.push('0'),
        |r| r.provision_urls.push('0'),
        |r| r.citation_hash.push('0'),
        |r| {
            if let Some(c) = r.confidence.as_mut() {
                c.justification.push('0');
            }
        },
    ];

    for (i, edit) in edits.iter().enumerate() {
        let mut changed = original.clone();
        edit(&mut changed);
        assert_ne!(ChainHasher::digest(&changed, &secret), digest, "edit {}", i);
    }
}
