#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use ledger_verify::ledger::record::STANDARD_HEADER;
use ledger_verify::ledger::{
    ChainHasher, ConfidenceBlock, ConfidenceLevel, LedgerRecord, LedgerSecret, MemoryRowSource,
    RecordStatus,
};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

pub const TEST_SECRET: &str = "x";

pub fn test_secret() -> LedgerSecret {
    LedgerSecret::new(TEST_SECRET).expect("test secret is not blank")
}

/// Unsealed record `index` of a test ledger. Every third record carries a
/// confidence block so chains mix both format variants.
pub fn create_test_record(index: usize) -> LedgerRecord {
    let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
        + Duration::minutes(index as i64);

    let confidence = (index % 3 == 2).then(|| ConfidenceBlock {
        level: ConfidenceLevel::KnownUnknown,
        uuid: Uuid::new_v4().to_string(),
        justification: format!("assessment {}", index),
    });

    LedgerRecord {
        actor: "auditor@example.org".to_string(),
        event_type: "OBSERVATION".to_string(),
        text: format!("Observation number {}", index),
        gift: if index % 2 == 0 { String::new() } else { "meta".to_string() },
        status: Some(RecordStatus::Final),
        provision_ids: format!("P-{}", index),
        confidence,
        ..LedgerRecord::new(Uuid::new_v4().to_string(), timestamp.to_rfc3339())
    }
}

/// Valid, sealed chain of `count` records.
pub fn create_test_chain(count: usize) -> Vec<LedgerRecord> {
    ChainHasher::link((0..count).map(create_test_record), &test_secret())
}

pub fn create_test_source(count: usize) -> (Vec<LedgerRecord>, MemoryRowSource) {
    let chain = create_test_chain(count);
    let source = MemoryRowSource::from_records(&chain);
    (chain, source)
}

/// Storage cell index of a named column in the standard layout.
pub fn column_index(name: &str) -> usize {
    STANDARD_HEADER
        .iter()
        .position(|column| *column == name)
        .expect("column is part of the standard header")
}

/// Write records as a JSON-lines ledger file.
pub fn write_jsonl_ledger(path: &Path, records: &[LedgerRecord]) {
    let mut file = std::fs::File::create(path).expect("create ledger file");
    writeln!(file, "{}", serde_json::to_string(&STANDARD_HEADER).unwrap()).unwrap();
    for record in records {
        writeln!(file, "{}", serde_json::to_string(&record.to_row()).unwrap()).unwrap();
    }
}
