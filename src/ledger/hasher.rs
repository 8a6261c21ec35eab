//! Chain Hasher
//!
//! Computes a record's keyed digest: SHA-256 over the secret followed
//! directly by the NFKD-normalized canonical blob, rendered as 64 lowercase
//! hex characters.
//!
//! The key is applied by prefix concatenation, not by HMAC. Plain
//! `SHA-256(secret || message)` is open to length-extension forgeries; the
//! construction is kept as-is because existing chains were sealed with it
//! and any change would invalidate every stored `record_hash`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;
use crate::ledger::record::LedgerRecord;
use crate::ledger::secret::LedgerSecret;

/// Length of a rendered digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Whether a verification run could recompute digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestMode {
    /// Secret available: continuity and self-consistency were both checked.
    Keyed,
    /// No secret: only `prev_hash` linkage was checked.
    ContinuityOnly,
}

impl DigestMode {
    pub fn for_secret(secret: Option<&LedgerSecret>) -> Self {
        if secret.is_some() {
            Self::Keyed
        } else {
            Self::ContinuityOnly
        }
    }

    /// Fail unless digests were actually recomputed.
    pub fn require_keyed(&self) -> Result<(), LedgerError> {
        match self {
            Self::Keyed => Ok(()),
            Self::ContinuityOnly => Err(LedgerError::SecretUnavailable(
                "no hashing secret was provided; only continuity was checked".to_string(),
            )),
        }
    }
}

pub struct ChainHasher;

impl ChainHasher {
    /// Digest of `record` under `secret`. Pure and deterministic.
    pub fn digest(record: &LedgerRecord, secret: &LedgerSecret) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(record.canonical_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the stored `record_hash` matches a fresh digest.
    pub fn verify(record: &LedgerRecord, secret: &LedgerSecret) -> bool {
        record.record_hash == Self::digest(record, secret)
    }

    /// Fill in `record_hash` for a record whose `prev_hash` is already set.
    pub fn seal(mut record: LedgerRecord, secret: &LedgerSecret) -> LedgerRecord {
        record.record_hash = Self::digest(&record, secret);
        record
    }

    /// Link and seal records in order: the first gets an empty `prev_hash`,
    /// every later one the previous record's digest.
    pub fn link<I>(records: I, secret: &LedgerSecret) -> Vec<LedgerRecord>
    where
        I: IntoIterator<Item = LedgerRecord>,
    {
        let mut chain: Vec<LedgerRecord> = Vec::new();
        for mut record in records {
            record.prev_hash = chain
                .last()
                .map(|prev| prev.record_hash.clone())
                .unwrap_or_default();
            chain.push(Self::seal(record, secret));
        }
        chain
    }
}
