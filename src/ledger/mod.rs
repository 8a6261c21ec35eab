//! Ledger Integrity Engine
//!
//! Hash-chain verification for tamper-evident, append-only audit ledgers:
//! canonical record encoding, keyed digests, resumable chunked chain
//! verification, and anomaly signal extraction.

pub mod columns;
pub mod hasher;
pub mod record;
pub mod report;
pub mod secret;
pub mod session;
pub mod signals;
pub mod source;
pub mod verifier;

pub use columns::ColumnMap;
pub use hasher::{ChainHasher, DigestMode};
pub use record::{ConfidenceBlock, ConfidenceLevel, FormatVariant, LedgerRecord, RecordStatus};
pub use report::{BrokenLink, ChunkResult, DigestMismatch, MalformedRow, VerificationReport};
pub use secret::{EnvSecretProvider, LedgerSecret, SecretProvider, StaticSecretProvider};
pub use session::{SessionState, VerificationSession};
pub use signals::{scan, Signal, SignalType};
pub use source::{JsonlRowSource, MemoryRowSource, RowSource, FIRST_DATA_ROW, HEADER_ROW};
pub use verifier::ChunkedVerifier;
