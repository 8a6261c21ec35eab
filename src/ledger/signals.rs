//! Signal Scanner
//!
//! Extracts bracketed anomaly tags such as `[VOID_DETECTED]` from record
//! text. The vocabulary is closed; bracketed tokens outside it are ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::LedgerError;
use crate::ledger::columns::{self, ColumnMap};
use crate::ledger::record::LedgerRecord;
use crate::ledger::source::{RowSource, FIRST_DATA_ROW};

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = SignalType::ALL
        .iter()
        .map(SignalType::as_str)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\[({})\]", alternatives)).expect("signal tag pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    VoidDetected,
    Unfalsifiable,
    Parked,
    RiskAccepted,
    SchismCritical,
    AdversarialSuspicion,
    SystemHalt,
    Fatal,
    CascadeFailure,
    ArtificialSterility,
}

impl SignalType {
    pub const ALL: [SignalType; 10] = [
        Self::VoidDetected,
        Self::Unfalsifiable,
        Self::Parked,
        Self::RiskAccepted,
        Self::SchismCritical,
        Self::AdversarialSuspicion,
        Self::SystemHalt,
        Self::Fatal,
        Self::CascadeFailure,
        Self::ArtificialSterility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VoidDetected => "VOID_DETECTED",
            Self::Unfalsifiable => "UNFALSIFIABLE",
            Self::Parked => "PARKED",
            Self::RiskAccepted => "RISK_ACCEPTED",
            Self::SchismCritical => "SCHISM_CRITICAL",
            Self::AdversarialSuspicion => "ADVERSARIAL_SUSPICION",
            Self::SystemHalt => "SYSTEM_HALT",
            Self::Fatal => "FATAL",
            Self::CascadeFailure => "CASCADE_FAILURE",
            Self::ArtificialSterility => "ARTIFICIAL_STERILITY",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| LedgerError::FormatError(format!("unknown signal tag '{}'", s)))
    }
}

/// A tag found in a ledger record's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub record_uuid: String,
    pub signal_type: SignalType,
    /// Storage row the record occupies.
    pub row: usize,
    /// Byte offset of the opening bracket within `text`.
    pub offset: usize,
}

/// Tags in `text`, in order of appearance, repeats included.
pub fn scan(text: &str) -> impl Iterator<Item = SignalType> + '_ {
    scan_with_offsets(text).map(|(signal_type, _)| signal_type)
}

/// Like [`scan`], paired with each tag's byte offset.
pub fn scan_with_offsets(text: &str) -> impl Iterator<Item = (SignalType, usize)> + '_ {
    TAG_PATTERN.captures_iter(text).filter_map(|captures| {
        let whole = captures.get(0)?;
        let signal_type = captures.get(1)?.as_str().parse().ok()?;
        Some((signal_type, whole.start()))
    })
}

/// Signals carried by a record stored at `row`.
pub fn scan_record(record: &LedgerRecord, row: usize) -> Vec<Signal> {
    scan_text(&record.uuid, &record.text, row)
}

/// Signals for raw cell values, used when a row cannot be decoded.
pub fn scan_text(record_uuid: &str, text: &str, row: usize) -> Vec<Signal> {
    scan_with_offsets(text)
        .map(|(signal_type, offset)| Signal {
            record_uuid: record_uuid.to_string(),
            signal_type,
            row,
            offset,
        })
        .collect()
}

/// Signals across a whole row source, read `chunk_size` rows at a time.
///
/// Rows are scanned from their raw cells, so rows that would not decode
/// into records still contribute their tags.
pub fn scan_source<S: RowSource>(source: &S, chunk_size: usize) -> Result<Vec<Signal>, LedgerError> {
    if chunk_size == 0 {
        return Err(LedgerError::InvalidArgument(
            "chunk size must be at least 1".to_string(),
        ));
    }

    let columns = ColumnMap::from_header(&source.header()?)?;
    let total_rows = source.total_row_count()?;
    let mut found = Vec::new();
    let mut cursor = FIRST_DATA_ROW;

    while cursor <= total_rows {
        let rows = source.rows(cursor, chunk_size)?;
        if rows.is_empty() {
            break;
        }
        for (offset, row) in rows.iter().enumerate() {
            found.extend(scan_text(
                columns.cell(row, columns::UUID),
                columns.cell(row, columns::TEXT),
                cursor + offset,
            ));
        }
        cursor += rows.len();
    }

    Ok(found)
}
