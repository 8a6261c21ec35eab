//! Ledger Record
//!
//! Strongly-typed ledger entry and its canonical byte encoding. The
//! canonical blob is the one artifact every implementation must reproduce
//! bit-for-bit to agree on digests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

use crate::error::LedgerError;
use crate::ledger::columns::{self, ColumnMap};

/// Separator placed between canonical fields.
pub const FIELD_SEPARATOR: &str = "|";

/// Canonical field order of the base variant.
pub const BASE_FIELDS: [&str; 13] = [
    columns::UUID,
    columns::TIMESTAMP,
    columns::ACTOR,
    columns::EVENT_TYPE,
    columns::TEXT,
    columns::GIFT,
    columns::PREV_HASH,
    columns::STATUS,
    columns::PROVISION_IDS,
    columns::PROVISION_TITLES,
    columns::PROVISION_SNIPPETS,
    columns::PROVISION_URLS,
    columns::CITATION_HASH,
];

/// Canonical field order of the confidence variant.
pub const CONFIDENCE_FIELDS: [&str; 16] = [
    columns::UUID,
    columns::TIMESTAMP,
    columns::ACTOR,
    columns::EVENT_TYPE,
    columns::TEXT,
    columns::GIFT,
    columns::PREV_HASH,
    columns::STATUS,
    columns::PROVISION_IDS,
    columns::PROVISION_TITLES,
    columns::PROVISION_SNIPPETS,
    columns::PROVISION_URLS,
    columns::CITATION_HASH,
    columns::CONFIDENCE_LEVEL,
    columns::CONFIDENCE_UUID,
    columns::CONFIDENCE_JUSTIFICATION,
];

/// Column layout used when a record is rendered back into a storage row.
pub const STANDARD_HEADER: [&str; 17] = [
    columns::UUID,
    columns::TIMESTAMP,
    columns::ACTOR,
    columns::EVENT_TYPE,
    columns::TEXT,
    columns::GIFT,
    columns::PREV_HASH,
    columns::STATUS,
    columns::PROVISION_IDS,
    columns::PROVISION_TITLES,
    columns::PROVISION_SNIPPETS,
    columns::PROVISION_URLS,
    columns::CITATION_HASH,
    columns::CONFIDENCE_LEVEL,
    columns::CONFIDENCE_UUID,
    columns::CONFIDENCE_JUSTIFICATION,
    columns::RECORD_HASH,
];

/// Which canonical field layout a record hashes with.
///
/// Chosen per record: a record carrying a confidence block uses
/// [`FormatVariant::Confidence`], anything else [`FormatVariant::Base`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatVariant {
    Base,
    Confidence,
}

impl FormatVariant {
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::Base => &BASE_FIELDS,
            Self::Confidence => &CONFIDENCE_FIELDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Draft,
    Final,
    Verified,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Final => "FINAL",
            Self::Verified => "VERIFIED",
            Self::Error => "ERROR",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "FINAL" => Ok(Self::Final),
            "VERIFIED" => Ok(Self::Verified),
            "ERROR" => Ok(Self::Error),
            other => Err(LedgerError::FormatError(format!(
                "unknown record status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    KnownKnown,
    KnownUnknown,
    UnknownUnknown,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnownKnown => "KNOWN_KNOWN",
            Self::KnownUnknown => "KNOWN_UNKNOWN",
            Self::UnknownUnknown => "UNKNOWN_UNKNOWN",
        }
    }
}

impl FromStr for ConfidenceLevel {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KNOWN_KNOWN" => Ok(Self::KnownKnown),
            "KNOWN_UNKNOWN" => Ok(Self::KnownUnknown),
            "UNKNOWN_UNKNOWN" => Ok(Self::UnknownUnknown),
            other => Err(LedgerError::FormatError(format!(
                "unknown confidence level '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBlock {
    pub level: ConfidenceLevel,
    pub uuid: String,
    pub justification: String,
}

/// One ledger entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub uuid: String,
    pub timestamp: String,
    pub actor: String,
    pub event_type: String,
    pub text: String,
    pub gift: String,
    pub prev_hash: String,
    pub status: Option<RecordStatus>,
    pub provision_ids: String,
    pub provision_titles: String,
    pub provision_snippets: String,
    pub provision_urls: String,
    pub citation_hash: String,
    pub confidence: Option<ConfidenceBlock>,
    pub record_hash: String,
}

impl LedgerRecord {
    pub fn new(uuid: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            timestamp: timestamp.into(),
            ..Default::default()
        }
    }

    /// Decode a storage row. `row_number` is only used in error messages.
    ///
    /// Cell values are kept verbatim (no trimming) since they feed the
    /// digest. Only an empty status cell means "no status"; whitespace is
    /// not a status and is rejected.
    pub fn from_row(
        columns: &ColumnMap,
        row: &[String],
        row_number: usize,
    ) -> Result<Self, LedgerError> {
        let cell = |name: &str| columns.cell(row, name).to_string();

        let uuid = cell(columns::UUID);
        if uuid.trim().is_empty() {
            return Err(LedgerError::missing_field(columns::UUID, row_number));
        }
        let timestamp = cell(columns::TIMESTAMP);
        if timestamp.trim().is_empty() {
            return Err(LedgerError::missing_field(columns::TIMESTAMP, row_number));
        }

        let status = match columns.cell(row, columns::STATUS) {
            "" => None,
            s => Some(s.parse::<RecordStatus>()?),
        };

        let confidence = match columns.cell(row, columns::CONFIDENCE_LEVEL) {
            level if level.trim().is_empty() => None,
            level => Some(ConfidenceBlock {
                level: level.parse()?,
                uuid: cell(columns::CONFIDENCE_UUID),
                justification: cell(columns::CONFIDENCE_JUSTIFICATION),
            }),
        };

        Ok(Self {
            uuid,
            timestamp,
            actor: cell(columns::ACTOR),
            event_type: cell(columns::EVENT_TYPE),
            text: cell(columns::TEXT),
            gift: cell(columns::GIFT),
            prev_hash: cell(columns::PREV_HASH),
            status,
            provision_ids: cell(columns::PROVISION_IDS),
            provision_titles: cell(columns::PROVISION_TITLES),
            provision_snippets: cell(columns::PROVISION_SNIPPETS),
            provision_urls: cell(columns::PROVISION_URLS),
            citation_hash: cell(columns::CITATION_HASH),
            confidence,
            record_hash: cell(columns::RECORD_HASH),
        })
    }

    /// Render the record as a row laid out per [`STANDARD_HEADER`].
    pub fn to_row(&self) -> Vec<String> {
        let mut row: Vec<String> = self
            .canonical_fields()
            .into_iter()
            .map(str::to_string)
            .collect();
        if self.confidence.is_none() {
            row.extend([String::new(), String::new(), String::new()]);
        }
        row.push(self.record_hash.clone());
        row
    }

    pub fn variant(&self) -> FormatVariant {
        if self.confidence.is_some() {
            FormatVariant::Confidence
        } else {
            FormatVariant::Base
        }
    }

    /// Field values in canonical order for this record's variant.
    pub fn canonical_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.uuid.as_str(),
            self.timestamp.as_str(),
            self.actor.as_str(),
            self.event_type.as_str(),
            self.text.as_str(),
            self.gift.as_str(),
            self.prev_hash.as_str(),
            self.status.as_ref().map(RecordStatus::as_str).unwrap_or(""),
            self.provision_ids.as_str(),
            self.provision_titles.as_str(),
            self.provision_snippets.as_str(),
            self.provision_urls.as_str(),
            self.citation_hash.as_str(),
        ];
        if let Some(confidence) = &self.confidence {
            fields.extend([
                confidence.level.as_str(),
                confidence.uuid.as_str(),
                confidence.justification.as_str(),
            ]);
        }
        fields
    }

    /// Joined canonical string, before normalization.
    pub fn canonical_string(&self) -> String {
        self.canonical_fields().join(FIELD_SEPARATOR)
    }

    /// NFKD-normalized canonical blob fed to the hasher.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_string().nfkd().collect::<String>().into_bytes()
    }
}

impl fmt::Display for LedgerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.event_type, self.uuid, self.timestamp)
    }
}
