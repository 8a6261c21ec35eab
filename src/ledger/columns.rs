//! Column Map
//!
//! Resolves ledger column names to cell positions using the row source
//! header, so the storage schema can gain or reorder columns without
//! breaking the record codec.

use std::collections::HashMap;

use crate::error::LedgerError;

pub const UUID: &str = "uuid";
pub const TIMESTAMP: &str = "timestamp";
pub const ACTOR: &str = "actor";
pub const EVENT_TYPE: &str = "event_type";
pub const TEXT: &str = "text";
pub const GIFT: &str = "gift";
pub const PREV_HASH: &str = "prev_hash";
pub const STATUS: &str = "status";
pub const PROVISION_IDS: &str = "provision_ids";
pub const PROVISION_TITLES: &str = "provision_titles";
pub const PROVISION_SNIPPETS: &str = "provision_snippets";
pub const PROVISION_URLS: &str = "provision_urls";
pub const CITATION_HASH: &str = "citation_hash";
pub const CONFIDENCE_LEVEL: &str = "confidence_level";
pub const CONFIDENCE_UUID: &str = "confidence_uuid";
pub const CONFIDENCE_JUSTIFICATION: &str = "confidence_justification";
pub const RECORD_HASH: &str = "record_hash";

/// Columns every decodable ledger must carry.
pub const REQUIRED: [&str; 2] = [UUID, TIMESTAMP];

/// Columns the chain verifier needs on top of [`REQUIRED`].
pub const CHAIN_REQUIRED: [&str; 2] = [PREV_HASH, RECORD_HASH];

/// Name-to-position lookup built from a header row
#[derive(Debug, Clone)]
pub struct ColumnMap {
    positions: HashMap<String, usize>,
}

impl ColumnMap {
    /// Build a map from the header, failing if a required column is absent.
    ///
    /// Header names are matched after trimming; when a name repeats, the
    /// first occurrence wins.
    pub fn from_header(header: &[String]) -> Result<Self, LedgerError> {
        let mut positions = HashMap::new();
        for (index, name) in header.iter().enumerate() {
            positions.entry(name.trim().to_string()).or_insert(index);
        }

        let map = Self { positions };
        map.require(&REQUIRED)?;
        Ok(map)
    }

    /// Same as [`ColumnMap::from_header`] but also demands the hash columns.
    pub fn for_chain(header: &[String]) -> Result<Self, LedgerError> {
        let map = Self::from_header(header)?;
        map.require(&CHAIN_REQUIRED)?;
        Ok(map)
    }

    fn require(&self, names: &[&str]) -> Result<(), LedgerError> {
        for name in names {
            if !self.positions.contains_key(*name) {
                return Err(LedgerError::missing_column(name));
            }
        }
        Ok(())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Cell value for `name`, or the empty string when the column or cell is absent.
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.position(name)
            .and_then(|index| row.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }
}
