//! Chunked Chain Verifier
//!
//! Verifies an arbitrarily long ledger one bounded window at a time. Each
//! step is self-contained: it reads its window plus the row just before it,
//! checks `prev_hash` linkage against stored hashes, recomputes digests when
//! a secret is available, and reports where the next step should start.
//! Repeating a step with the same arguments yields the same result as long
//! as the rows it covers are unchanged.

use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::ledger::columns::{self, ColumnMap};
use crate::ledger::hasher::{ChainHasher, DigestMode};
use crate::ledger::record::LedgerRecord;
use crate::ledger::report::{
    BrokenLink, ChunkResult, DigestMismatch, MalformedRow, VerificationReport,
};
use crate::ledger::secret::LedgerSecret;
use crate::ledger::signals;
use crate::ledger::source::{RowSource, FIRST_DATA_ROW};

pub struct ChunkedVerifier<S> {
    source: S,
}

impl<S: RowSource> ChunkedVerifier<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Verify storage rows `cursor..cursor + chunk_size`, clamped to the
    /// last occupied row.
    ///
    /// Without a secret only continuity is checked and the result says so
    /// through `digest_mode`.
    pub fn verify_chunk(
        &self,
        cursor: usize,
        chunk_size: usize,
        secret: Option<&LedgerSecret>,
    ) -> Result<ChunkResult, LedgerError> {
        if chunk_size == 0 {
            return Err(LedgerError::InvalidArgument(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if cursor < FIRST_DATA_ROW {
            return Err(LedgerError::cursor_out_of_range(cursor, FIRST_DATA_ROW));
        }

        let digest_mode = DigestMode::for_secret(secret);
        let total_rows = self.source.total_row_count()?;
        if cursor > total_rows {
            debug!("Nothing to verify at row {} (last row {})", cursor, total_rows);
            return Ok(ChunkResult::empty(cursor, total_rows, digest_mode));
        }

        let columns = ColumnMap::for_chain(&self.source.header()?)?;

        let last = cursor.saturating_add(chunk_size - 1).min(total_rows);
        let fetch_start = if cursor > FIRST_DATA_ROW { cursor - 1 } else { cursor };
        let fetched = self.source.rows(fetch_start, last - fetch_start + 1)?;
        debug!(
            "Fetched rows {}..={} ({} rows, overlap: {})",
            fetch_start,
            last,
            fetched.len(),
            fetch_start < cursor
        );

        let (overlap, window) = if fetch_start < cursor {
            match fetched.split_first() {
                Some((first, rest)) => (Some(first), rest),
                None => (None, &fetched[..]),
            }
        } else {
            (None, &fetched[..])
        };

        if window.is_empty() {
            return Err(LedgerError::StorageReadError(format!(
                "row source returned no rows at {} although {} rows are reported",
                cursor, total_rows
            )));
        }

        let mut result = ChunkResult {
            start_row: cursor,
            end_row: cursor - 1,
            ..ChunkResult::empty(cursor, total_rows, digest_mode)
        };
        let mut previous_hash = overlap.map(|row| columns.cell(row, columns::RECORD_HASH));

        for (offset, row) in window.iter().enumerate() {
            let position = cursor + offset;
            check_row(&columns, row, position, previous_hash, secret, &mut result);
            previous_hash = Some(columns.cell(row, columns::RECORD_HASH));
            result.rows_checked += 1;
            result.end_row = position;
        }

        result.complete = result.end_row >= total_rows;
        result.next_cursor = if result.complete {
            None
        } else {
            Some(result.end_row + 1)
        };

        debug!(
            "Verified rows {}..={}: {} broken, {} mismatched, {} malformed",
            result.start_row,
            result.end_row,
            result.broken.len(),
            result.mismatches.len(),
            result.malformed.len()
        );
        Ok(result)
    }

    /// Drive `verify_chunk` from the first data row to the end of the ledger.
    pub fn verify_all(
        &self,
        chunk_size: usize,
        secret: Option<&LedgerSecret>,
    ) -> Result<VerificationReport, LedgerError> {
        if secret.is_none() {
            warn!("No hashing secret available; checking chain continuity only");
        }

        let mut report = VerificationReport::new();
        let mut cursor = FIRST_DATA_ROW;
        loop {
            let chunk = self.verify_chunk(cursor, chunk_size, secret)?;
            report.absorb(&chunk);
            match chunk.next_cursor {
                Some(next) => cursor = next,
                None => break,
            }
        }

        info!("{}", report.summary());
        Ok(report)
    }
}

fn check_row(
    columns: &ColumnMap,
    row: &[String],
    position: usize,
    previous_hash: Option<&str>,
    secret: Option<&LedgerSecret>,
    result: &mut ChunkResult,
) {
    let uuid = columns.cell(row, columns::UUID);

    // The first record has no predecessor to link to.
    if position > FIRST_DATA_ROW {
        let expected = previous_hash.unwrap_or("");
        let found = columns.cell(row, columns::PREV_HASH);
        if found != expected {
            warn!("Hash chain broken at row {} ({})", position, uuid);
            result.broken.push(BrokenLink {
                row: position,
                uuid: uuid.to_string(),
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }

    let record = match LedgerRecord::from_row(columns, row, position) {
        Ok(record) => record,
        Err(e) => {
            warn!("Malformed ledger row {}: {}", position, e);
            result.malformed.push(MalformedRow {
                row: position,
                uuid: uuid.to_string(),
                reason: e.to_string(),
            });
            result.signals.extend(signals::scan_text(
                uuid,
                columns.cell(row, columns::TEXT),
                position,
            ));
            return;
        }
    };

    if let Some(secret) = secret {
        if !record.record_hash.is_empty() {
            let computed = ChainHasher::digest(&record, secret);
            if computed != record.record_hash {
                warn!("Digest mismatch at row {} ({})", position, record.uuid);
                result.mismatches.push(DigestMismatch {
                    row: position,
                    uuid: record.uuid.clone(),
                    stored: record.record_hash.clone(),
                    computed,
                });
            }
        }
    }

    result.signals.extend(signals::scan_record(&record, position));
}
