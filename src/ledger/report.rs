//! Verification Results
//!
//! Plain-data findings produced by the chunked verifier, and a report that
//! accumulates them across chunks. Nothing here renders or persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::hasher::DigestMode;
use crate::ledger::signals::{Signal, SignalType};

/// A row whose `prev_hash` does not equal its predecessor's `record_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub row: usize,
    pub uuid: String,
    pub expected: String,
    pub found: String,
}

/// A row whose stored `record_hash` does not match its recomputed digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestMismatch {
    pub row: usize,
    pub uuid: String,
    pub stored: String,
    pub computed: String,
}

/// A row that could not be decoded into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedRow {
    pub row: usize,
    pub uuid: String,
    pub reason: String,
}

/// Outcome of one `verify_chunk` step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub broken: Vec<BrokenLink>,
    pub mismatches: Vec<DigestMismatch>,
    pub malformed: Vec<MalformedRow>,
    pub signals: Vec<Signal>,
    pub rows_checked: usize,
    pub start_row: usize,
    pub end_row: usize,
    /// Last occupied storage row when this step ran.
    pub total_rows: usize,
    pub digest_mode: DigestMode,
    pub complete: bool,
    pub next_cursor: Option<usize>,
}

impl ChunkResult {
    /// Result for a step that had nothing left to read.
    pub fn empty(cursor: usize, total_rows: usize, digest_mode: DigestMode) -> Self {
        Self {
            broken: Vec::new(),
            mismatches: Vec::new(),
            malformed: Vec::new(),
            signals: Vec::new(),
            rows_checked: 0,
            start_row: cursor,
            end_row: total_rows.max(cursor.saturating_sub(1)),
            total_rows,
            digest_mode,
            complete: true,
            next_cursor: None,
        }
    }

    pub fn has_findings(&self) -> bool {
        !self.broken.is_empty() || !self.mismatches.is_empty() || !self.malformed.is_empty()
    }
}

/// Findings accumulated over any number of chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub broken: Vec<BrokenLink>,
    pub mismatches: Vec<DigestMismatch>,
    pub malformed: Vec<MalformedRow>,
    pub signals: Vec<Signal>,
    pub rows_checked: usize,
    pub total_rows: usize,
    pub chunks: usize,
    /// `ContinuityOnly` as soon as any absorbed chunk ran without a secret.
    pub digest_mode: DigestMode,
    pub complete: bool,
    pub generated_at: DateTime<Utc>,
}

impl Default for VerificationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationReport {
    pub fn new() -> Self {
        Self {
            broken: Vec::new(),
            mismatches: Vec::new(),
            malformed: Vec::new(),
            signals: Vec::new(),
            rows_checked: 0,
            total_rows: 0,
            chunks: 0,
            digest_mode: DigestMode::Keyed,
            complete: false,
            generated_at: Utc::now(),
        }
    }

    /// Fold one chunk's findings into the report.
    pub fn absorb(&mut self, chunk: &ChunkResult) {
        self.broken.extend(chunk.broken.iter().cloned());
        self.mismatches.extend(chunk.mismatches.iter().cloned());
        self.malformed.extend(chunk.malformed.iter().cloned());
        self.signals.extend(chunk.signals.iter().cloned());
        self.rows_checked += chunk.rows_checked;
        self.total_rows = chunk.total_rows;
        self.chunks += 1;
        if chunk.digest_mode == DigestMode::ContinuityOnly {
            self.digest_mode = DigestMode::ContinuityOnly;
        }
        self.complete = chunk.complete;
        self.generated_at = Utc::now();
    }

    /// Combine with a report covering a disjoint row range.
    pub fn merge(&mut self, other: VerificationReport) {
        self.broken.extend(other.broken);
        self.mismatches.extend(other.mismatches);
        self.malformed.extend(other.malformed);
        self.signals.extend(other.signals);
        self.rows_checked += other.rows_checked;
        self.total_rows = self.total_rows.max(other.total_rows);
        self.chunks += other.chunks;
        if other.digest_mode == DigestMode::ContinuityOnly {
            self.digest_mode = DigestMode::ContinuityOnly;
        }
        self.complete = self.complete || other.complete;
        self.generated_at = self.generated_at.max(other.generated_at);
    }

    /// No break, mismatch, or malformed row was found.
    pub fn is_intact(&self) -> bool {
        self.broken.is_empty() && self.mismatches.is_empty() && self.malformed.is_empty()
    }

    pub fn signal_counts(&self) -> BTreeMap<SignalType, usize> {
        let mut counts = BTreeMap::new();
        for signal in &self.signals {
            *counts.entry(signal.signal_type).or_insert(0) += 1;
        }
        counts
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        let mode = match self.digest_mode {
            DigestMode::Keyed => "verified",
            DigestMode::ContinuityOnly => "continuity only",
        };
        let progress = if self.complete { "complete" } else { "partial" };

        if self.is_intact() {
            format!(
                "Ledger intact: {} rows checked ({}, {}), {} signals",
                self.rows_checked,
                mode,
                progress,
                self.signals.len()
            )
        } else {
            format!(
                "Ledger tampered: {} broken links, {} digest mismatches, {} malformed rows in {} rows checked ({}, {})",
                self.broken.len(),
                self.mismatches.len(),
                self.malformed.len(),
                self.rows_checked,
                mode,
                progress
            )
        }
    }
}
