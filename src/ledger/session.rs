//! Verification Session
//!
//! Caller-held progress for a multi-chunk scan. All state lives here, so a
//! scan can be paused by simply not stepping, resumed from a saved cursor,
//! or dropped without affecting the ledger.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::ledger::report::{ChunkResult, VerificationReport};
use crate::ledger::secret::{LedgerSecret, SecretProvider};
use crate::ledger::source::{RowSource, FIRST_DATA_ROW};
use crate::ledger::verifier::ChunkedVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Complete,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSession {
    cursor: usize,
    chunk_size: usize,
    state: SessionState,
    report: VerificationReport,
    last_error: Option<String>,
}

impl VerificationSession {
    /// Session starting at the first data row.
    pub fn new(chunk_size: usize) -> Result<Self, LedgerError> {
        Self::resume(FIRST_DATA_ROW, chunk_size)
    }

    /// Session picking up at a cursor returned by an earlier step.
    pub fn resume(cursor: usize, chunk_size: usize) -> Result<Self, LedgerError> {
        if chunk_size == 0 {
            return Err(LedgerError::InvalidArgument(
                "chunk size must be at least 1".to_string(),
            ));
        }
        if cursor < FIRST_DATA_ROW {
            return Err(LedgerError::cursor_out_of_range(cursor, FIRST_DATA_ROW));
        }
        Ok(Self {
            cursor,
            chunk_size,
            state: SessionState::Idle,
            report: VerificationReport::new(),
            last_error: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn report(&self) -> &VerificationReport {
        &self.report
    }

    pub fn into_report(self) -> VerificationReport {
        self.report
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Where a later session should resume, or `None` once complete.
    pub fn resume_cursor(&self) -> Option<usize> {
        match self.state {
            SessionState::Complete => None,
            _ => Some(self.cursor),
        }
    }

    /// Verify the next chunk and fold its findings into the report.
    ///
    /// On a storage error the session moves to `Failed` with its cursor
    /// unchanged; call [`VerificationSession::retry`] to try the same chunk
    /// again.
    pub fn step<S: RowSource>(
        &mut self,
        verifier: &ChunkedVerifier<S>,
        secret: Option<&LedgerSecret>,
    ) -> Result<ChunkResult, LedgerError> {
        match self.state {
            SessionState::Idle | SessionState::Running => {}
            other => {
                return Err(LedgerError::InvalidArgument(format!(
                    "cannot step a session in state {:?}",
                    other
                )))
            }
        }

        self.state = SessionState::Running;
        let chunk = match verifier.verify_chunk(self.cursor, self.chunk_size, secret) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Verification step at row {} failed: {}", self.cursor, e);
                self.state = SessionState::Failed;
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        self.report.absorb(&chunk);
        match chunk.next_cursor {
            Some(next) => self.cursor = next,
            None => {
                self.cursor = chunk.end_row + 1;
                self.state = SessionState::Complete;
            }
        }
        Ok(chunk)
    }

    /// Leave `Failed` so the chunk at the current cursor can be retried.
    pub fn retry(&mut self) -> Result<(), LedgerError> {
        if self.state != SessionState::Failed {
            return Err(LedgerError::InvalidArgument(format!(
                "only a failed session can be retried (state {:?})",
                self.state
            )));
        }
        self.state = SessionState::Running;
        self.last_error = None;
        Ok(())
    }

    /// Stop the scan; the cursor is kept for a later resume.
    pub fn cancel(&mut self) {
        if self.state != SessionState::Complete {
            self.state = SessionState::Cancelled;
        }
    }

    /// Step until the ledger end or until `cancel` is raised, yielding to
    /// the runtime between chunks. The secret is fetched once per run.
    pub async fn run_until_complete<S, P>(
        &mut self,
        verifier: &ChunkedVerifier<S>,
        provider: &P,
        cancel: &AtomicBool,
    ) -> Result<&VerificationReport, LedgerError>
    where
        S: RowSource,
        P: SecretProvider + ?Sized,
    {
        let secret = provider.secret();
        if secret.is_none() {
            warn!("No hashing secret available; checking chain continuity only");
        }
        info!(
            "Verifying ledger from row {} in chunks of {}",
            self.cursor, self.chunk_size
        );

        while self.state != SessionState::Complete {
            if cancel.load(Ordering::SeqCst) {
                self.cancel();
                info!("Verification cancelled; resume at row {}", self.cursor);
                break;
            }
            self.step(verifier, secret.as_ref())?;
            tokio::task::yield_now().await;
        }

        if self.state == SessionState::Complete {
            info!("{}", self.report.summary());
        }
        Ok(&self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::hasher::ChainHasher;
    use crate::ledger::record::LedgerRecord;
    use crate::ledger::secret::StaticSecretProvider;
    use crate::ledger::source::MemoryRowSource;
    use std::cell::Cell;

    fn verifier(n: usize) -> ChunkedVerifier<MemoryRowSource> {
        let secret = LedgerSecret::new("x").unwrap();
        let records = (0..n).map(|i| LedgerRecord::new(format!("u-{}", i), "t"));
        let chain = ChainHasher::link(records, &secret);
        ChunkedVerifier::new(MemoryRowSource::from_records(&chain))
    }

    /// Source that fails reads until told otherwise.
    struct FlakySource {
        inner: MemoryRowSource,
        failing: Cell<bool>,
    }

    impl RowSource for FlakySource {
        fn header(&self) -> Result<Vec<String>, LedgerError> {
            self.inner.header()
        }

        fn rows(&self, start: usize, count: usize) -> Result<Vec<Vec<String>>, LedgerError> {
            if self.failing.get() {
                return Err(LedgerError::StorageReadError("backend unavailable".to_string()));
            }
            self.inner.rows(start, count)
        }

        fn total_row_count(&self) -> Result<usize, LedgerError> {
            self.inner.total_row_count()
        }
    }

    #[test]
    fn test_session_lifecycle() {
        let verifier = verifier(5);
        let mut session = VerificationSession::new(2).unwrap();
        assert_eq!(session.state(), SessionState::Idle);

        session.step(&verifier, None).unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.cursor(), 4);

        session.step(&verifier, None).unwrap();
        session.step(&verifier, None).unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.resume_cursor(), None);
        assert_eq!(session.report().rows_checked, 5);

        assert!(session.step(&verifier, None).is_err());
    }

    #[test]
    fn test_cancel_keeps_cursor() {
        let verifier = verifier(5);
        let mut session = VerificationSession::new(2).unwrap();
        session.step(&verifier, None).unwrap();
        session.cancel();

        assert_eq!(session.state(), SessionState::Cancelled);
        assert_eq!(session.resume_cursor(), Some(4));
        assert!(session.step(&verifier, None).is_err());
    }

    #[test]
    fn test_storage_error_fails_then_retries_same_chunk() {
        let secret = LedgerSecret::new("x").unwrap();
        let chain = ChainHasher::link(
            (0..3).map(|i| LedgerRecord::new(format!("u-{}", i), "t")),
            &secret,
        );
        let source = FlakySource {
            inner: MemoryRowSource::from_records(&chain),
            failing: Cell::new(true),
        };
        let verifier = ChunkedVerifier::new(source);
        let mut session = VerificationSession::new(10).unwrap();

        let err = session.step(&verifier, Some(&secret)).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.cursor(), 2);
        assert!(session.last_error().is_some());

        verifier.source().failing.set(false);
        session.retry().unwrap();
        session.step(&verifier, Some(&secret)).unwrap();
        assert_eq!(session.state(), SessionState::Complete);
        assert!(session.report().is_intact());
    }

    #[test]
    fn test_invalid_construction() {
        assert!(VerificationSession::new(0).is_err());
        assert!(VerificationSession::resume(1, 5).is_err());
    }

    #[tokio::test]
    async fn test_run_until_complete() {
        let verifier = verifier(10);
        let mut session = VerificationSession::new(3).unwrap();
        let cancel = AtomicBool::new(false);

        let report = session
            .run_until_complete(&verifier, &StaticSecretProvider::new("x"), &cancel)
            .await
            .unwrap();
        assert!(report.is_intact());
        assert_eq!(report.rows_checked, 10);
        assert_eq!(session.state(), SessionState::Complete);
    }

    #[tokio::test]
    async fn test_run_honours_cancel_flag() {
        let verifier = verifier(10);
        let mut session = VerificationSession::new(3).unwrap();
        let cancel = AtomicBool::new(true);

        session
            .run_until_complete(&verifier, &StaticSecretProvider::none(), &cancel)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Cancelled);
        assert_eq!(session.resume_cursor(), Some(2));
        assert_eq!(session.report().rows_checked, 0);
    }
}
