use crate::error::{IngestError, Result};
use crate::record::OutputRecord;
use crate::store::Storage;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Default number of records per transaction
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

type CommitHook = Box<dyn FnMut(usize) + Send>;

/// Writes a stream of records into size-bounded transactions.
///
/// Every `batch_size` records the open transaction is committed and a new one
/// begins; the remainder is committed when the stream ends. A failed insert or
/// commit rolls back the current batch only: rows from earlier batches stay
/// durable and their count is reported in [`IngestError::Write`].
pub struct BatchWriter<S: Storage> {
    storage: S,
    batch_size: usize,
    on_commit: Option<CommitHook>,
}

impl<S: Storage> BatchWriter<S> {
    pub fn new(storage: S, batch_size: usize) -> Self {
        Self {
            storage,
            batch_size: batch_size.max(1),
            on_commit: None,
        }
    }

    /// Called after every commit with the total number of committed rows
    pub fn on_commit(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_commit = Some(Box::new(hook));
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Write every record from `records`, returning the number committed.
    ///
    /// No transaction is opened for an empty stream.
    pub fn write<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = OutputRecord>,
    {
        let mut committed = 0;
        let mut in_batch = 0;

        for record in records {
            if in_batch == 0 {
                if let Err(e) = self.storage.begin() {
                    return Err(self.fail(committed, e, false));
                }
            }

            if let Err(e) = self.storage.insert(&record) {
                return Err(self.fail(committed, e, true));
            }
            in_batch += 1;

            if in_batch == self.batch_size {
                self.commit_batch(&mut committed, &mut in_batch)?;
            }
        }

        if in_batch > 0 {
            self.commit_batch(&mut committed, &mut in_batch)?;
        }

        Ok(committed)
    }

    /// Drain a bounded channel until every sender is dropped.
    ///
    /// Blocks the current thread; run it on a blocking task. Returning early
    /// on failure drops the receiver, which fails the producer's next send.
    pub fn write_from(&mut self, mut records: mpsc::Receiver<OutputRecord>) -> Result<usize> {
        self.write(std::iter::from_fn(move || records.blocking_recv()))
    }

    fn commit_batch(&mut self, committed: &mut usize, in_batch: &mut usize) -> Result<()> {
        if let Err(e) = self.storage.commit() {
            return Err(self.fail(*committed, e, true));
        }

        *committed += *in_batch;
        *in_batch = 0;

        info!(count = *committed, "{} records have been imported", *committed);
        if let Some(hook) = self.on_commit.as_mut() {
            hook(*committed);
        }
        Ok(())
    }

    fn fail(&mut self, committed: usize, cause: anyhow::Error, in_transaction: bool) -> IngestError {
        if in_transaction {
            if let Err(e) = self.storage.rollback() {
                warn!(error = %e, "Rollback after failed write also failed");
            }
        }
        error!(
            committed = committed,
            error = %cause,
            "Batch write failed, uncommitted records discarded"
        );
        IngestError::Write { committed, cause }
    }
}
