//! Result sink that keeps everything it receives

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tsqlcore::{ExecutionError, QueryResult, ResultSink};

#[derive(Default)]
pub struct CollectingSink {
    results: Mutex<Vec<QueryResult>>,
    closed: AtomicBool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later send fail as if the client went away
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Drain collected results
    pub fn take(&self) -> Vec<QueryResult> {
        std::mem::take(&mut *self.results.lock())
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }
}

#[async_trait]
impl ResultSink for CollectingSink {
    async fn send(&self, mut result: QueryResult, seq: usize) -> Result<(), ExecutionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExecutionError::SinkClosed);
        }
        result.statement_id = seq;
        self.results.lock().push(result);
        Ok(())
    }
}
