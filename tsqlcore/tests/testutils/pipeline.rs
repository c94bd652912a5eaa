//! Scripted query pipeline

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tsqlcore::ast::SelectStatement;
use tsqlcore::pipeline::{RowBatch, SelectOptions};
use tsqlcore::{ExecutionError, PipelineExecutor, QueryPlan, ShardMapper};

/// How the next `select` call behaves
pub enum PlanScript {
    /// A plan emitting these batches
    Rows(Vec<RowBatch>),
    /// A plan that fails after emitting these batches
    RowsThenFail(Vec<RowBatch>, ExecutionError),
    /// `Ok(None)`
    NoData,
    /// Plan construction fails
    Fail(ExecutionError),
    /// A plan that runs until aborted
    Block,
    /// A plan that sends `count` copies of a batch, one every `every`, and
    /// ignores abort
    Stream {
        batch: RowBatch,
        count: usize,
        every: Duration,
    },
    /// Plan construction panics with a message
    Panic(&'static str),
    /// Plan construction panics with a data type error
    DataTypePanic(&'static str),
}

struct FakePlan {
    batches: Vec<RowBatch>,
    failure: Option<ExecutionError>,
    block: bool,
    every: Option<Duration>,
    abort: CancellationToken,
    aborted: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl FakePlan {
    async fn run(&self, tx: mpsc::Sender<RowBatch>) -> Result<(), ExecutionError> {
        for batch in &self.batches {
            if let Some(every) = self.every {
                tokio::time::sleep(every).await;
            }
            if tx.send(batch.clone()).await.is_err() {
                return Ok(());
            }
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.block {
            self.abort.cancelled().await;
        }
        Ok(())
    }
}

#[async_trait]
impl QueryPlan for FakePlan {
    async fn execute(&self, tx: mpsc::Sender<RowBatch>) -> Result<(), ExecutionError> {
        let result = self.run(tx).await;
        self.finished.store(true, Ordering::SeqCst);
        result
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.abort.cancel();
    }

    fn describe(&self) -> Vec<String> {
        vec![
            "fake plan".to_string(),
            format!("batches: {}", self.batches.len()),
        ]
    }
}

#[derive(Default)]
pub struct FakePipeline {
    scripts: Mutex<VecDeque<PlanScript>>,
    selects: AtomicUsize,
    aborted: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl FakePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, script: PlanScript) {
        self.scripts.lock().push_back(script);
    }

    pub fn selects(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    /// Whether any plan handed out so far was aborted
    pub fn plan_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Whether the last plan's `execute` returned
    pub fn plan_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    fn plan(&self, batches: Vec<RowBatch>, failure: Option<ExecutionError>, block: bool) -> Arc<dyn QueryPlan> {
        self.finished.store(false, Ordering::SeqCst);
        Arc::new(FakePlan {
            batches,
            failure,
            block,
            every: None,
            abort: CancellationToken::new(),
            aborted: self.aborted.clone(),
            finished: self.finished.clone(),
        })
    }
}

#[async_trait]
impl PipelineExecutor for FakePipeline {
    async fn select(
        &self,
        _stmt: &SelectStatement,
        _shard_mapper: Arc<dyn ShardMapper>,
        _options: &SelectOptions,
    ) -> Result<Option<Arc<dyn QueryPlan>>, ExecutionError> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or(PlanScript::Rows(Vec::new()));
        match script {
            PlanScript::Rows(batches) => Ok(Some(self.plan(batches, None, false))),
            PlanScript::RowsThenFail(batches, err) => Ok(Some(self.plan(batches, Some(err), false))),
            PlanScript::NoData => Ok(None),
            PlanScript::Fail(err) => Err(err),
            PlanScript::Block => Ok(Some(self.plan(Vec::new(), None, true))),
            PlanScript::Stream {
                batch,
                count,
                every,
            } => {
                self.finished.store(false, Ordering::SeqCst);
                Ok(Some(Arc::new(FakePlan {
                    batches: vec![batch; count],
                    failure: None,
                    block: false,
                    every: Some(every),
                    abort: CancellationToken::new(),
                    aborted: self.aborted.clone(),
                    finished: self.finished.clone(),
                })))
            }
            PlanScript::Panic(message) => panic!("{}", message),
            PlanScript::DataTypePanic(message) => std::panic::panic_any(
                ExecutionError::DataTypeNotSupported(message.to_string()),
            ),
        }
    }

    async fn prepare(
        &self,
        stmt: &SelectStatement,
        _shard_mapper: Arc<dyn ShardMapper>,
        _options: &SelectOptions,
    ) -> Result<SelectStatement, ExecutionError> {
        Ok(stmt.clone())
    }
}

#[derive(Default)]
pub struct NoopShardMapper {
    closed: AtomicBool,
}

impl NoopShardMapper {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ShardMapper for NoopShardMapper {
    fn close(&self) -> Result<(), ExecutionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
