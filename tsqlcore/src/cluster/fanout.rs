// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Node fan-out executor
//!
//! Resolves which storage nodes own partitions of a database and runs one
//! callback per node concurrently, waiting for all of them before returning.

use crate::exec::ExecutionError;
use crate::meta::MetaClient;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a callback raises when its node failed.
///
/// Peers check it to skip work whose partial state would be discarded anyway.
#[derive(Debug, Clone, Default)]
pub struct ErrorFlag {
    inner: Arc<AtomicBool>,
}

impl ErrorFlag {
    pub fn set(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

pub struct MetaExecutor {
    meta: Arc<dyn MetaClient>,
}

impl MetaExecutor {
    pub fn new(meta: Arc<dyn MetaClient>) -> Self {
        Self { meta }
    }

    /// Partition ids of `database` grouped by owning node
    pub fn node_partitions(&self, database: &str) -> Result<BTreeMap<u64, Vec<u32>>, ExecutionError> {
        let mut nodes: BTreeMap<u64, Vec<u32>> = BTreeMap::new();
        for owner in self.meta.db_pt_view(database)? {
            nodes.entry(owner.node_id).or_default().push(owner.pt_id);
        }
        for pts in nodes.values_mut() {
            pts.sort_unstable();
        }
        Ok(nodes)
    }

    /// Invoke `f` once per node owning partitions of `database`.
    ///
    /// All calls run concurrently. The first error in node id order is
    /// returned once every call has finished.
    pub async fn each_db_nodes<F, Fut>(&self, database: &str, f: F) -> Result<(), ExecutionError>
    where
        F: Fn(u64, Vec<u32>, ErrorFlag) -> Fut,
        Fut: Future<Output = Result<(), ExecutionError>>,
    {
        let nodes = self.node_partitions(database)?;
        log::debug!("fan out on database {} to {} nodes", database, nodes.len());

        let flag = ErrorFlag::default();
        let calls = nodes
            .into_iter()
            .map(|(node_id, pts)| f(node_id, pts, flag.clone()));
        let results = join_all(calls).await;

        match results.into_iter().find_map(Result::err) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
