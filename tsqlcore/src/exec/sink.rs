// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result delivery to the client connection

use super::error::ExecutionError;
use super::result::QueryResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Ordered delivery of statement results.
///
/// `seq` is the position of the statement in the request. Every result of a
/// statement carries the same `seq` and a sink never accepts a `seq` lower
/// than one it already delivered.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn send(&self, result: QueryResult, seq: usize) -> Result<(), ExecutionError>;
}

/// Sink backed by a bounded tokio channel
pub struct ChannelSink {
    tx: mpsc::Sender<QueryResult>,
    last_seq: Mutex<Option<usize>>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<QueryResult>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                last_seq: Mutex::new(None),
            },
            rx,
        )
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn send(&self, mut result: QueryResult, seq: usize) -> Result<(), ExecutionError> {
        {
            let mut last = self.last_seq.lock();
            if let Some(prev) = *last {
                if seq < prev {
                    return Err(ExecutionError::Internal(format!(
                        "result {} sent after result {}",
                        seq, prev
                    )));
                }
            }
            *last = Some(seq);
        }
        result.statement_id = seq;
        self.tx
            .send(result)
            .await
            .map_err(|_| ExecutionError::SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_orders_by_seq() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.send(QueryResult::empty(), 0).await.unwrap();
        sink.send(QueryResult::empty(), 1).await.unwrap();
        sink.send(QueryResult::empty(), 1).await.unwrap();
        assert!(sink.send(QueryResult::empty(), 0).await.is_err());

        let ids: Vec<usize> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .iter()
        .map(|r| r.statement_id)
        .collect();
        assert_eq!(ids, vec![0, 1, 1]);
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        assert_eq!(
            sink.send(QueryResult::empty(), 0).await,
            Err(ExecutionError::SinkClosed)
        );
    }
}
