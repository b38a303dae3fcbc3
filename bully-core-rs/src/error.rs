//! Error types for the bully election core

use crate::types::Rank;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BullyError {
    #[error("process group must contain at least one process")]
    EmptyGroup,

    #[error("rank {rank} is outside the group of {size} processes")]
    RankOutOfRange { rank: Rank, size: usize },

    #[error("poll interval {poll:?} must be non-zero and no longer than the response timeout {timeout:?}")]
    InvalidTiming { poll: Duration, timeout: Duration },

    #[error("transport belongs to rank {transport} in a group of {transport_size}, node is rank {node} of {node_size}")]
    TransportMismatch {
        transport: Rank,
        transport_size: usize,
        node: Rank,
        node_size: usize,
    },

    #[error("expected at least one peer address")]
    NoPeers,

    #[error("runtime cannot run listener and election tasks in parallel (multi-threaded tokio runtime required)")]
    InsufficientConcurrency,

    #[error("no tokio runtime is running")]
    NoRuntime,

    #[error("node already started")]
    AlreadyStarted,

    #[error("node stopped")]
    NodeStopped,

    #[error("transport closed")]
    TransportClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, BullyError>;
