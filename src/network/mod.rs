//! Collective communication between training workers.
//!
//! Every worker holds a [`Communicator`]. Histograms, sketch summaries, metric
//! partial sums and the cancellation flag all travel through the same three
//! blocking collectives. All-reduce is built on all-gather and sums the
//! gathered blocks in rank order, so every worker computes bit-identical
//! results regardless of message arrival order.

pub mod coordinator;
pub mod inproc;

pub use coordinator::{train_distributed, train_partitioned, WorkerShard};
pub use inproc::{InProcessCommunicator, InProcessGroup};

use crate::core::error::{GbtError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Blocking collectives over a fixed group of workers.
pub trait Communicator: Send + Sync {
    /// Rank of this worker in `0..world_size()`
    fn rank(&self) -> usize;

    /// Number of workers in the group
    fn world_size(&self) -> usize;

    /// Gather every worker's buffer; the result is indexed by rank.
    fn allgather(&self, local: Vec<f64>) -> Result<Vec<Vec<f64>>>;

    /// Element-wise sum of `buf` over all workers, written back into `buf`.
    fn allreduce_sum(&self, buf: &mut [f64]) -> Result<()> {
        if self.world_size() == 1 {
            return Ok(());
        }
        let parts = self.allgather(buf.to_vec())?;
        reduce_in_rank_order(&parts, buf)
    }

    /// Block until every worker reaches the barrier.
    fn barrier(&self) -> Result<()> {
        self.allgather(Vec::new()).map(|_| ())
    }

    /// Tell peers that this worker is giving up so they fail fast instead of
    /// waiting for the timeout.
    fn abort(&self, _reason: &str) {}
}

/// Sum gathered blocks into `out`, starting from rank 0.
pub fn reduce_in_rank_order(parts: &[Vec<f64>], out: &mut [f64]) -> Result<()> {
    for (rank, part) in parts.iter().enumerate() {
        if part.len() != out.len() {
            return Err(GbtError::internal(format!(
                "allreduce size mismatch: rank {} sent {} values, expected {}",
                rank,
                part.len(),
                out.len()
            )));
        }
    }
    let Some((first, rest)) = parts.split_first() else {
        return Ok(());
    };
    out.copy_from_slice(first);
    for part in rest {
        for (acc, v) in out.iter_mut().zip(part) {
            *acc += v;
        }
    }
    Ok(())
}

/// Communicator of a single worker; every collective is local.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCommunicator;

impl LocalCommunicator {
    pub fn new() -> Self {
        LocalCommunicator
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn allgather(&self, local: Vec<f64>) -> Result<Vec<Vec<f64>>> {
        Ok(vec![local])
    }
}

/// Flag requesting that training stops at the next round boundary.
///
/// Clones share the flag. Workers all-reduce it at the start of every round,
/// so a cancellation seen by any worker stops all of them on the same round.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
