//! In-process collective group: one communicator per worker thread.
//!
//! Workers exchange envelopes over `std::sync::mpsc` channels. Every collective gets
//! the next sequence number; messages that arrive for a later collective are
//! parked until that collective runs. A collective that does not complete
//! within the timeout fails the worker with a [`GbtError::Collective`].

use crate::core::error::{GbtError, Result};
use crate::network::Communicator;
use std::collections::BTreeMap;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
enum Message {
    Data {
        seq: u64,
        from: usize,
        payload: Vec<f64>,
    },
    Abort {
        from: usize,
        reason: String,
    },
}

#[derive(Debug)]
struct State {
    receiver: Receiver<Message>,
    next_seq: u64,
    /// Payloads that arrived ahead of their collective, keyed by (seq, rank)
    pending: BTreeMap<(u64, usize), Vec<f64>>,
}

/// Factory for a group of connected [`InProcessCommunicator`]s.
#[derive(Debug)]
pub struct InProcessGroup;

impl InProcessGroup {
    /// Create `world_size` communicators; hand one to each worker thread.
    pub fn create(world_size: usize, timeout: Duration) -> Result<Vec<InProcessCommunicator>> {
        if world_size == 0 {
            return Err(GbtError::invalid_parameter(
                "num_workers",
                0,
                "must be at least 1",
            ));
        }
        let (senders, receivers): (Vec<Sender<Message>>, Vec<Receiver<Message>>) =
            (0..world_size).map(|_| channel()).unzip();

        Ok(receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| InProcessCommunicator {
                rank,
                world_size,
                timeout,
                peers: senders.clone(),
                state: Mutex::new(State {
                    receiver,
                    next_seq: 0,
                    pending: BTreeMap::new(),
                }),
            })
            .collect())
    }
}

/// One worker's endpoint of an [`InProcessGroup`].
#[derive(Debug)]
pub struct InProcessCommunicator {
    rank: usize,
    world_size: usize,
    timeout: Duration,
    peers: Vec<Sender<Message>>,
    state: Mutex<State>,
}

impl InProcessCommunicator {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn fail<S: Into<String>>(&self, message: S) -> GbtError {
        GbtError::collective(self.rank, self.timeout, message)
    }

    /// Error for a peer whose endpoint is gone, preferring its abort reason.
    fn peer_gone(&self, state: &State, peer: usize) -> GbtError {
        while let Ok(message) = state.receiver.try_recv() {
            if let Message::Abort { from, reason } = message {
                return self.fail(format!("rank {} aborted: {}", from, reason));
            }
        }
        self.fail(format!("rank {} is unreachable", peer))
    }
}

impl Communicator for InProcessCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn allgather(&self, local: Vec<f64>) -> Result<Vec<Vec<f64>>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| self.fail("collective state poisoned by a panicked caller"))?;
        let seq = state.next_seq;
        state.next_seq += 1;

        for (peer, sender) in self.peers.iter().enumerate() {
            if peer == self.rank {
                continue;
            }
            sender
                .send(Message::Data {
                    seq,
                    from: self.rank,
                    payload: local.clone(),
                })
                .map_err(|_| self.peer_gone(&state, peer))?;
        }

        let mut slots: Vec<Option<Vec<f64>>> = vec![None; self.world_size];
        slots[self.rank] = Some(local);
        for (peer, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = state.pending.remove(&(seq, peer));
            }
        }

        let deadline = Instant::now()
            .checked_add(self.timeout)
            .ok_or_else(|| self.fail(format!("timeout of {:?} is out of range", self.timeout)))?;
        while slots.iter().any(Option::is_none) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match state.receiver.recv_timeout(remaining) {
                Ok(Message::Data { seq: s, from, payload }) if s == seq => {
                    slots[from] = Some(payload);
                }
                Ok(Message::Data { seq: s, from, payload }) => {
                    if s < seq {
                        return Err(self.fail(format!(
                            "stale message #{} from rank {} during collective #{}",
                            s, from, seq
                        )));
                    }
                    state.pending.insert((s, from), payload);
                }
                Ok(Message::Abort { from, reason }) => {
                    return Err(self.fail(format!("rank {} aborted: {}", from, reason)));
                }
                Err(RecvTimeoutError::Timeout) => {
                    let missing: Vec<usize> = slots
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.is_none())
                        .map(|(r, _)| r)
                        .collect();
                    return Err(self.fail(format!(
                        "timed out in collective #{} waiting for rank(s) {:?}",
                        seq, missing
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.fail("all peers disconnected"));
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn abort(&self, reason: &str) {
        log::warn!("Rank {} aborting collective group: {}", self.rank, reason);
        for (peer, sender) in self.peers.iter().enumerate() {
            if peer != self.rank {
                // peers that already exited no longer need the notice
                let _ = sender.send(Message::Abort {
                    from: self.rank,
                    reason: reason.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn run_group<F, T>(world_size: usize, timeout: Duration, f: F) -> Vec<Result<T>>
    where
        F: Fn(InProcessCommunicator) -> Result<T> + Sync,
        T: Send,
    {
        let comms = InProcessGroup::create(world_size, timeout).unwrap();
        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(|| f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("worker panicked"))
                .collect()
        })
    }

    #[test]
    fn test_allgather_orders_by_rank() {
        let results = run_group(3, Duration::from_secs(5), |comm| {
            comm.allgather(vec![comm.rank() as f64; comm.rank() + 1])
        });
        for result in results {
            let parts = result.unwrap();
            assert_eq!(parts, vec![vec![0.0], vec![1.0, 1.0], vec![2.0, 2.0, 2.0]]);
        }
    }

    #[test]
    fn test_allreduce_is_identical_everywhere() {
        let results = run_group(4, Duration::from_secs(5), |comm| {
            let mut out = Vec::new();
            for round in 0..20 {
                let mut buf = vec![0.1 * (comm.rank() + round) as f64, 1e16, -1e16];
                comm.allreduce_sum(&mut buf)?;
                out.push(buf);
            }
            Ok(out)
        });
        let first = results[0].as_ref().unwrap();
        for result in &results {
            let bits: Vec<Vec<u64>> = result
                .as_ref()
                .unwrap()
                .iter()
                .map(|v| v.iter().map(|x| x.to_bits()).collect())
                .collect();
            let expected: Vec<Vec<u64>> = first
                .iter()
                .map(|v| v.iter().map(|x| x.to_bits()).collect())
                .collect();
            assert_eq!(bits, expected);
        }
    }

    #[test]
    fn test_missing_peer_times_out_with_rank() {
        let results = run_group(2, Duration::from_millis(100), |comm| {
            if comm.rank() == 1 {
                // never joins the collective
                return Ok(Vec::new());
            }
            comm.allgather(vec![1.0])
        });
        match &results[0] {
            Err(GbtError::Collective { rank, timeout, message }) => {
                assert_eq!(*rank, 0);
                assert_eq!(*timeout, Duration::from_millis(100));
                assert!(message.contains('1'));
            }
            other => panic!("expected collective error, got {:?}", other),
        }
    }

    #[test]
    fn test_unrepresentable_deadline_is_an_error() {
        let results = run_group(2, Duration::MAX, |comm| comm.allgather(vec![1.0]));
        for result in &results {
            match result {
                Err(GbtError::Collective { message, .. }) => {
                    assert!(message.contains("out of range"));
                }
                other => panic!("expected collective error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_abort_reaches_peers() {
        let results = run_group(3, Duration::from_secs(30), |comm| {
            if comm.rank() == 2 {
                comm.abort("bad shard");
                return Err(GbtError::dataset("label", "bad shard"));
            }
            comm.barrier().map(|_| ())
        });
        for result in &results[..2] {
            let err = result.as_ref().unwrap_err();
            assert!(err.to_string().contains("rank 2 aborted"));
        }
    }
}
