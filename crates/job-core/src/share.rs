//! Share validation and stale-work tracking.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::difficulty::{difficulty_of, Target};
use crate::endian::reverse_hash;
use crate::error::{Error, Result};
use crate::header::BlockHeader;
use crate::job::StratumJob;

/// Jobs kept after they stop being current, for late shares.
pub const RETAINED_JOBS: usize = 8;

/// Outcome of checking a header against a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub accepted: bool,
    /// Also at or below the network target from the job's `nbits`.
    pub block: bool,
    /// Header hash in display order.
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
}

impl Validation {
    /// Judge a double-SHA256 output (internal order).
    pub fn from_hash(hash: &[u8; 32], target: &Target) -> Self {
        let hash = reverse_hash(hash);
        Validation {
            accepted: target.is_met_by(&hash),
            block: false,
            hash,
        }
    }

    /// Mark the share as a block candidate if it also meets `network`.
    pub fn with_network(mut self, network: &Target) -> Self {
        self.block = self.accepted && network.is_met_by(&self.hash);
        self
    }

    /// Difficulty the hash achieved.
    pub fn difficulty(&self) -> f64 {
        difficulty_of(&self.hash)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Recompute the header hash and compare it with `target`.
///
/// A hash above the target is a rejected `Validation`, not an error.
pub fn validate(header: &BlockHeader, target: &Target) -> Validation {
    Validation::from_hash(&header.hash(), target)
}

/// Identifies the job and generation a piece of work was issued under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkTicket {
    pub job_id: String,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct BoardState {
    generation: u64,
    /// Oldest first; the back is the current job.
    jobs: VecDeque<Arc<StratumJob>>,
}

impl BoardState {
    fn find(&self, job_id: &str) -> Option<&Arc<StratumJob>> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }
}

/// Live jobs for one pool connection.
///
/// A clean-work job bumps the generation and retires every earlier job;
/// tickets from an older generation are rejected as stale. Running hardware
/// is not interrupted, its results are dropped when checked.
#[derive(Debug, Default)]
pub struct WorkBoard {
    state: RwLock<BoardState>,
    stale: AtomicU64,
}

impl WorkBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and return a ticket for it.
    pub fn publish(&self, job: StratumJob) -> WorkTicket {
        let mut state = self.state.write();
        if job.clean_jobs {
            state.generation += 1;
            state.jobs.clear();
        } else {
            state.jobs.retain(|known| known.job_id != job.job_id);
            while state.jobs.len() >= RETAINED_JOBS {
                state.jobs.pop_front();
            }
        }

        let ticket = WorkTicket {
            job_id: job.job_id.clone(),
            generation: state.generation,
        };
        tracing::debug!(
            job_id = %ticket.job_id,
            generation = ticket.generation,
            clean = job.clean_jobs,
            "published job"
        );
        state.jobs.push_back(Arc::new(job));
        ticket
    }

    /// Most recently published job.
    pub fn current(&self) -> Option<Arc<StratumJob>> {
        self.state.read().jobs.back().cloned()
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Ticket for a live job.
    pub fn ticket(&self, job_id: &str) -> Result<WorkTicket> {
        let state = self.state.read();
        match state.find(job_id) {
            Some(_) => Ok(WorkTicket {
                job_id: job_id.to_string(),
                generation: state.generation,
            }),
            None => Err(self.reject(job_id)),
        }
    }

    /// Job for a ticket, unless a clean-work job superseded it.
    pub fn check(&self, ticket: &WorkTicket) -> Result<Arc<StratumJob>> {
        let state = self.state.read();
        if ticket.generation != state.generation {
            return Err(self.reject(&ticket.job_id));
        }
        state
            .find(&ticket.job_id)
            .cloned()
            .ok_or_else(|| self.reject(&ticket.job_id))
    }

    /// Job by id, if it is still live.
    pub fn check_job(&self, job_id: &str) -> Result<Arc<StratumJob>> {
        self.state
            .read()
            .find(job_id)
            .cloned()
            .ok_or_else(|| self.reject(job_id))
    }

    /// Work rejected as stale so far.
    pub fn stale_count(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }

    fn reject(&self, job_id: &str) -> Error {
        let count = self.stale.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(job_id, stale = count, "rejecting stale work");
        Error::StaleWork {
            job_id: job_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::tests::sample_notify;
    use pretty_assertions::assert_eq;

    fn job(id: &str, clean_jobs: bool) -> StratumJob {
        let mut job = StratumJob::try_from(sample_notify(clean_jobs)).unwrap();
        job.job_id = id.to_string();
        job
    }

    #[test]
    fn test_validate_against_max_target() {
        let header = BlockHeader::from_bytes(&[0x42; 80]).unwrap();
        let validation = validate(&header, &Target::MAX);
        assert!(validation.accepted);
        assert_eq!(validation.hash, reverse_hash(&header.hash()));
    }

    #[test]
    fn test_validate_rejects_above_target() {
        let header = BlockHeader::from_bytes(&[0x42; 80]).unwrap();
        let validation = validate(&header, &Target::from_be_bytes([0u8; 32]));
        assert!(!validation.accepted);
        assert!(validation.difficulty() > 0.0);
    }

    #[test]
    fn test_validation_boundary() {
        let internal = [0x07u8; 32];
        let target = Target::from_be_bytes(reverse_hash(&internal));
        assert!(Validation::from_hash(&internal, &target).accepted);

        let mut lower = reverse_hash(&internal);
        lower[31] -= 1;
        assert!(!Validation::from_hash(&internal, &Target::from_be_bytes(lower)).accepted);
    }

    #[test]
    fn test_block_needs_network_target() {
        let internal = [0x07u8; 32];
        let exact = Target::from_be_bytes(reverse_hash(&internal));
        let mut lower = reverse_hash(&internal);
        lower[31] -= 1;
        let lower = Target::from_be_bytes(lower);

        let share = Validation::from_hash(&internal, &Target::MAX);
        assert!(!share.block);
        assert!(share.with_network(&exact).block);
        assert!(!share.with_network(&lower).block);

        // A rejected share is never a block.
        let rejected = Validation::from_hash(&internal, &lower).with_network(&Target::MAX);
        assert!(!rejected.accepted);
        assert!(!rejected.block);
    }

    #[test]
    fn test_validation_serializes_hash_hex() {
        let validation = Validation {
            accepted: true,
            block: false,
            hash: [0xab; 32],
        };
        let value = serde_json::to_value(validation).unwrap();
        assert_eq!(value["hash"], "ab".repeat(32));
        assert_eq!(value["accepted"], true);
        assert_eq!(value["block"], false);
    }

    #[test]
    fn test_clean_job_retires_earlier_work() {
        let board = WorkBoard::new();
        let first = board.publish(job("a", true));
        let second = board.publish(job("b", false));

        assert_eq!(first.generation, second.generation);
        assert!(board.check(&first).is_ok());
        assert!(board.check(&second).is_ok());

        let third = board.publish(job("c", true));
        assert_eq!(third.generation, first.generation + 1);

        assert_eq!(
            board.check(&first),
            Err(Error::StaleWork {
                job_id: "a".into()
            })
        );
        assert!(board.check_job("b").is_err());
        assert!(board.check(&third).is_ok());
        assert_eq!(board.stale_count(), 2);
        assert_eq!(board.current().unwrap().job_id, "c");
    }

    #[test]
    fn test_unknown_job_is_stale() {
        let board = WorkBoard::new();
        assert!(board.current().is_none());
        assert!(board.ticket("nope").is_err());
        assert_eq!(board.stale_count(), 1);
    }

    #[test]
    fn test_retains_bounded_history() {
        let board = WorkBoard::new();
        for i in 0..RETAINED_JOBS + 2 {
            board.publish(job(&i.to_string(), false));
        }
        assert!(board.check_job("0").is_err());
        assert!(board.check_job("1").is_err());
        assert!(board.check_job("2").is_ok());
        assert_eq!(
            board.ticket(&(RETAINED_JOBS + 1).to_string()).unwrap().generation,
            0
        );
    }

    #[test]
    fn test_republished_id_replaces_job() {
        let board = WorkBoard::new();
        board.publish(job("a", false));
        let mut updated = job("a", false);
        updated.time += 1;
        board.publish(updated.clone());

        assert_eq!(*board.check_job("a").unwrap(), updated);
    }
}
