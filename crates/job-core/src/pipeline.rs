//! Job pipeline: from `mining.notify` to prepared work, chip frames and
//! checked shares.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::coinbase::CoinbaseBuilder;
use crate::config::PipelineConfig;
use crate::difficulty::Target;
use crate::error::{Error, Result};
use crate::extranonce::{ExtraNonce, Extranonce2Allocator};
use crate::frame::{self, ChipJobIds, NonceResponse};
use crate::header::{self, BlockHeader};
use crate::job::{Notify, Share, StratumJob, Submit};
use crate::midstate::Midstate;
use crate::share::{validate, Validation, WorkBoard, WorkTicket};

/// Everything a lane needs for one `(job, extranonce2)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWork {
    pub ticket: WorkTicket,
    pub extranonce2: u64,
    /// Header with nonce zero and the job's own version.
    pub header: BlockHeader,
    /// Header versions, one per midstate. The first is the job version.
    pub versions: Vec<u32>,
    pub midstates: Vec<Midstate>,
    pub target: Target,
}

impl PreparedWork {
    /// Midstate of the unrolled header.
    pub fn midstate(&self) -> &Midstate {
        &self.midstates[0]
    }

    /// Share for a nonce found under midstate `index`.
    pub fn share(&self, nonce: u32, index: usize) -> Result<Share> {
        let version = *self
            .versions
            .get(index)
            .ok_or(Error::Response("midstate index out of range"))?;
        let version_bits = version ^ self.versions[0];

        Ok(Share {
            job_id: self.ticket.job_id.clone(),
            extranonce2: self.extranonce2,
            ntime: self.header.time(),
            nonce,
            version_bits: (version_bits != 0).then_some(version_bits),
        })
    }
}

/// The job new work is prepared for, with its own extranonce2 counter.
///
/// Swapped as a whole on each notify, so a lane never pairs one job with
/// another job's counter.
#[derive(Debug)]
struct LiveJob {
    job: Arc<StratumJob>,
    ticket: WorkTicket,
    allocator: Arc<Extranonce2Allocator>,
}

/// Work sent to the chip and the nonces it has reported for it so far.
#[derive(Debug)]
struct Dispatched {
    work: Arc<PreparedWork>,
    reported: HashSet<(u32, u8)>,
}

/// One pool connection's pipeline.
///
/// Shared by reference between lanes: preparing work, dispatching frames and
/// checking shares all take `&self`.
#[derive(Debug)]
pub struct JobPipeline {
    config: PipelineConfig,
    extranonce: ExtraNonce,
    board: WorkBoard,
    live: RwLock<Option<Arc<LiveJob>>>,
    target: RwLock<Target>,
    version_mask: AtomicU32,
    chip_ids: Mutex<ChipJobIds>,
    dispatched: Mutex<HashMap<u8, Dispatched>>,
}

impl JobPipeline {
    pub fn new(config: PipelineConfig, extranonce1: Vec<u8>) -> Result<Self> {
        config.validate()?;
        let target = Target::from_pool_difficulty(config.pool_difficulty)?;

        Ok(JobPipeline {
            extranonce: ExtraNonce::new(extranonce1, config.extranonce2_size),
            board: WorkBoard::new(),
            live: RwLock::new(None),
            target: RwLock::new(target),
            version_mask: AtomicU32::new(config.version_mask),
            chip_ids: Mutex::new(ChipJobIds::new()),
            dispatched: Mutex::new(HashMap::new()),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extranonce(&self) -> &ExtraNonce {
        &self.extranonce
    }

    pub fn board(&self) -> &WorkBoard {
        &self.board
    }

    pub fn target(&self) -> Target {
        *self.target.read()
    }

    /// Accept a `mining.notify` and make it the current job.
    ///
    /// A new job id gets a fresh extranonce2 counter; a republished id keeps
    /// its counter so no `(job_id, extranonce2)` pair is issued twice.
    pub fn on_notify(&self, notify: &Notify) -> Result<WorkTicket> {
        let job = StratumJob::try_from(notify)?;

        let mut live = self.live.write();
        if job.clean_jobs {
            self.dispatched.lock().clear();
        }
        let allocator = live
            .as_ref()
            .filter(|current| current.job.job_id == job.job_id)
            .map(|current| Arc::clone(&current.allocator))
            .unwrap_or_else(|| Arc::new(Extranonce2Allocator::new(self.config.extranonce2_size)));

        let ticket = self.board.publish(job);
        *live = Some(Arc::new(LiveJob {
            job: self.board.check(&ticket)?,
            ticket: ticket.clone(),
            allocator,
        }));
        Ok(ticket)
    }

    /// `mining.set_difficulty`.
    pub fn set_difficulty(&self, difficulty: u64) -> Result<()> {
        let target = Target::from_pool_difficulty(difficulty)?;
        tracing::debug!(difficulty, %target, "share target updated");
        self.set_target(target);
        Ok(())
    }

    pub fn set_target(&self, target: Target) {
        *self.target.write() = target;
    }

    /// `mining.set_version_mask`. Applies to work prepared afterwards.
    pub fn set_version_mask(&self, mask: u32) {
        self.version_mask.store(mask, Ordering::Relaxed);
    }

    /// Allocate the next extranonce2 for the current job and build its work.
    pub fn prepare(&self) -> Result<PreparedWork> {
        let live = self.live.read().clone().ok_or(Error::NoJob)?;
        let (job, ticket) = (&live.job, live.ticket.clone());
        let extranonce2 = live.allocator.next()?;

        let coinbase = CoinbaseBuilder::new(&job.coinbase_prefix, &job.coinbase_suffix)
            .build(&self.extranonce, extranonce2)?;
        let header = header::assemble(job, &coinbase.hash, 0)?;

        let mask = self.version_mask.load(Ordering::Relaxed);
        let count = if mask == 0 {
            1
        } else {
            self.config.frame.midstate_slots
        };
        let versions = header::rolled_versions(job.version, mask, count);
        let midstates = versions
            .iter()
            .map(|version| Midstate::compute(&header.with_version(*version)))
            .collect();

        tracing::debug!(
            job_id = %ticket.job_id,
            extranonce2,
            midstates = count,
            "prepared work"
        );

        Ok(PreparedWork {
            ticket,
            extranonce2,
            header,
            versions,
            midstates,
            target: self.target(),
        })
    }

    /// Encode work as a chip job frame and remember it under its chip job id.
    pub fn dispatch(&self, work: PreparedWork) -> Result<Vec<u8>> {
        let chip_job_id = self.chip_ids.lock().next_id();
        let frame = frame::encode(&self.config.frame, chip_job_id, &work.header, &work.midstates)?;
        self.dispatched.lock().insert(
            chip_job_id,
            Dispatched {
                work: Arc::new(work),
                reported: HashSet::new(),
            },
        );
        Ok(frame)
    }

    /// Turn a chip nonce response into a share for the work it belongs to.
    ///
    /// Chips report some nonces more than once; a repeat for the same job and
    /// midstate is a `DuplicateNonce` error.
    pub fn on_nonce(&self, response: &[u8]) -> Result<Share> {
        let response = NonceResponse::parse(response)?;
        let work = {
            let mut dispatched = self.dispatched.lock();
            let entry = dispatched
                .get_mut(&response.chip_job_id)
                .ok_or(Error::Response("unknown chip job id"))?;
            if !entry
                .reported
                .insert((response.nonce, response.midstate_index))
            {
                tracing::debug!(
                    nonce = response.nonce,
                    chip_job_id = response.chip_job_id,
                    "ignoring repeated nonce"
                );
                return Err(Error::DuplicateNonce {
                    nonce: response.nonce,
                    chip_job_id: response.chip_job_id,
                });
            }
            Arc::clone(&entry.work)
        };

        self.board.check(&work.ticket)?;
        work.share(response.nonce, usize::from(response.midstate_index))
    }

    /// Rebuild the share's header and check it against the share target.
    ///
    /// Shares for retired jobs fail with `StaleWork`; a hash above the target
    /// is a rejected `Validation`. Accepted shares are also compared with the
    /// job's network target.
    pub fn check_share(&self, share: &Share) -> Result<Validation> {
        let job = self.board.check_job(&share.job_id)?;
        let coinbase = CoinbaseBuilder::new(&job.coinbase_prefix, &job.coinbase_suffix)
            .build(&self.extranonce, share.extranonce2)?;
        let header = header::assemble(&job, &coinbase.hash, share.nonce)?
            .with_time(share.ntime)
            .with_version(share.version(job.version));

        let network = Target::from_compact(job.bits)?;
        let validation = validate(&header, &self.target()).with_network(&network);
        if validation.block {
            tracing::info!(
                job_id = %share.job_id,
                nonce = share.nonce,
                hash = %validation.hash_hex(),
                "share meets network target"
            );
        } else if validation.accepted {
            tracing::info!(
                job_id = %share.job_id,
                nonce = share.nonce,
                difficulty = validation.difficulty(),
                "share accepted"
            );
        } else {
            tracing::debug!(job_id = %share.job_id, nonce = share.nonce, "share below target");
        }
        Ok(validation)
    }

    /// `mining.submit` params for a share.
    pub fn submission(&self, worker: &str, share: &Share) -> Result<Submit> {
        Submit::new(worker, share, &self.extranonce)
    }
}
