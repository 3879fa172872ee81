// ASim: AS-level BGP route propagation simulator written in Rust
// Copyright (C) 2023-2024 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Round-based parallel convergence.
//!
//! A convergence run alternates between two kinds of rounds. In a
//! processing round every node drains its mailbox and updates its tables.
//! In an advertising round every node with unexported changes fires its
//! timer and the resulting updates land in the receiving mailboxes. Rounds
//! are separated by a full barrier, so a round never observes updates sent
//! within itself. This makes the outcome independent of the number of
//! workers.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::mailbox::Mailboxes;
use crate::network::Network;
use crate::node::AsNode;
use crate::types::NetworkError;

/// Number of nodes a worker takes per unit of work.
pub const DEFAULT_BLOCK_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Process,
    Advertise,
}

/// Shared flag to stop a running convergence from another thread.
///
/// The flag is checked between rounds, so stopping takes effect at the
/// next round boundary.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// New token, not yet stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the convergence run holding this token to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether the token was stopped.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of a finished convergence run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Total number of rounds.
    pub rounds: usize,
    /// Number of processing rounds.
    pub process_rounds: usize,
    /// Number of advertising rounds.
    pub advertise_rounds: usize,
    /// Number of updates delivered during the run.
    pub delivered: u64,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

/// Drives a network to convergence with a pool of workers.
///
/// The scheduler owns its worker pool, so several schedulers with
/// different worker counts can coexist in one process.
pub struct Scheduler {
    pool: ThreadPool,
    workers: usize,
    block_size: usize,
    round_limit: Option<usize>,
    stop: Option<StopToken>,
}

impl Scheduler {
    /// New scheduler with the given number of workers. Zero means one
    /// worker per available CPU.
    pub fn new(workers: usize) -> Result<Self, NetworkError> {
        let workers = if workers == 0 {
            num_cpus::get()
        } else {
            workers
        };
        let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
        Ok(Self {
            pool,
            workers,
            block_size: DEFAULT_BLOCK_SIZE,
            round_limit: None,
            stop: None,
        })
    }

    /// Number of workers of this scheduler.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Change the number of nodes a worker takes per unit of work.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size.max(1);
    }

    /// Abort a run with [`NetworkError::NoConvergence`] once it needs more
    /// than `limit` rounds. `None` removes the limit.
    pub fn set_round_limit(&mut self, limit: Option<usize>) {
        self.round_limit = limit;
    }

    /// Attach a stop token that can interrupt a run between rounds.
    pub fn stop_token(&mut self, token: StopToken) {
        self.stop = Some(token);
    }

    /// Run rounds until no mailbox holds an update and no node has an
    /// unexported change. At least one round always runs.
    ///
    /// A node error aborts the whole run and leaves the network in the
    /// partially processed state of the failing round. Errors of this kind
    /// mean the topology itself is broken, so there is nothing sensible to
    /// resume.
    pub fn drive_to_convergence(
        &self,
        net: &mut Network,
    ) -> Result<ConvergenceReport, NetworkError> {
        let start = Instant::now();
        let delivered_before = net.mailboxes.delivered();
        let Network { nodes, mailboxes } = net;
        let mailboxes: &Mailboxes = mailboxes;
        let mut lanes: Vec<&mut AsNode> = nodes.values_mut().filter(|n| !n.is_purged()).collect();
        lanes.sort_unstable_by_key(|n| n.asn());
        debug!(
            "driving {} nodes to convergence with {} workers",
            lanes.len(),
            self.workers
        );

        let mut phase = Phase::Process;
        let mut rounds = 0usize;
        let mut process_rounds = 0usize;
        let mut advertise_rounds = 0usize;

        loop {
            if let Some(stop) = &self.stop {
                if stop.is_stopped() {
                    return Err(NetworkError::Interrupted);
                }
            }
            if let Some(limit) = self.round_limit {
                if rounds >= limit {
                    return Err(NetworkError::NoConvergence(limit));
                }
            }

            let phase_now = phase;
            self.pool.install(|| {
                lanes
                    .par_chunks_mut(self.block_size)
                    .try_for_each(|chunk| {
                        for node in chunk {
                            match phase_now {
                                Phase::Process => {
                                    let inbox = mailboxes.inbox(node.asn())?;
                                    node.process_all_pending(inbox)?;
                                }
                                Phase::Advertise => {
                                    let deliveries = node.fire_timer_and_advertise()?;
                                    mailboxes.deliver_all(deliveries)?;
                                }
                            }
                        }
                        Ok::<(), NetworkError>(())
                    })
            })?;
            rounds += 1;
            match phase_now {
                Phase::Process => process_rounds += 1,
                Phase::Advertise => advertise_rounds += 1,
            }

            let mut pending = false;
            let mut dirty = false;
            for node in &lanes {
                if !pending && !mailboxes.inbox(node.asn())?.is_empty() {
                    pending = true;
                }
                if !dirty && node.is_dirty() {
                    dirty = true;
                }
                if pending && dirty {
                    break;
                }
            }
            debug!("round {rounds} ({phase_now:?}) done: pending={pending}, dirty={dirty}");

            if pending {
                phase = Phase::Process;
            } else if dirty {
                phase = Phase::Advertise;
            } else {
                break;
            }
        }

        let report = ConvergenceReport {
            rounds,
            process_rounds,
            advertise_rounds,
            delivered: mailboxes.delivered() - delivered_before,
            duration: start.elapsed(),
        };
        info!(
            "converged after {} rounds ({} processing, {} advertising), {} updates in {:?}",
            report.rounds,
            report.process_rounds,
            report.advertise_rounds,
            report.delivered,
            report.duration,
        );
        Ok(report)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("workers", &self.workers)
            .field("block_size", &self.block_size)
            .field("round_limit", &self.round_limit)
            .finish()
    }
}
