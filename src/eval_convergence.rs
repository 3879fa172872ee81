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

use asim::prelude::*;
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};

/// Measure the convergence of random AS hierarchies, printing one JSON
/// report per run.
#[derive(Debug, Parser)]
struct Cli {
    /// Number of core ASes forming a full peer mesh
    #[clap(long, default_value = "5")]
    cores: usize,
    /// Number of transit ASes buying from the cores
    #[clap(long, default_value = "200")]
    transits: usize,
    /// Number of stub ASes buying from the transits
    #[clap(long, default_value = "2000")]
    stubs: usize,
    /// Seed of the topology generator. Run r uses seed + r.
    #[clap(short, long, default_value = "42")]
    seed: u64,
    /// Number of workers. Zero means one worker per available CPU.
    #[clap(short, long, default_value = "0")]
    workers: usize,
    /// Number of nodes a worker takes per unit of work
    #[clap(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Abort a run that needs more rounds than this
    #[clap(short = 'l', long)]
    round_limit: Option<usize>,
    /// Number of runs, each on a freshly generated topology
    #[clap(short, long, default_value = "1")]
    repeat: u64,
    /// Check all-pairs reachability after every run (slow)
    #[clap(long)]
    verify: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    let mut scheduler = Scheduler::new(args.workers)?;
    scheduler.set_block_size(args.block_size);
    scheduler.set_round_limit(args.round_limit);

    for run in 0..args.repeat {
        let mut rng = StdRng::seed_from_u64(args.seed + run);
        let mut net =
            Network::random_hierarchy(&mut rng, args.cores, args.transits, args.stubs)?;
        net.originate_all()?;
        log::info!(
            "run {}/{}: {} ASes, {} workers",
            run + 1,
            args.repeat,
            net.num_ases(),
            scheduler.workers()
        );

        let report = scheduler.drive_to_convergence(&mut net)?;

        if args.verify {
            let connected = net.verify_connected()?;
            if connected < 1.0 {
                log::warn!("only {:.2}% of all pairs are connected", connected * 100.0);
            }
        }

        println!("{}", serde_json::to_string(&report)?);
    }

    Ok(())
}
