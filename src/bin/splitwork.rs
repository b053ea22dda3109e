use std::process::ExitCode;

use clap::Parser;
use splitwork::config::Cli;
use splitwork::{logging, runner, Balancer, Result, COORDINATOR};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let (rank, result) = launch(&cli);
    match result {
        Ok(Some(report)) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            runner::log_failure(rank, &e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "mpi")]
fn launch(cli: &Cli) -> (usize, Result<Option<String>>) {
    use splitwork::{Collective, MpiChannel};

    let channel = match MpiChannel::initialize() {
        Ok(channel) => channel,
        Err(e) => return (COORDINATOR, Err(e)),
    };
    let rank = channel.rank();
    let result =
        Balancer::new(channel).and_then(|balancer| runner::execute(&balancer, &cli.run));
    (rank, result)
}

#[cfg(not(feature = "mpi"))]
fn launch(cli: &Cli) -> (usize, Result<Option<String>>) {
    use std::num::NonZeroUsize;

    use splitwork::LocalCluster;

    let workers = cli
        .run
        .workers
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, NonZeroUsize::get));
    let cluster = match LocalCluster::new(workers) {
        Ok(cluster) => cluster,
        Err(e) => return (COORDINATOR, Err(e)),
    };

    let mut results = cluster.run(|channel| {
        Balancer::new(channel).and_then(|balancer| runner::execute(&balancer, &cli.run))
    });
    for (rank, result) in results.iter().enumerate().skip(1) {
        if let Err(e) = result {
            runner::log_failure(rank, e);
        }
    }
    (COORDINATOR, results.swap_remove(COORDINATOR))
}
