//! Glue between the command line and a balancer run.

use tracing::{debug, error};

use crate::balancer::Balancer;
use crate::channel::Collective;
use crate::config::{RunConfig, WorkloadKind};
use crate::context::COORDINATOR;
use crate::data;
use crate::error::{Error, Result};
use crate::report::Report;
use crate::workload::{Elementwise, Reduction};

/// Runs the configured workload on this rank.
///
/// Returns the rendered report on the coordinator and `None` elsewhere.
/// Datasets are only generated on the coordinator.
pub fn execute<C: Collective>(
    balancer: &Balancer<C>,
    config: &RunConfig,
) -> Result<Option<String>> {
    config.validate()?;
    let len = config.dataset_len()?;
    let coordinator = balancer.context().is_coordinator();

    match config.workload {
        WorkloadKind::Linear | WorkloadKind::Grid => {
            let workload = Elementwise::<f64>::new(config.operation()?, config.layout());
            let dataset = coordinator.then(|| data::float_operands(len, config.fill, config.seed));
            let operands = dataset
                .as_ref()
                .map(|(lhs, rhs)| [lhs.as_slice(), rhs.as_slice()]);

            let outcome = balancer.run(&workload, operands.as_ref().map(|o| &o[..]))?;
            Ok(Report::new(&outcome, config.preview).map(|report| report.to_string()))
        }
        WorkloadKind::Sum => {
            let workload = Reduction::new(config.reduce.into());
            let dataset = coordinator.then(|| data::integers(len, config.fill, config.seed));
            let operands = dataset.as_ref().map(|values| [values.as_slice()]);

            let outcome = balancer.run(&workload, operands.as_ref().map(|o| &o[..]))?;
            Ok(Report::new(&outcome, config.preview).map(|report| report.to_string()))
        }
    }
}

/// Logs a failed run. Every rank sees the same configuration error, so only
/// the coordinator reports it; the rest note it at debug level.
pub fn log_failure(rank: usize, error: &Error) {
    match error {
        Error::Aborted => debug!(rank, "run aborted by the coordinator"),
        e if rank == COORDINATOR => error!(error = %e, "run failed"),
        e => debug!(rank, error = %e, "worker stopped"),
    }
}
