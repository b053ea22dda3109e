//! Collective channel over an mpi world communicator.
//!
//! Shares of different sizes move with the variable-count forms
//! (`MPI_Scatterv` / `MPI_Gatherv`), so every element reaches its owner no
//! matter whether the group size divides the dataset.

use std::sync::Arc;

use mpi::collective::SystemOperation;
use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;
use tracing::trace;

use super::{Collective, Element, ReduceOp, Reducible};
use crate::context::COORDINATOR;
use crate::error::{Error, Result};
use crate::plan::PartitionPlan;

/// One rank of an mpi job.
pub struct MpiChannel {
    // Finalizes mpi on drop, so it has to outlive the communicator.
    #[allow(unused)]
    universe: Arc<Universe>,
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

impl MpiChannel {
    /// Initializes mpi for this process.
    pub fn initialize() -> Result<Self> {
        let universe = mpi::initialize().ok_or(Error::Initialization)?;
        Ok(Self::new(Arc::new(universe)))
    }

    /// Opens a channel on an already initialized universe.
    pub fn new(universe: Arc<Universe>) -> Self {
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiChannel {
            universe,
            world,
            rank,
            size,
        }
    }

    fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    fn counts_and_displs(plan: &PartitionPlan) -> Result<(Vec<Count>, Vec<Count>)> {
        let convert = |n: usize| Count::try_from(n).map_err(|_| Error::CountOverflow(n));
        let counts = plan
            .shares()
            .iter()
            .map(|share| convert(share.len))
            .collect::<Result<Vec<_>>>()?;
        let displs = plan
            .shares()
            .iter()
            .map(|share| convert(share.offset))
            .collect::<Result<Vec<_>>>()?;
        Ok((counts, displs))
    }
}

fn system_op(op: ReduceOp) -> SystemOperation {
    match op {
        ReduceOp::Sum => SystemOperation::sum(),
        ReduceOp::Max => SystemOperation::max(),
        ReduceOp::Min => SystemOperation::min(),
    }
}

impl Collective for MpiChannel {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    fn broadcast<T: Element>(&self, values: &mut [T]) -> Result<()> {
        let root = self.world.process_at_rank(COORDINATOR as Count);
        root.broadcast_into(values);
        Ok(())
    }

    fn scatter<T: Element>(&self, data: Option<&[T]>, plan: &PartitionPlan) -> Result<Vec<T>> {
        let share = plan
            .share(self.rank)
            .ok_or_else(|| Error::Channel(format!("plan has no share for rank {}", self.rank)))?;
        let mut local = vec![T::default(); share.len];
        let root = self.world.process_at_rank(COORDINATOR as Count);

        if self.is_coordinator() {
            // Validation failures here happen before the collective and would
            // leave the other ranks blocked in it; callers check up front.
            let data = data.ok_or(Error::MissingDataset)?;
            if data.len() != plan.total() {
                return Err(Error::LengthMismatch {
                    expected: plan.total(),
                    found: data.len(),
                });
            }
            let (counts, displs) = Self::counts_and_displs(plan)?;
            let partition = Partition::new(data, counts, displs);
            root.scatter_varcount_into_root(&partition, &mut local[..]);
        } else {
            root.scatter_varcount_into(&mut local[..]);
        }

        trace!(rank = self.rank, len = local.len(), "scatter received");
        Ok(local)
    }

    fn gather<T: Element>(&self, local: &[T], plan: &PartitionPlan) -> Result<Option<Vec<T>>> {
        let root = self.world.process_at_rank(COORDINATOR as Count);
        let len = local.len() as u64;

        // Lengths go first. A share that does not fit its plan entry fails
        // every rank here instead of reaching the variable-count gather.
        if self.is_coordinator() {
            let mut lens = vec![0u64; self.size];
            root.gather_into_root(&len, &mut lens[..]);
            let checked = lens
                .iter()
                .map(|&n| usize::try_from(n).map_err(|_| Error::CountOverflow(usize::MAX)))
                .collect::<Result<Vec<_>>>()
                .and_then(|lens| plan.check_lengths(&lens))
                .and_then(|()| Self::counts_and_displs(plan));
            let mut accepted = [u8::from(checked.is_ok())];
            root.broadcast_into(&mut accepted[..]);
            let (counts, displs) = checked?;

            let mut whole = vec![T::default(); plan.total()];
            {
                let mut partition = PartitionMut::new(&mut whole[..], counts, displs);
                root.gather_varcount_into_root(local, &mut partition);
            }
            trace!(len = whole.len(), "gathered");
            Ok(Some(whole))
        } else {
            root.gather_into(&len);
            let mut accepted = [0u8];
            root.broadcast_into(&mut accepted[..]);
            if accepted[0] == 0 {
                return Err(Error::Aborted);
            }
            root.gather_varcount_into(local);
            Ok(None)
        }
    }

    fn reduce<T: Reducible>(&self, local: T, op: ReduceOp) -> Result<Option<T>> {
        let root = self.world.process_at_rank(COORDINATOR as Count);

        if self.is_coordinator() {
            let mut combined = T::identity(op);
            root.reduce_into_root(&local, &mut combined, system_op(op));
            Ok(Some(combined))
        } else {
            root.reduce_into(&local, system_op(op));
            Ok(None)
        }
    }
}
