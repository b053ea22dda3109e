use crate::error::{Error, Result};

/// Rank of the process that owns the dataset and renders the report.
pub const COORDINATOR: usize = 0;

/// Where this process sits in the worker group. Captured once when a channel
/// is opened and handed to every stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    rank: usize,
    size: usize,
}

impl RunContext {
    pub fn new(rank: usize, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::NoWorkers);
        }
        if rank >= size {
            return Err(Error::Channel(format!(
                "rank {rank} is outside a group of {size}"
            )));
        }
        Ok(RunContext { rank, size })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of workers in the group.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }

    /// A single worker runs everything locally and never enters a collective.
    pub fn is_solo(&self) -> bool {
        self.size == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_is_rank_zero() {
        let ctx = RunContext::new(0, 4).unwrap();
        assert!(ctx.is_coordinator());
        assert!(!ctx.is_solo());

        let ctx = RunContext::new(3, 4).unwrap();
        assert!(!ctx.is_coordinator());
    }

    #[test]
    fn single_worker_is_solo() {
        assert!(RunContext::new(0, 1).unwrap().is_solo());
    }

    #[test]
    fn rejects_empty_group_and_stray_rank() {
        assert!(matches!(RunContext::new(0, 0), Err(Error::NoWorkers)));
        assert!(matches!(RunContext::new(4, 4), Err(Error::Channel(_))));
    }
}
