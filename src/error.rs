use thiserror::Error;

use crate::harness::Stage;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("workload takes {expected} operand arrays, got {found}")]
    OperandCount { expected: usize, found: usize },

    #[error("operand arrays must have the same size: expected {expected} elements, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("dataset of {len} elements does not fill a {rows}x{cols} grid")]
    ShapeMismatch { len: usize, rows: usize, cols: usize },

    #[error("invalid operation {0:?}: expected one of + - * /")]
    InvalidOperation(String),

    /// The coordinator was asked to distribute without holding the dataset.
    #[error("dataset is missing on the coordinator")]
    MissingDataset,

    #[error("rank {rank} contributed {actual} elements, plan expects {expected}")]
    ShareLength {
        rank: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{0} elements exceed the collective count range")]
    CountOverflow(usize),

    /// Seen by non-coordinators when the coordinator rejected the run.
    #[error("run aborted by the coordinator")]
    Aborted,

    #[error("collective channel failure: {0}")]
    Channel(String),

    #[error("collect called before distribute")]
    NoPlan,

    #[error("illegal stage transition {from:?} -> {to:?}")]
    Stage { from: Stage, to: Stage },

    #[error("failed to initialize mpi")]
    Initialization,

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
