//! The pieces of a run that change between workloads: how many operand
//! arrays go out, what each worker computes, and how partials come back.

use std::fmt;
use std::marker::PhantomData;

use tracing::{debug_span, warn};

use crate::channel::{Collective, Element, ReduceOp};
use crate::error::{Error, Result};
use crate::kernel::{self, Arith, Operation};
use crate::plan::{PartitionPlan, Share};

/// A distributable computation.
///
/// The balancer scatters `operands()` arrays of `Elem`, calls `compute` once
/// per worker on its shares, and hands the partial to `recombine`. With a
/// single worker the partial goes to `finish` instead and no collective runs.
pub trait Workload: Sync {
    type Elem: Element;
    type Partial: Send;
    type Output;

    /// Number of same-length operand arrays the workload consumes.
    fn operands(&self) -> usize;

    /// Rejects datasets the workload cannot use. Runs on the coordinator
    /// before anything moves.
    fn validate(&self, _len: usize) -> Result<()> {
        Ok(())
    }

    /// Describes the run for the report, e.g. `+ operation`.
    fn label(&self) -> String;

    fn compute(&self, shares: &[&[Self::Elem]], rank: usize, share: Share) -> Self::Partial;

    fn recombine<C: Collective>(
        &self,
        channel: &C,
        plan: &PartitionPlan,
        partial: Self::Partial,
    ) -> Result<Option<Self::Output>>;

    fn finish(&self, partial: Self::Partial) -> Self::Output;
}

/// How an elementwise dataset is shaped. The data is always flat and
/// row-major; the grid shape only constrains its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Linear,
    Grid { rows: usize, cols: usize },
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Linear => Ok(()),
            Layout::Grid { rows, cols } => write!(f, " on a {rows}x{cols} grid"),
        }
    }
}

/// Binary elementwise operation; gathered back in full at the coordinator.
#[derive(Debug, Clone, Copy)]
pub struct Elementwise<T> {
    op: Operation,
    layout: Layout,
    _elem: PhantomData<fn() -> T>,
}

impl<T: Arith> Elementwise<T> {
    pub fn new(op: Operation, layout: Layout) -> Self {
        Elementwise {
            op,
            layout,
            _elem: PhantomData,
        }
    }

    /// Builds from a raw selector such as `'+'`.
    pub fn from_symbol(symbol: char, layout: Layout) -> Result<Self> {
        Ok(Self::new(Operation::from_symbol(symbol)?, layout))
    }

    pub fn operation(&self) -> Operation {
        self.op
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl<T: Arith> Workload for Elementwise<T> {
    type Elem = T;
    type Partial = Vec<T>;
    type Output = Vec<T>;

    fn operands(&self) -> usize {
        2
    }

    fn validate(&self, len: usize) -> Result<()> {
        match self.layout {
            Layout::Grid { rows, cols } if rows.checked_mul(cols) != Some(len) => {
                Err(Error::ShapeMismatch { len, rows, cols })
            }
            _ => Ok(()),
        }
    }

    fn label(&self) -> String {
        format!("{} operation{}", self.op, self.layout)
    }

    fn compute(&self, shares: &[&[T]], rank: usize, share: Share) -> Vec<T> {
        let _span = debug_span!("kernel", rank, offset = share.offset).entered();
        // Both shares were scattered with the same plan entry.
        let out = kernel::pairwise(self.op, shares[0], shares[1]);
        for &index in &out.zero_divisions {
            warn!(
                rank,
                index,
                global_index = share.offset + index,
                "division by zero, element set to 0"
            );
        }
        out.values
    }

    fn recombine<C: Collective>(
        &self,
        channel: &C,
        plan: &PartitionPlan,
        partial: Vec<T>,
    ) -> Result<Option<Vec<T>>> {
        channel.gather(&partial, plan)
    }

    fn finish(&self, partial: Vec<T>) -> Vec<T> {
        partial
    }
}

/// Folds a single integer array into one scalar at the coordinator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reduction {
    op: ReduceOp,
}

impl Reduction {
    pub fn new(op: ReduceOp) -> Self {
        Reduction { op }
    }

    pub fn sum() -> Self {
        Reduction::new(ReduceOp::Sum)
    }

    pub fn op(&self) -> ReduceOp {
        self.op
    }
}

impl Workload for Reduction {
    type Elem = i32;
    type Partial = i64;
    type Output = i64;

    fn operands(&self) -> usize {
        1
    }

    fn label(&self) -> String {
        self.op.to_string()
    }

    fn compute(&self, shares: &[&[i32]], _rank: usize, _share: Share) -> i64 {
        kernel::fold_partial(shares[0], self.op)
    }

    fn recombine<C: Collective>(
        &self,
        channel: &C,
        _plan: &PartitionPlan,
        partial: i64,
    ) -> Result<Option<i64>> {
        channel.reduce(partial, self.op)
    }

    fn finish(&self, partial: i64) -> i64 {
        partial
    }
}
