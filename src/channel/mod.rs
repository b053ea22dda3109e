//! Typed collective channels.
//!
//! A [`Collective`] is the only way workers talk to each other. Every method
//! is a blocking collective: all ranks must call the same methods in the same
//! order, and a rank that skips one leaves the others waiting forever. Values
//! that only exist on the coordinator come back as `Option`, `None` on every
//! other rank.

use std::fmt;

use crate::error::Result;
use crate::plan::PartitionPlan;

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;

pub use self::local::{LocalCluster, ThreadChannel};
#[cfg(feature = "mpi")]
pub use self::mpi::MpiChannel;

#[cfg(feature = "mpi")]
use ::mpi::datatype::Equivalence;

/// Plain-old-data element that can cross a channel.
#[cfg(not(feature = "mpi"))]
pub trait Element: Copy + Default + Send + Sync + 'static {}

#[cfg(not(feature = "mpi"))]
impl<T: Copy + Default + Send + Sync + 'static> Element for T {}

/// Plain-old-data element that can cross a channel.
#[cfg(feature = "mpi")]
pub trait Element: Copy + Default + Send + Sync + 'static + Equivalence {}

#[cfg(feature = "mpi")]
impl<T: Copy + Default + Send + Sync + 'static + Equivalence> Element for T {}

/// How partial scalars are folded into one at the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReduceOp {
    #[default]
    Sum,
    Max,
    Min,
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
        };
        f.write_str(name)
    }
}

/// Scalars that can be combined by a [`ReduceOp`].
pub trait Reducible: Element {
    /// Value an empty share contributes.
    fn identity(op: ReduceOp) -> Self;

    fn combine(self, other: Self, op: ReduceOp) -> Self;
}

macro_rules! reducible_int {
    ($($t:ty),*) => {$(
        impl Reducible for $t {
            fn identity(op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => 0,
                    ReduceOp::Max => <$t>::MIN,
                    ReduceOp::Min => <$t>::MAX,
                }
            }

            fn combine(self, other: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => self + other,
                    ReduceOp::Max => self.max(other),
                    ReduceOp::Min => self.min(other),
                }
            }
        }
    )*};
}

macro_rules! reducible_float {
    ($($t:ty),*) => {$(
        impl Reducible for $t {
            fn identity(op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => 0.0,
                    ReduceOp::Max => <$t>::NEG_INFINITY,
                    ReduceOp::Min => <$t>::INFINITY,
                }
            }

            fn combine(self, other: Self, op: ReduceOp) -> Self {
                match op {
                    ReduceOp::Sum => self + other,
                    ReduceOp::Max => self.max(other),
                    ReduceOp::Min => self.min(other),
                }
            }
        }
    )*};
}

reducible_int!(i32, i64, u32, u64);
reducible_float!(f32, f64);

/// Collective operations rooted at the coordinator.
pub trait Collective {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Blocks until every rank has arrived.
    fn barrier(&self) -> Result<()>;

    /// Overwrites `values` on every rank with the coordinator's copy.
    fn broadcast<T: Element>(&self, values: &mut [T]) -> Result<()>;

    /// Hands each rank its plan share of `data`. `data` is read on the
    /// coordinator only and must hold `plan.total()` elements there.
    fn scatter<T: Element>(&self, data: Option<&[T]>, plan: &PartitionPlan) -> Result<Vec<T>>;

    /// Inverse of [`Collective::scatter`]. The reassembled sequence is only
    /// returned on the coordinator.
    fn gather<T: Element>(&self, local: &[T], plan: &PartitionPlan) -> Result<Option<Vec<T>>>;

    /// Folds one scalar per rank into a single value on the coordinator.
    fn reduce<T: Reducible>(&self, local: T, op: ReduceOp) -> Result<Option<T>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_are_neutral() {
        for op in [ReduceOp::Sum, ReduceOp::Max, ReduceOp::Min] {
            assert_eq!(7i64.combine(i64::identity(op), op), 7);
            assert_eq!(2.5f64.combine(f64::identity(op), op), 2.5);
        }
    }

    #[test]
    fn combine_follows_op() {
        assert_eq!(3i32.combine(9, ReduceOp::Sum), 12);
        assert_eq!(3i32.combine(9, ReduceOp::Max), 9);
        assert_eq!(3i32.combine(9, ReduceOp::Min), 3);
    }
}
