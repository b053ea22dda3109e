//! Local compute kernels. Nothing in here communicates; each call sees one
//! worker's share and nothing else.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;

use crate::channel::{Element, ReduceOp, Reducible};
use crate::error::{Error, Result};

/// Elementwise binary operation, selected by its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub fn symbol(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '*',
            Operation::Divide => '/',
        }
    }

    pub fn from_symbol(symbol: char) -> Result<Self> {
        match symbol {
            '+' => Ok(Operation::Add),
            '-' => Ok(Operation::Subtract),
            '*' => Ok(Operation::Multiply),
            '/' => Ok(Operation::Divide),
            other => Err(Error::InvalidOperation(other.to_string())),
        }
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(symbol), None) => Operation::from_symbol(symbol),
            _ => Err(Error::InvalidOperation(s.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Numbers the elementwise kernel can work on.
///
/// `apply` never panics: a zero divisor yields zero, and integer overflow
/// wraps, so one bad element cannot take a rank out of a collective.
pub trait Arith: Element + PartialEq {
    fn apply(self, op: Operation, rhs: Self) -> Self;

    fn is_zero(self) -> bool;
}

macro_rules! arith_int {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            fn apply(self, op: Operation, rhs: Self) -> Self {
                match op {
                    Operation::Add => self.wrapping_add(rhs),
                    Operation::Subtract => self.wrapping_sub(rhs),
                    Operation::Multiply => self.wrapping_mul(rhs),
                    Operation::Divide if rhs == 0 => 0,
                    Operation::Divide => self.wrapping_div(rhs),
                }
            }

            fn is_zero(self) -> bool {
                self == 0
            }
        }
    )*};
}

macro_rules! arith_float {
    ($($t:ty),*) => {$(
        impl Arith for $t {
            fn apply(self, op: Operation, rhs: Self) -> Self {
                match op {
                    Operation::Add => self + rhs,
                    Operation::Subtract => self - rhs,
                    Operation::Multiply => self * rhs,
                    Operation::Divide if rhs == 0.0 => 0.0,
                    Operation::Divide => self / rhs,
                }
            }

            fn is_zero(self) -> bool {
                self == 0.0
            }
        }
    )*};
}

arith_int!(i32, i64, u32, u64);
arith_float!(f32, f64);

/// Result of one elementwise kernel call.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelOutput<T> {
    pub values: Vec<T>,
    /// Local indices whose divisor was exactly zero, ascending.
    pub zero_divisions: Vec<usize>,
}

/// Applies `op` pairwise over two equally long shares.
pub fn elementwise<T: Arith>(op: Operation, lhs: &[T], rhs: &[T]) -> Result<KernelOutput<T>> {
    if lhs.len() != rhs.len() {
        return Err(Error::LengthMismatch {
            expected: lhs.len(),
            found: rhs.len(),
        });
    }
    Ok(pairwise(op, lhs, rhs))
}

/// Unchecked form of [`elementwise`] for shares cut from one plan entry.
/// Pairs past the shorter side are dropped.
///
/// A zero divisor yields zero for that element and is listed in
/// `zero_divisions`; the rest of the share is unaffected. Reporting those
/// indices is up to the caller, which knows where the share sits.
pub fn pairwise<T: Arith>(op: Operation, lhs: &[T], rhs: &[T]) -> KernelOutput<T> {
    let values: Vec<T> = lhs
        .par_iter()
        .zip(rhs.par_iter())
        .map(|(&a, &b)| a.apply(op, b))
        .collect();

    let zero_divisions: Vec<usize> = if op == Operation::Divide {
        rhs[..values.len()]
            .par_iter()
            .enumerate()
            .filter(|&(_, &b)| b.is_zero())
            .map(|(index, _)| index)
            .collect()
    } else {
        Vec::new()
    };

    KernelOutput {
        values,
        zero_divisions,
    }
}

/// Folds a share of integers into one wide partial.
pub fn fold_partial(share: &[i32], op: ReduceOp) -> i64 {
    share
        .par_iter()
        .map(|&x| i64::from(x))
        .fold(|| i64::identity(op), |acc, x| acc.combine(x, op))
        .reduce(|| i64::identity(op), |a, b| a.combine(b, op))
}
