//! Coordinator-side dataset generation.

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How generated operands are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Fill {
    /// `1.0` and `2.0` for elementwise operands, `1` for reduction input.
    #[default]
    Constant,
    /// Uniform values; reproducible when a seed is given.
    Random,
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Left and right operands for an elementwise run.
///
/// Random right-hand values are whole numbers in `[0, 10)`, so divide runs
/// hit the zero-divisor path.
pub fn float_operands(len: usize, fill: Fill, seed: Option<u64>) -> (Vec<f64>, Vec<f64>) {
    match fill {
        Fill::Constant => (vec![1.0; len], vec![2.0; len]),
        Fill::Random => {
            let mut rng = rng(seed);
            let lhs = (0..len).map(|_| rng.gen_range(0.0..100.0)).collect();
            let rhs = (0..len).map(|_| f64::from(rng.gen_range(0..10u8))).collect();
            (lhs, rhs)
        }
    }
}

/// Input for a reduction run. Random values fall in `[0, 100)`.
pub fn integers(len: usize, fill: Fill, seed: Option<u64>) -> Vec<i32> {
    match fill {
        Fill::Constant => vec![1; len],
        Fill::Random => {
            let mut rng = rng(seed);
            (0..len).map(|_| rng.gen_range(0..100)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_fill_matches_reference_values() {
        let (a, b) = float_operands(3, Fill::Constant, None);
        assert_eq!(a, vec![1.0; 3]);
        assert_eq!(b, vec![2.0; 3]);
        assert_eq!(integers(4, Fill::Constant, None), vec![1; 4]);
    }

    #[test]
    fn seeded_fill_is_reproducible() {
        assert_eq!(
            float_operands(50, Fill::Random, Some(7)),
            float_operands(50, Fill::Random, Some(7))
        );
        let values = integers(500, Fill::Random, Some(11));
        assert_eq!(values, integers(500, Fill::Random, Some(11)));
        assert!(values.iter().all(|v| (0..100).contains(v)));
    }
}
