//! Run stages and compute timing.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

/// Where a run is in its lifecycle.
///
/// Distributed runs go `Idle -> Scattered -> Computing -> Computed ->
/// Recombined -> Reported`. A single worker skips the collective stages and
/// goes `Idle -> Computing -> Computed -> Reported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Scattered,
    Computing,
    Computed,
    Recombined,
    Reported,
}

impl Stage {
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Idle, Scattered)
                | (Idle, Computing)
                | (Scattered, Computing)
                | (Computing, Computed)
                | (Computed, Recombined)
                | (Computed, Reported)
                | (Recombined, Reported)
        )
    }
}

/// Tracks one rank's progress through a run and times its compute phase.
#[derive(Debug)]
pub struct Harness {
    rank: usize,
    stage: Stage,
    elapsed: Option<Duration>,
}

impl Harness {
    pub fn new(rank: usize) -> Self {
        Harness {
            rank,
            stage: Stage::Idle,
            elapsed: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(Error::Stage {
                from: self.stage,
                to: next,
            });
        }
        debug!(rank = self.rank, from = ?self.stage, to = ?next, "stage");
        self.stage = next;
        Ok(())
    }

    /// Enters `Computing`, runs `compute`, and enters `Computed`. Only the
    /// closure is timed; any barrier belongs before this call.
    pub fn compute<R>(&mut self, compute: impl FnOnce() -> R) -> Result<R> {
        self.advance(Stage::Computing)?;
        let start = Instant::now();
        let output = compute();
        self.elapsed = Some(start.elapsed());
        self.advance(Stage::Computed)?;
        Ok(output)
    }

    /// This rank's compute time, once `Computed` has been reached.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributed_path_is_legal() {
        let mut harness = Harness::new(0);
        harness.advance(Stage::Scattered).unwrap();
        let value = harness.compute(|| 40 + 2).unwrap();
        harness.advance(Stage::Recombined).unwrap();
        harness.advance(Stage::Reported).unwrap();
        assert_eq!(value, 42);
        assert!(harness.elapsed().is_some());
    }

    #[test]
    fn solo_path_skips_collectives() {
        let mut harness = Harness::new(0);
        harness.compute(|| ()).unwrap();
        harness.advance(Stage::Reported).unwrap();
        assert_eq!(harness.stage(), Stage::Reported);
    }

    #[test]
    fn no_timing_before_compute() {
        let harness = Harness::new(2);
        assert_eq!(harness.elapsed(), None);
    }

    #[test]
    fn cannot_report_before_computing() {
        let mut harness = Harness::new(0);
        harness.advance(Stage::Scattered).unwrap();
        assert!(matches!(
            harness.advance(Stage::Reported),
            Err(Error::Stage {
                from: Stage::Scattered,
                to: Stage::Reported
            })
        ));
    }
}
