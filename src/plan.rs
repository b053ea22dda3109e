use std::ops::Range;

use crate::error::{Error, Result};

/// One worker's contiguous slice of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Share {
    pub offset: usize,
    pub len: usize,
}

impl Share {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// How `total` elements are dealt out to a fixed number of workers.
///
/// Shares are contiguous and ordered by rank. Every share holds either
/// `total / workers` or one more element, and the first `total % workers`
/// ranks take the larger size, so no two workers differ by more than one
/// element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    total: usize,
    shares: Vec<Share>,
}

impl PartitionPlan {
    pub fn new(total: usize, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::NoWorkers);
        }

        let base = total / workers;
        let remainder = total % workers;

        let mut offset = 0;
        let shares = (0..workers)
            .map(|rank| {
                let len = base + usize::from(rank < remainder);
                let share = Share { offset, len };
                offset += len;
                share
            })
            .collect();

        Ok(PartitionPlan { total, shares })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn workers(&self) -> usize {
        self.shares.len()
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn share(&self, rank: usize) -> Option<Share> {
        self.shares.get(rank).copied()
    }

    /// Rank that owns global index `index`, if the index is in range.
    pub fn owner(&self, index: usize) -> Option<usize> {
        if index >= self.total {
            return None;
        }
        // Share ends never decrease, so the first one ending past `index` holds it.
        let rank = self
            .shares
            .partition_point(|share| share.offset + share.len <= index);
        Some(rank)
    }

    /// Checks per-rank lengths, in rank order, against the plan. Fails on
    /// the first rank whose length differs from its share.
    pub fn check_lengths(&self, lens: &[usize]) -> Result<()> {
        if lens.len() != self.shares.len() {
            return Err(Error::Channel(format!(
                "{} lengths for a plan of {} workers",
                lens.len(),
                self.shares.len()
            )));
        }
        for (rank, (share, &actual)) in self.shares.iter().zip(lens).enumerate() {
            if share.len != actual {
                return Err(Error::ShareLength {
                    rank,
                    expected: share.len,
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Borrow each rank's slice of `data`.
    pub fn split<'a, T>(&self, data: &'a [T]) -> Result<Vec<&'a [T]>> {
        if data.len() != self.total {
            return Err(Error::LengthMismatch {
                expected: self.total,
                found: data.len(),
            });
        }
        Ok(self.shares.iter().map(|s| &data[s.range()]).collect())
    }
}
