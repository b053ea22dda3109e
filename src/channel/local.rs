//! In-process worker group.
//!
//! [`LocalCluster`] runs one closure per simulated rank on a dedicated rayon
//! pool sized to the group, and the ranks exchange owned buffers through a
//! shared mailbox guarded by a barrier. It follows the same collective
//! discipline as the mpi backend, so it is how the protocol is exercised
//! without a launcher.

use std::any::Any;
use std::sync::{Barrier, Mutex, MutexGuard};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::dispatcher::{self, Dispatch};
use tracing::{trace, Span};

use super::{Collective, Element, ReduceOp, Reducible};
use crate::context::COORDINATOR;
use crate::error::{Error, Result};
use crate::plan::PartitionPlan;

type Parcel = Box<dyn Any + Send>;

/// A fixed group of worker threads that behave like ranks.
pub struct LocalCluster {
    size: usize,
    pool: ThreadPool,
}

impl LocalCluster {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::NoWorkers);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|rank| format!("splitwork-rank-{rank}"))
            .build()?;
        Ok(LocalCluster { size, pool })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Runs `job` once per rank and returns the results in rank order.
    ///
    /// Every rank must make the same sequence of collective calls; a rank
    /// that panics or skips a call leaves the rest blocked. Rank threads log
    /// through the caller's subscriber, inside the caller's current span.
    pub fn run<F, R>(&self, job: F) -> Vec<R>
    where
        F: Fn(ThreadChannel<'_>) -> R + Sync,
        R: Send,
    {
        let mailbox = Mailbox::new(self.size);
        let dispatch = dispatcher::get_default(Dispatch::clone);
        let parent = Span::current();
        self.pool.broadcast(|ctx| {
            dispatcher::with_default(&dispatch, || {
                parent.in_scope(|| {
                    job(ThreadChannel {
                        rank: ctx.index(),
                        size: self.size,
                        mailbox: &mailbox,
                    })
                })
            })
        })
    }
}

struct Mailbox {
    barrier: Barrier,
    slots: Vec<Mutex<Option<Parcel>>>,
}

impl Mailbox {
    fn new(size: usize) -> Self {
        Mailbox {
            barrier: Barrier::new(size),
            slots: (0..size).map(|_| Mutex::new(None)).collect(),
        }
    }

    fn slot(&self, rank: usize) -> Result<MutexGuard<'_, Option<Parcel>>> {
        self.slots[rank]
            .lock()
            .map_err(|_| Error::Channel(format!("mailbox slot {rank} poisoned")))
    }

    fn post(&self, rank: usize, parcel: Parcel) -> Result<()> {
        *self.slot(rank)? = Some(parcel);
        Ok(())
    }

    fn take<T: 'static>(&self, rank: usize) -> Result<T> {
        let parcel = self
            .slot(rank)?
            .take()
            .ok_or_else(|| Error::Channel(format!("nothing posted for rank {rank}")))?;
        parcel
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| Error::Channel(format!("unexpected parcel type for rank {rank}")))
    }

    fn peek<T: Clone + 'static>(&self, rank: usize) -> Result<T> {
        let slot = self.slot(rank)?;
        slot.as_ref()
            .and_then(|parcel| parcel.downcast_ref::<T>())
            .cloned()
            .ok_or_else(|| Error::Channel(format!("nothing readable posted by rank {rank}")))
    }

    fn wait(&self) {
        self.barrier.wait();
    }
}

/// One rank's handle on a [`LocalCluster`] mailbox.
pub struct ThreadChannel<'a> {
    rank: usize,
    size: usize,
    mailbox: &'a Mailbox,
}

impl ThreadChannel<'_> {
    fn is_coordinator(&self) -> bool {
        self.rank == COORDINATOR
    }
}

impl Collective for ThreadChannel<'_> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        self.mailbox.wait();
        Ok(())
    }

    fn broadcast<T: Element>(&self, values: &mut [T]) -> Result<()> {
        // Every rank passes both barriers even when posting or reading fails,
        // so one bad rank cannot strand the rest.
        let posted = if self.is_coordinator() {
            self.mailbox.post(COORDINATOR, Box::new(values.to_vec()))
        } else {
            Ok(())
        };
        self.mailbox.wait();

        let received = if self.is_coordinator() {
            Ok(())
        } else {
            self.mailbox
                .peek::<Vec<T>>(COORDINATOR)
                .and_then(|incoming| copy_exact(&incoming, values))
        };
        self.mailbox.wait();

        if self.is_coordinator() {
            self.mailbox.slot(COORDINATOR)?.take();
        }
        posted.and(received)
    }

    fn scatter<T: Element>(&self, data: Option<&[T]>, plan: &PartitionPlan) -> Result<Vec<T>> {
        let posted = if self.is_coordinator() {
            data.ok_or(Error::MissingDataset)
                .and_then(|data| plan.split(data))
                .and_then(|parts| {
                    parts.into_iter().enumerate().try_for_each(|(rank, part)| {
                        self.mailbox.post(rank, Box::new(part.to_vec()))
                    })
                })
        } else {
            Ok(())
        };
        self.mailbox.wait();

        let local = self.mailbox.take::<Vec<T>>(self.rank);
        self.mailbox.wait();

        posted?;
        let local = local?;
        trace!(rank = self.rank, len = local.len(), "scatter received");
        Ok(local)
    }

    fn gather<T: Element>(&self, local: &[T], plan: &PartitionPlan) -> Result<Option<Vec<T>>> {
        let posted = self.mailbox.post(self.rank, Box::new(local.to_vec()));
        self.mailbox.wait();

        // The coordinator drains every slot, then posts whether the parts fit
        // the plan, so a bad share fails every rank at the same point.
        let assembled = if self.is_coordinator() {
            let parts: Vec<Result<Vec<T>>> = (0..self.size)
                .map(|rank| self.mailbox.take::<Vec<T>>(rank))
                .collect();
            let assembled = parts
                .into_iter()
                .collect::<Result<Vec<_>>>()
                .and_then(|parts| {
                    let lens: Vec<usize> = parts.iter().map(Vec::len).collect();
                    plan.check_lengths(&lens)?;
                    Ok(parts.concat())
                });
            let verdict = self.mailbox.post(COORDINATOR, Box::new(assembled.is_ok()));
            assembled.and_then(|whole| verdict.map(|()| Some(whole)))
        } else {
            Ok(None)
        };
        self.mailbox.wait();

        let accepted = if self.is_coordinator() {
            Ok(true)
        } else {
            self.mailbox.peek::<bool>(COORDINATOR)
        };
        self.mailbox.wait();

        if self.is_coordinator() {
            self.mailbox.slot(COORDINATOR)?.take();
        }
        posted?;
        if !accepted? {
            return Err(Error::Aborted);
        }
        assembled
    }

    fn reduce<T: Reducible>(&self, local: T, op: ReduceOp) -> Result<Option<T>> {
        let posted = self.mailbox.post(self.rank, Box::new(local));
        self.mailbox.wait();

        let combined = if self.is_coordinator() {
            (0..self.size)
                .map(|rank| self.mailbox.take::<T>(rank))
                .collect::<Result<Vec<T>>>()
                .map(|partials| {
                    Some(
                        partials
                            .into_iter()
                            .fold(T::identity(op), |acc, partial| acc.combine(partial, op)),
                    )
                })
        } else {
            Ok(None)
        };
        self.mailbox.wait();

        posted?;
        combined
    }
}

fn copy_exact<T: Copy>(source: &[T], target: &mut [T]) -> Result<()> {
    if source.len() != target.len() {
        return Err(Error::LengthMismatch {
            expected: target.len(),
            found: source.len(),
        });
    }
    target.copy_from_slice(source);
    Ok(())
}
