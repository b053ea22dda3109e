use std::cell::RefCell;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info, info_span};

use crate::channel::{Collective, Element};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::harness::{Harness, Stage};
use crate::plan::{PartitionPlan, Share};
use crate::workload::Workload;

/// What a finished run hands back to its rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<V> {
    pub label: String,
    pub workers: usize,
    /// Compute time measured on this rank.
    pub elapsed: Duration,
    /// The recombined result; only present on the coordinator.
    pub value: Option<V>,
}

impl<V> Outcome<V> {
    pub fn is_distributed(&self) -> bool {
        self.workers > 1
    }
}

/// This struct manages splitting work across the ranks of a collective
/// channel and bringing the results back to the coordinator.
pub struct Balancer<C> {
    channel: C,
    context: RunContext,
    pub rank: usize,
    pub size: usize,
    // Plan of the last `distribute`, reused by every `collect`.
    plan: RefCell<Option<PartitionPlan>>,
}

impl<C: Collective> Balancer<C> {
    pub fn new(channel: C) -> Result<Self> {
        let context = RunContext::new(channel.rank(), channel.size())?;

        if context.is_coordinator() {
            info!(
                nodes = context.size(),
                threads = rayon::current_num_threads(),
                "balancer activated"
            );
        }

        Ok(Balancer {
            rank: context.rank(),
            size: context.size(),
            channel,
            context,
            plan: RefCell::new(None),
        })
    }

    pub fn context(&self) -> RunContext {
        self.context
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Hands every rank its share of `data`. Only the coordinator's `data` is
    /// read; other ranks pass `None`.
    pub fn distribute<T: Element>(&self, data: Option<&[T]>) -> Result<Vec<T>> {
        if self.context.is_solo() {
            let data = data.ok_or(Error::MissingDataset)?;
            *self.plan.borrow_mut() = Some(PartitionPlan::new(data.len(), 1)?);
            return Ok(data.to_vec());
        }

        let verdict = if self.context.is_coordinator() {
            data.map(<[T]>::len).ok_or(Error::MissingDataset)
        } else {
            Ok(0)
        };
        let total = self.settle(verdict)?;
        let plan = PartitionPlan::new(total, self.size)?;
        let local = self.channel.scatter(data, &plan)?;
        *self.plan.borrow_mut() = Some(plan);
        Ok(local)
    }

    /// Carries out `work` on this rank's items using the local thread pool.
    pub fn work<'b, I, O, F>(&self, items: &'b [I], work: F) -> Vec<O>
    where
        I: Sync,
        O: Send,
        F: Fn(&'b I) -> O + Send + Sync,
    {
        items.par_iter().map(work).collect()
    }

    /// Gathers per-item output for the shares of the last `distribute` back
    /// to the coordinator, in dataset order. Returns `None` on other ranks.
    ///
    /// Each rank must hand in exactly one output per item of its share;
    /// otherwise every rank fails, the coordinator with
    /// [`Error::ShareLength`] and the rest with [`Error::Aborted`].
    pub fn collect<O: Element>(&self, local: &[O]) -> Result<Option<Vec<O>>> {
        let plan = self.plan.borrow();
        let plan = plan.as_ref().ok_or(Error::NoPlan)?;
        if self.context.is_solo() {
            plan.check_lengths(&[local.len()])?;
            return Ok(Some(local.to_vec()));
        }
        self.channel.gather(local, plan)
    }

    /// Overwrites `value` everywhere with the coordinator's value.
    pub fn synchronize_value<T: Element>(&self, value: &mut T) -> Result<()> {
        if self.context.is_solo() {
            return Ok(());
        }
        self.channel.broadcast(std::slice::from_mut(value))
    }

    /// Waits for all ranks to get here.
    pub fn barrier(&self) -> Result<()> {
        if self.context.is_solo() {
            return Ok(());
        }
        self.channel.barrier()
    }

    /// Runs `workload` end to end: validate, scatter, barrier, compute,
    /// recombine.
    ///
    /// The coordinator passes the operand arrays; other ranks pass `None`.
    /// Validation failures are broadcast before any data moves, so every rank
    /// leaves together: the coordinator with the real error and everyone else
    /// with [`Error::Aborted`].
    pub fn run<W: Workload>(
        &self,
        workload: &W,
        operands: Option<&[&[W::Elem]]>,
    ) -> Result<Outcome<W::Output>> {
        let _span = info_span!("run", rank = self.rank, workers = self.size).entered();
        let mut harness = Harness::new(self.rank);

        if self.context.is_solo() {
            return self.run_solo(workload, operands, harness);
        }

        let verdict = if self.context.is_coordinator() {
            operands
                .ok_or(Error::MissingDataset)
                .and_then(|operands| check_operands(workload, operands))
        } else {
            Ok(0)
        };
        let total = self.settle(verdict)?;

        let plan = PartitionPlan::new(total, self.size)?;
        let share = plan
            .share(self.rank)
            .ok_or_else(|| Error::Channel(format!("plan has no share for rank {}", self.rank)))?;

        let mut shares = Vec::with_capacity(workload.operands());
        for k in 0..workload.operands() {
            let source = operands.and_then(|operands| operands.get(k).copied());
            shares.push(self.channel.scatter(source, &plan)?);
        }
        harness.advance(Stage::Scattered)?;
        debug!(offset = share.offset, len = share.len, "shares received");

        // Everyone starts the clock together, after the scatter has landed.
        self.channel.barrier()?;
        let views: Vec<&[W::Elem]> = shares.iter().map(Vec::as_slice).collect();
        let partial = harness.compute(|| workload.compute(&views, self.rank, share))?;

        let value = workload.recombine(&self.channel, &plan, partial)?;
        harness.advance(Stage::Recombined)?;
        harness.advance(Stage::Reported)?;

        Ok(Outcome {
            label: workload.label(),
            workers: self.size,
            elapsed: harness.elapsed().unwrap_or_default(),
            value,
        })
    }

    // Single worker: no plan exchange, no scatter, no barrier, no gather.
    fn run_solo<W: Workload>(
        &self,
        workload: &W,
        operands: Option<&[&[W::Elem]]>,
        mut harness: Harness,
    ) -> Result<Outcome<W::Output>> {
        let operands = operands.ok_or(Error::MissingDataset)?;
        let len = check_operands(workload, operands)?;

        let share = Share { offset: 0, len };
        let partial = harness.compute(|| workload.compute(operands, self.rank, share))?;
        harness.advance(Stage::Reported)?;

        Ok(Outcome {
            label: workload.label(),
            workers: 1,
            elapsed: harness.elapsed().unwrap_or_default(),
            value: Some(workload.finish(partial)),
        })
    }

    /// Broadcasts the coordinator's verdict on the dataset: its length, or
    /// that the run is off.
    fn settle(&self, verdict: Result<usize>) -> Result<usize> {
        let mut header = [0u64; 2];
        if let Ok(total) = &verdict {
            header = [*total as u64, 1];
        }
        self.channel.broadcast(&mut header)?;

        if self.context.is_coordinator() {
            return verdict;
        }
        if header[1] == 0 {
            return Err(Error::Aborted);
        }
        usize::try_from(header[0]).map_err(|_| Error::CountOverflow(usize::MAX))
    }
}

fn check_operands<W: Workload>(workload: &W, operands: &[&[W::Elem]]) -> Result<usize> {
    if operands.len() != workload.operands() {
        return Err(Error::OperandCount {
            expected: workload.operands(),
            found: operands.len(),
        });
    }
    let len = operands.first().map_or(0, |operand| operand.len());
    if let Some(other) = operands.iter().find(|operand| operand.len() != len) {
        return Err(Error::LengthMismatch {
            expected: len,
            found: other.len(),
        });
    }
    workload.validate(len)?;
    Ok(len)
}
