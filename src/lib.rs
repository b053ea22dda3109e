//! Split a uniform numeric workload across a fixed group of workers,
//! compute every share locally, and recombine at the coordinator.
//!
//! A run goes plan → scatter → barrier → compute → gather or reduce →
//! report. The [`Balancer`] drives it over any [`Collective`] channel: the
//! mpi world (feature `mpi`) or an in-process [`LocalCluster`]. With a single
//! worker it skips every collective and computes in place.
//!
//! ```no_run
//! use splitwork::{Balancer, Elementwise, Layout, LocalCluster, Operation};
//!
//! let a = vec![1.0; 1_000];
//! let b = vec![2.0; 1_000];
//! let cluster = LocalCluster::new(4).unwrap();
//! let outcomes = cluster.run(|channel| {
//!     let balancer = Balancer::new(channel).unwrap();
//!     let add = Elementwise::<f64>::new(Operation::Add, Layout::Linear);
//!     let operands: [&[f64]; 2] = [&a, &b];
//!     let source = (balancer.rank == 0).then_some(&operands[..]);
//!     balancer.run(&add, source).unwrap()
//! });
//! assert_eq!(outcomes[0].value.as_ref().unwrap()[0], 3.0);
//! ```

pub mod balancer;
pub mod channel;
pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod harness;
pub mod kernel;
pub mod logging;
pub mod plan;
pub mod report;
pub mod runner;
pub mod workload;

pub use balancer::{Balancer, Outcome};
#[cfg(feature = "mpi")]
pub use channel::MpiChannel;
pub use channel::{Collective, Element, LocalCluster, ReduceOp, Reducible, ThreadChannel};
pub use context::{RunContext, COORDINATOR};
pub use error::{Error, Result};
pub use kernel::Operation;
pub use plan::{PartitionPlan, Share};
pub use report::Report;
pub use workload::{Elementwise, Layout, Reduction, Workload};
