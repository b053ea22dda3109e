//! Command-line configuration.

use clap::{Args, Parser, ValueEnum};

use crate::channel::ReduceOp;
use crate::data::Fill;
use crate::error::{Error, Result};
use crate::kernel::Operation;
use crate::logging::LogFormat;
use crate::report::PREVIEW_LEN;
use crate::workload::Layout;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "splitwork",
    version,
    about = "Scatter a numeric workload over the worker group, compute locally, recombine on rank 0"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunConfig,

    #[command(flatten)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WorkloadKind {
    /// Elementwise operation over a flat array.
    Linear,
    /// Elementwise operation over a rows x cols array stored flat.
    Grid,
    /// Reduction of one integer array.
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReduceKind {
    Sum,
    Max,
    Min,
}

impl From<ReduceKind> for ReduceOp {
    fn from(kind: ReduceKind) -> Self {
        match kind {
            ReduceKind::Sum => ReduceOp::Sum,
            ReduceKind::Max => ReduceOp::Max,
            ReduceKind::Min => ReduceOp::Min,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RunConfig {
    #[arg(long, value_enum, default_value_t = WorkloadKind::Linear)]
    pub workload: WorkloadKind,

    /// Number of elements (linear and sum workloads).
    #[arg(short = 'n', long, default_value_t = 100_000)]
    pub size: usize,

    #[arg(long, default_value_t = 400)]
    pub rows: usize,

    #[arg(long, default_value_t = 250)]
    pub cols: usize,

    /// One of + - * /
    #[arg(short, long, default_value = "+", allow_hyphen_values = true)]
    pub op: String,

    /// Combine used by the sum workload.
    #[arg(long, value_enum, default_value_t = ReduceKind::Sum)]
    pub reduce: ReduceKind,

    #[arg(long, value_enum, default_value_t = Fill::Constant)]
    pub fill: Fill,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Result elements shown in the report.
    #[arg(long, default_value_t = PREVIEW_LEN)]
    pub preview: usize,

    /// Worker threads for the in-process backend. Under mpi the launcher
    /// decides.
    #[arg(long, env = "SPLITWORK_WORKERS")]
    pub workers: Option<usize>,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(Error::Config("--workers must be at least 1".to_string()));
        }
        self.dataset_len()?;
        Ok(())
    }

    pub fn operation(&self) -> Result<Operation> {
        self.op.parse()
    }

    pub fn layout(&self) -> Layout {
        match self.workload {
            WorkloadKind::Grid => Layout::Grid {
                rows: self.rows,
                cols: self.cols,
            },
            WorkloadKind::Linear | WorkloadKind::Sum => Layout::Linear,
        }
    }

    pub fn dataset_len(&self) -> Result<usize> {
        match self.workload {
            WorkloadKind::Grid => self.rows.checked_mul(self.cols).ok_or_else(|| {
                Error::Config(format!("{}x{} grid is too large", self.rows, self.cols))
            }),
            WorkloadKind::Linear | WorkloadKind::Sum => Ok(self.size),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct LogConfig {
    /// Filter directive, overridden by RUST_LOG.
    #[arg(long, env = "SPLITWORK_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let cli = Cli::try_parse_from(["splitwork"]).unwrap();
        assert_eq!(cli.run.workload, WorkloadKind::Linear);
        assert_eq!(cli.run.size, 100_000);
        assert_eq!(cli.run.operation().unwrap(), Operation::Add);
        assert_eq!(cli.run.preview, 10);
        assert_eq!(cli.log.log_format, LogFormat::Pretty);
    }

    #[test]
    fn grid_length_is_rows_times_cols() {
        let args = ["splitwork", "--workload", "grid", "--rows", "4", "--cols", "3"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.run.dataset_len().unwrap(), 12);
        assert_eq!(cli.run.layout(), Layout::Grid { rows: 4, cols: 3 });
    }

    #[test]
    fn minus_is_accepted_as_an_operation() {
        let cli = Cli::try_parse_from(["splitwork", "--op", "-"]).unwrap();
        assert_eq!(cli.run.operation().unwrap(), Operation::Subtract);
    }

    #[test]
    fn bad_selector_surfaces_when_used() {
        let cli = Cli::try_parse_from(["splitwork", "--op", "%"]).unwrap();
        assert!(matches!(cli.run.operation(), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let cli = Cli::try_parse_from(["splitwork", "--workers", "0"]).unwrap();
        assert!(matches!(cli.run.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn reduce_kind_maps_to_op() {
        let args = ["splitwork", "--workload", "sum", "--reduce", "max"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(ReduceOp::from(cli.run.reduce), ReduceOp::Max);
    }
}
