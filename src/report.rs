//! Coordinator-side summary of a run.

use std::fmt;

use crate::balancer::Outcome;

/// Default number of result elements shown.
pub const PREVIEW_LEN: usize = 10;

/// How a recombined result is shown in a report.
pub trait Summary {
    fn summarize(&self, label: &str, preview: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: fmt::Display> Summary for Vec<T> {
    fn summarize(&self, _label: &str, preview: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = preview.min(self.len());
        write!(f, "First {shown} elements of result:")?;
        for value in &self[..shown] {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

impl Summary for i64 {
    fn summarize(&self, label: &str, _preview: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total {label}: {self}")
    }
}

/// Human-readable summary. Can only be built from an outcome that holds the
/// recombined value, which in practice means on the coordinator.
pub struct Report<'a, V> {
    outcome: &'a Outcome<V>,
    value: &'a V,
    preview: usize,
}

impl<'a, V: Summary> Report<'a, V> {
    pub fn new(outcome: &'a Outcome<V>, preview: usize) -> Option<Self> {
        let value = outcome.value.as_ref()?;
        Some(Report {
            outcome,
            value,
            preview,
        })
    }
}

impl<V: Summary> fmt::Display for Report<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let micros = self.outcome.elapsed.as_micros();
        if self.outcome.is_distributed() {
            writeln!(
                f,
                "Parallel {} with {} processes took {micros} microseconds.",
                self.outcome.label, self.outcome.workers
            )?;
        } else {
            writeln!(f, "Sequential {} took {micros} microseconds.", self.outcome.label)?;
        }
        self.value.summarize(&self.outcome.label, self.preview, f)
    }
}
