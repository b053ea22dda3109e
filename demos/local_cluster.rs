//! Run with
//!
//! cargo run --example local_cluster
//!
//! Runs every workload on an in-process group of four workers.
use splitwork::{Balancer, Elementwise, Layout, LocalCluster, Operation, Reduction, Report};

const WORKERS: usize = 4;

fn main() -> splitwork::Result<()> {
    let cluster = LocalCluster::new(WORKERS)?;

    // 1-D divide with a zero divisor in the middle
    let a: Vec<f64> = (1..=13).map(f64::from).collect();
    let mut b = vec![2.0; a.len()];
    b[6] = 0.0;
    let divide = Elementwise::<f64>::new(Operation::Divide, Layout::Linear);
    let reports = cluster.run(|channel| -> splitwork::Result<Option<String>> {
        let balancer = Balancer::new(channel)?;
        let operands: [&[f64]; 2] = [&a, &b];
        let source = (balancer.rank == 0).then_some(&operands[..]);
        let outcome = balancer.run(&divide, source)?;
        Ok(Report::new(&outcome, 13).map(|r| r.to_string()))
    });
    print_coordinator(reports)?;

    // Same operation on a 3x4 grid
    let grid = Elementwise::<f64>::new(Operation::Multiply, Layout::Grid { rows: 3, cols: 4 });
    let reports = cluster.run(|channel| -> splitwork::Result<Option<String>> {
        let balancer = Balancer::new(channel)?;
        let operands: [&[f64]; 2] = [&a[..12], &b[..12]];
        let source = (balancer.rank == 0).then_some(&operands[..]);
        let outcome = balancer.run(&grid, source)?;
        Ok(Report::new(&outcome, 12).map(|r| r.to_string()))
    });
    print_coordinator(reports)?;

    // Sum of 0..1000, which the group size does not divide
    let values: Vec<i32> = (0..1000).collect();
    let reports = cluster.run(|channel| -> splitwork::Result<Option<String>> {
        let balancer = Balancer::new(channel)?;
        let operands: [&[i32]; 1] = [&values];
        let source = (balancer.rank == 0).then_some(&operands[..]);
        let outcome = balancer.run(&Reduction::sum(), source)?;
        Ok(Report::new(&outcome, 0).map(|r| r.to_string()))
    });
    print_coordinator(reports)?;

    Ok(())
}

fn print_coordinator(reports: Vec<splitwork::Result<Option<String>>>) -> splitwork::Result<()> {
    for report in reports {
        if let Some(report) = report? {
            println!("{report}\n");
        }
    }
    Ok(())
}
