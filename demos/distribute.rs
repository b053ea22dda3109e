//! Run with
//!
//! mpirun -n 4 cargo run --features mpi --example distribute
use splitwork::{Balancer, MpiChannel};

fn main() -> splitwork::Result<()> {
    let balancer = Balancer::new(MpiChannel::initialize()?)?;

    // Only calculate data on the coordinator, then distribute
    let data: Vec<f64> = if balancer.rank == 0 {
        let data: Vec<f64> = (0..=10).map(|x| x as f64 / 10.0).collect();
        balancer.distribute(Some(data.as_slice()))?
    } else {
        balancer.distribute(None)?
    };

    for i in 1..5 {
        // Pick a value on the coordinator, synchronize it across all ranks
        let mut multiple = if balancer.rank == 0 { i as f64 } else { 0.0 };
        balancer.synchronize_value(&mut multiple)?;

        let scaled = balancer.work(&data, |x| multiple * x);

        // Shares keep their plan, so every round gathers in dataset order
        if let Some(output) = balancer.collect(&scaled)? {
            println!("rank 0 got {output:?}");
        }
    }
    Ok(())
}
