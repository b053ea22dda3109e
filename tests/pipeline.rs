use proptest::prelude::*;
use splitwork::{
    Balancer, Collective, Element, Elementwise, Error, Layout, LocalCluster, Operation,
    PartitionPlan, ReduceOp, Reducible, Reduction, Result, Workload,
};

/// Runs `workload` on `workers` threads and returns every rank's outcome value.
fn run_workload<W>(
    workers: usize,
    workload: &W,
    operands: &[&[W::Elem]],
) -> Vec<Result<Option<W::Output>>>
where
    W: Workload,
    W::Output: Send,
{
    LocalCluster::new(workers).unwrap().run(|channel| {
        let balancer = Balancer::new(channel)?;
        let source = (balancer.rank == 0).then_some(operands);
        balancer.run(workload, source).map(|outcome| outcome.value)
    })
}

fn add() -> Elementwise<f64> {
    Elementwise::new(Operation::Add, Layout::Linear)
}

#[test]
fn add_is_independent_of_worker_count() {
    let a = [1.0, 2.0, 3.0, 4.0, 5.0];
    let b = [2.0; 5];
    for workers in 1..=7 {
        let results = run_workload(workers, &add(), &[&a[..], &b[..]]);
        assert_eq!(
            results[0].as_ref().unwrap().as_deref(),
            Some(&[3.0, 4.0, 5.0, 6.0, 7.0][..]),
            "workers = {workers}"
        );
        for result in &results[1..] {
            assert!(matches!(result, Ok(None)));
        }
    }
}

#[test]
fn zero_divisor_only_touches_its_element() {
    let a: Vec<f64> = (1..=9).map(f64::from).collect();
    let mut b = vec![4.0; 9];
    b[5] = 0.0;
    let divide = Elementwise::<f64>::new(Operation::Divide, Layout::Linear);

    let results = run_workload(3, &divide, &[&a[..], &b[..]]);
    let values = results[0].as_ref().unwrap().clone().unwrap();
    for (index, value) in values.iter().enumerate() {
        if index == 5 {
            assert_eq!(*value, 0.0);
        } else {
            assert_eq!(*value, a[index] / 4.0);
        }
    }
}

#[test]
fn sum_of_ones_is_length_for_every_group_size() {
    for len in [0usize, 1, 10, 97, 1000] {
        let ones = vec![1i32; len];
        for workers in 1..=8 {
            let results = run_workload(workers, &Reduction::sum(), &[&ones[..]]);
            assert_eq!(
                *results[0].as_ref().unwrap(),
                Some(len as i64),
                "len = {len}, workers = {workers}"
            );
        }
    }
}

#[test]
fn max_and_min_ignore_empty_shares() {
    let values = [5i32, -3, 12];
    let max = run_workload(6, &Reduction::new(ReduceOp::Max), &[&values[..]]);
    let min = run_workload(6, &Reduction::new(ReduceOp::Min), &[&values[..]]);
    assert_eq!(*max[0].as_ref().unwrap(), Some(12));
    assert_eq!(*min[0].as_ref().unwrap(), Some(-3));
}

#[test]
fn empty_dataset_moves_zero_length_buffers() {
    let empty: &[f64] = &[];
    let results = run_workload(4, &add(), &[empty, empty]);
    assert_eq!(*results[0].as_ref().unwrap(), Some(Vec::new()));
}

#[test]
fn more_workers_than_elements() {
    let a = [1.0, 2.0];
    let b = [10.0, 20.0];
    let results = run_workload(5, &add(), &[&a[..], &b[..]]);
    assert_eq!(*results[0].as_ref().unwrap(), Some(vec![11.0, 22.0]));
}

#[test]
fn length_mismatch_aborts_every_rank() {
    let a = [1.0, 2.0, 3.0];
    let b = [1.0, 2.0];
    let results = run_workload(3, &add(), &[&a[..], &b[..]]);
    assert!(matches!(
        results[0],
        Err(Error::LengthMismatch {
            expected: 3,
            found: 2
        })
    ));
    assert!(results[1..]
        .iter()
        .all(|r| matches!(r, Err(Error::Aborted))));
}

#[test]
fn length_mismatch_on_single_worker() {
    let one: &[f64] = &[1.0];
    let empty: &[f64] = &[];
    let results = run_workload(1, &add(), &[one, empty]);
    assert!(matches!(results[0], Err(Error::LengthMismatch { .. })));
}

#[test]
fn grid_shape_mismatch_aborts() {
    let grid = Elementwise::<f64>::new(Operation::Add, Layout::Grid { rows: 2, cols: 3 });
    let a = [1.0; 5];
    let results = run_workload(2, &grid, &[&a[..], &a[..]]);
    assert!(matches!(results[0], Err(Error::ShapeMismatch { .. })));
    assert!(matches!(results[1], Err(Error::Aborted)));
}

#[test]
fn group_survives_an_aborted_run() {
    let good = [1.0; 4];
    let short = [1.0; 3];
    let results = LocalCluster::new(3).unwrap().run(|channel| {
        let balancer = Balancer::new(channel).unwrap();
        let coordinator = balancer.rank == 0;
        let bad: [&[f64]; 2] = [&good, &short];
        let first = balancer.run(&add(), coordinator.then_some(&bad[..]));
        let ok: [&[f64]; 2] = [&good, &good];
        let second = balancer.run(&add(), coordinator.then_some(&ok[..]));
        (first.is_err(), second.map(|outcome| outcome.value))
    });
    assert!(results.iter().all(|(failed, _)| *failed));
    assert_eq!(results[0].1.as_ref().unwrap(), &Some(vec![2.0; 4]));
}

#[test]
fn repeated_runs_are_identical() {
    let a: Vec<f64> = (0..1234).map(|x| x as f64 * 0.5).collect();
    let b: Vec<f64> = (0..1234).map(|x| (x % 7) as f64).collect();
    let multiply = Elementwise::<f64>::new(Operation::Multiply, Layout::Linear);
    let first = run_workload(5, &multiply, &[&a[..], &b[..]]);
    let second = run_workload(5, &multiply, &[&a[..], &b[..]]);
    assert_eq!(
        first[0].as_ref().unwrap().as_deref(),
        second[0].as_ref().unwrap().as_deref()
    );
}

#[test]
fn integer_elements_travel_too() {
    let a = [10i64, 20, 30, 40];
    let b = [3i64, 0, 7, 8];
    let divide = Elementwise::<i64>::new(Operation::Divide, Layout::Linear);
    let results = run_workload(3, &divide, &[&a[..], &b[..]]);
    assert_eq!(*results[0].as_ref().unwrap(), Some(vec![3, 0, 4, 5]));
}

/// A channel for one worker that fails the test on any collective call.
struct NoCollectives;

impl Collective for NoCollectives {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<()> {
        panic!("barrier called on a single worker");
    }

    fn broadcast<T: Element>(&self, _values: &mut [T]) -> Result<()> {
        panic!("broadcast called on a single worker");
    }

    fn scatter<T: Element>(&self, _data: Option<&[T]>, _plan: &PartitionPlan) -> Result<Vec<T>> {
        panic!("scatter called on a single worker");
    }

    fn gather<T: Element>(&self, _local: &[T], _plan: &PartitionPlan) -> Result<Option<Vec<T>>> {
        panic!("gather called on a single worker");
    }

    fn reduce<T: Reducible>(&self, _local: T, _op: ReduceOp) -> Result<Option<T>> {
        panic!("reduce called on a single worker");
    }
}

#[test]
fn single_worker_never_enters_a_collective() {
    let balancer = Balancer::new(NoCollectives).unwrap();
    let a = [1.0, 2.0, 3.0];
    let b = [2.0, 2.0, 2.0];

    let outcome = balancer.run(&add(), Some(&[&a[..], &b[..]][..])).unwrap();
    assert_eq!(outcome.value, Some(vec![3.0, 4.0, 5.0]));
    assert_eq!(outcome.workers, 1);
    assert!(!outcome.is_distributed());

    let ones = [1i32; 9];
    let operands: [&[i32]; 1] = [&ones];
    let sum = Reduction::sum();
    let outcome = balancer.run(&sum, Some(&operands[..])).unwrap();
    assert_eq!(outcome.value, Some(9));

    let share = balancer.distribute(Some(&a[..])).unwrap();
    let mut factor = 2.0;
    balancer.synchronize_value(&mut factor).unwrap();
    balancer.barrier().unwrap();
    let doubled = balancer.work(&share, |x| x * factor);
    assert_eq!(balancer.collect(&doubled).unwrap(), Some(vec![2.0, 4.0, 6.0]));
}

#[test]
fn single_worker_plan_is_whole_range() {
    let plan = PartitionPlan::new(42, 1).unwrap();
    assert_eq!(plan.shares().len(), 1);
    assert_eq!(plan.shares()[0].range(), 0..42);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn scatter_then_gather_is_identity(
        data in prop::collection::vec(-1e6f64..1e6, 0..200),
        workers in 1usize..9,
    ) {
        let gathered = LocalCluster::new(workers).unwrap().run(|channel| {
            let balancer = Balancer::new(channel).unwrap();
            let source = (balancer.rank == 0).then_some(data.as_slice());
            let share = balancer.distribute(source).unwrap();
            balancer.collect(&share).unwrap()
        });
        prop_assert_eq!(gathered[0].as_ref(), Some(&data));
    }

    #[test]
    fn subtract_matches_sequential(
        pairs in prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 0..150),
        workers in 1usize..7,
    ) {
        let (a, b): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
        let subtract = Elementwise::<f64>::new(Operation::Subtract, Layout::Linear);
        let expected: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
        let results = run_workload(workers, &subtract, &[&a[..], &b[..]]);
        prop_assert_eq!(results[0].as_ref().unwrap().as_ref(), Some(&expected));
    }
}
