use crate::{
    CancellationSignal, DispatchState, Dispatcher, Error, PoolConfig, TransformError, Validated,
    submit,
};
use core::time::Duration;
use std::collections::HashSet;

fn double(x: u64) -> Result<u64, TransformError> {
    Ok(x * 2)
}

fn slow_double(delay: Duration) -> impl Fn(u64) -> Result<u64, TransformError> + Send + Sync {
    move |x| {
        std::thread::sleep(delay);
        Ok(x * 2)
    }
}

async fn run_every_job_yields_one_outcome(num_workers: usize, jobs: u64) {
    let config = PoolConfig::new(num_workers);
    let dispatcher = Dispatcher::new(config, double);

    let batch = dispatcher.dispatch(0..jobs).await.expect("dispatch");

    assert_eq!(batch.state, DispatchState::Completed);
    assert_eq!(batch.total, jobs as usize);
    assert_eq!(batch.completed(), jobs as usize);
    for (expected, outcome) in (0..jobs).zip(&batch.results) {
        assert_eq!(outcome.index, expected as usize);
        assert_eq!(outcome.value, Ok(expected * 2));
    }
    assert_eq!(dispatcher.active_tasks(), 0);
    assert_eq!(dispatcher.state(), DispatchState::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_job_yields_one_outcome_single_worker() {
    run_every_job_yields_one_outcome(1, 25).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_job_yields_one_outcome_more_workers_than_jobs() {
    run_every_job_yields_one_outcome(8, 3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_job_yields_one_outcome_many_jobs() {
    run_every_job_yields_one_outcome(3, 500).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_job_yields_one_outcome_tiny_channels() {
    let config = PoolConfig::new(4)
        .with_queue_capacity(1)
        .with_result_capacity(1);
    let dispatcher = Dispatcher::new(config, double);

    let batch = dispatcher.dispatch(0..200).await.expect("dispatch");

    assert!(batch.is_complete());
    let indices: HashSet<usize> = batch.results.iter().map(|o| o.index).collect();
    assert_eq!(indices.len(), 200);
    assert_eq!(dispatcher.active_tasks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submit_doubles_three_jobs() {
    let outcomes = submit([1_u64, 2, 3], 3, Duration::from_secs(1), double)
        .await
        .expect("submit");

    let values: HashSet<u64> = outcomes
        .into_iter()
        .map(|o| o.value.expect("no per-item errors"))
        .collect();
    assert_eq!(values, HashSet::from([2, 4, 6]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unbounded_timeout_behaves_like_no_deadline() {
    let outcomes = submit([1_u64, 2, 3], 3, Duration::MAX, double)
        .await
        .expect("submit");

    let values: Vec<u64> = outcomes
        .into_iter()
        .map(|o| o.value.expect("no per-item errors"))
        .collect();
    assert_eq!(values, [2, 4, 6]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropping_dispatch_cancels_the_batch() {
    let dispatcher = Dispatcher::new(PoolConfig::new(2), slow_double(Duration::from_millis(50)));

    let dropped = tokio::time::timeout(Duration::from_millis(30), dispatcher.dispatch(0..20)).await;
    assert!(dropped.is_err(), "dispatch should still be running");

    assert_eq!(dispatcher.state(), DispatchState::Cancelled);
    tokio::time::timeout(Duration::from_secs(2), async {
        while dispatcher.active_tasks() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("workers should stop once the batch is abandoned");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_input_completes_immediately() {
    let outcomes = submit(Vec::<u64>::new(), 3, Duration::from_secs(1), double)
        .await
        .expect("empty input is not an error");
    assert!(outcomes.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn short_deadline_times_out_with_partial_results() {
    let config = PoolConfig::new(2).with_timeout(Duration::from_millis(120));
    let dispatcher = Dispatcher::new(config, slow_double(Duration::from_millis(50)));

    let batch = dispatcher.dispatch(0..10).await.expect("dispatch");

    assert_eq!(batch.state, DispatchState::TimedOut);
    assert!(batch.completed() < 10);
    assert_eq!(dispatcher.active_tasks(), 0);

    match batch.into_result() {
        Err(Error::Timeout {
            completed, total, ..
        }) => {
            assert!(completed < 10);
            assert_eq!(total, 10);
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submit_reports_timeout_as_error() {
    let err = submit(
        0..10_u64,
        2,
        Duration::from_millis(120),
        slow_double(Duration::from_millis(50)),
    )
    .await
    .expect_err("deadline is shorter than the work");

    assert!(matches!(err, Error::Timeout { total: 10, .. }));
    assert!(err.is_interrupted());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn generous_deadline_completes() {
    let config = PoolConfig::new(4).with_timeout(Duration::from_secs(5));
    let dispatcher = Dispatcher::new(config, slow_double(Duration::from_millis(5)));

    let batch = dispatcher.dispatch(0..12).await.expect("dispatch");
    assert!(batch.is_complete());
    assert_eq!(batch.completed(), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parent_trip_cancels_the_batch() {
    let root = CancellationSignal::new();
    let config = PoolConfig::new(2);
    let dispatcher =
        Dispatcher::new(config, slow_double(Duration::from_millis(30))).with_parent(&root);

    let tripper = root.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(70)).await;
        tripper.trip();
    });

    let batch = dispatcher.dispatch(0..40).await.expect("dispatch");

    assert_eq!(batch.state, DispatchState::Cancelled);
    assert!(batch.completed() < 40);
    assert_eq!(dispatcher.active_tasks(), 0);
    assert!(matches!(
        batch.into_result(),
        Err(Error::Cancelled { total: 40, .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn already_tripped_parent_starts_nothing() {
    let root = CancellationSignal::new();
    root.trip();
    let dispatcher = Dispatcher::new(PoolConfig::new(2), double).with_parent(&root);

    let batch = dispatcher.dispatch(0..5).await.expect("dispatch");

    assert_eq!(batch.state, DispatchState::Cancelled);
    assert_eq!(batch.completed(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn per_item_errors_do_not_abort_the_batch() {
    let at_most_five = |x: &u64| {
        if *x <= 5 {
            Ok(())
        } else {
            Err(TransformError::rejected(format!("job {x} exceeds 5")))
        }
    };
    let dispatcher = Dispatcher::new(PoolConfig::new(3), Validated::new(at_most_five, double));

    let batch = dispatcher.dispatch(1..=10).await.expect("dispatch");

    assert!(batch.is_complete());
    assert_eq!(batch.completed(), 10);
    assert_eq!(batch.failures(), 5);
    assert_eq!(batch.results[5].index, 5);
    assert_eq!(
        batch.results[5].value,
        Err(TransformError::rejected("job 6 exceeds 5"))
    );
    assert_eq!(batch.results[4].value, Ok(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn results_follow_input_order_regardless_of_finish_order() {
    // Earlier jobs sleep longer, so they finish last.
    let staggered = |x: u64| {
        std::thread::sleep(Duration::from_millis(40 - x * 5));
        Ok::<_, TransformError>(x)
    };
    let dispatcher = Dispatcher::new(PoolConfig::new(8), staggered);

    let batch = dispatcher.dispatch(0..8).await.expect("dispatch");

    let order: Vec<u64> = batch
        .results
        .into_iter()
        .map(|o| o.value.expect("ok"))
        .collect();
    assert_eq!(order, (0..8).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dispatcher_runs_a_single_batch() {
    let dispatcher = Dispatcher::new(PoolConfig::new(2), double);
    assert_eq!(dispatcher.state(), DispatchState::Idle);

    dispatcher.dispatch([1, 2]).await.expect("first batch");
    assert_eq!(dispatcher.state(), DispatchState::Completed);

    let again = dispatcher.dispatch([3]).await;
    assert!(matches!(again, Err(Error::InvalidInput { .. })));
    assert_eq!(dispatcher.state(), DispatchState::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_config_is_rejected_before_start() {
    let dispatcher = Dispatcher::new(PoolConfig::new(0), double);

    let err = dispatcher.dispatch([1, 2, 3]).await.expect_err("zero workers");

    assert!(matches!(err, Error::InvalidInput { .. }));
    assert_eq!(dispatcher.state(), DispatchState::Idle);
    assert_eq!(dispatcher.active_tasks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn panicking_transform_fails_the_worker() {
    let fragile = |x: u64| {
        assert_ne!(x, 3, "cannot handle three");
        Ok::<_, TransformError>(x)
    };
    let dispatcher = Dispatcher::new(PoolConfig::new(2), fragile);

    let err = dispatcher.dispatch(0..10).await.expect_err("worker panicked");

    assert!(matches!(err, Error::WorkerFailed { .. }));
    assert_eq!(dispatcher.state(), DispatchState::Cancelled);
    assert_eq!(dispatcher.active_tasks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tripping_twice_matches_tripping_once() {
    let root = CancellationSignal::new();
    root.trip();
    root.trip();

    let dispatcher = Dispatcher::new(PoolConfig::new(3), double).with_parent(&root);
    let batch = dispatcher.dispatch(0..3).await.expect("dispatch");

    assert_eq!(batch.state, DispatchState::Cancelled);
    assert_eq!(dispatcher.active_tasks(), 0);
}
