use super::*;
use futures::stream;
use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
struct TestError(String);

fn executor(parallelism: usize) -> BoundedExecutor {
    BoundedExecutor::new(NonZeroUsize::new(parallelism).unwrap())
}

async fn sum_with(parallelism: usize) -> u64 {
    let total = Arc::new(AtomicU64::new(0));
    let acc = Arc::clone(&total);

    executor(parallelism)
        .run(stream::iter(1..=1000u64), move |n| {
            let acc = Arc::clone(&acc);
            async move {
                acc.fetch_add(n, Ordering::SeqCst);
                Ok::<(), TestError>(())
            }
        })
        .await
        .unwrap();

    total.load(Ordering::SeqCst)
}

#[tokio::test]
async fn test_processes_every_item() {
    assert_eq!(sum_with(20).await, 500500);
}

#[tokio::test]
async fn test_result_independent_of_parallelism() {
    for parallelism in [1, 2, 7, 64] {
        assert_eq!(sum_with(parallelism).await, 500500, "P = {parallelism}");
    }
}

#[tokio::test]
async fn test_first_error_is_returned() {
    let ex = executor(20);
    let run = ex.run(stream::iter(1..=101u32), |n| async move {
        if n == 100 {
            Err(TestError(format!("Error {n}")))
        } else {
            Ok(())
        }
    });

    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("executor hung")
        .unwrap_err();
    assert_eq!(err.to_string(), "Error 100");
    assert_eq!(err.into_failure(), Some(TestError("Error 100".into())));
}

#[tokio::test]
async fn test_failure_stops_the_pump() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    let source = stream::iter(0..100_000u32).inspect(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let result = executor(4)
        .run(source, |n| async move {
            if n == 10 {
                return Err(TestError("stop".into()));
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(ExecutorError::Failed(_))));
    assert!(pulled.load(Ordering::SeqCst) < 1000);
}

#[tokio::test]
async fn test_only_one_failure_surfaces() {
    let result = executor(8)
        .run(stream::iter(0..50u32), |n| async move {
            Err::<(), _>(TestError(format!("item {n}")))
        })
        .await;

    match result {
        Err(ExecutorError::Failed(TestError(msg))) => assert!(msg.starts_with("item ")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_in_flight_work_is_bounded() {
    let parallelism = 5;
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (cur, max) = (Arc::clone(&current), Arc::clone(&peak));

    executor(parallelism)
        .run(stream::iter(0..200u32), move |_| {
            let (cur, max) = (Arc::clone(&cur), Arc::clone(&max));
            async move {
                let now = cur.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                cur.fetch_sub(1, Ordering::SeqCst);
                Ok::<(), TestError>(())
            }
        })
        .await
        .unwrap();

    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= parallelism, "peak {peak}");
    assert!(peak > 1);
}

#[tokio::test]
async fn test_dequeue_order_follows_source() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    executor(1)
        .run(stream::iter(0..20u32), move |n| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(n);
                Ok::<(), TestError>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_source_error_is_a_failure() {
    let source = stream::iter(vec![
        Ok(1u32),
        Ok(2),
        Err(TestError("bad record".into())),
        Ok(4),
    ]);
    let processed = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&processed);

    let result = executor(2)
        .try_run(source, move |_| {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

    assert_eq!(result.unwrap_err().to_string(), "bad record");
    assert!(processed.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_worker_panic_is_reported() {
    let result = executor(3)
        .run(stream::iter(0..10u32), |n| async move {
            if n == 3 {
                panic!("worker exploded");
            }
            Ok::<(), TestError>(())
        })
        .await;

    match result {
        Err(ExecutorError::WorkerPanicked(msg)) => assert_eq!(msg, "worker exploded"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_caller_cancellation() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let ex = executor(4).with_cancellation(cancel);
    let run = ex.run(stream::iter(0..1000u32), |_| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<(), TestError>(())
    });

    let result = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("cancellation did not stop the executor");
    assert!(matches!(result, Err(ExecutorError::Cancelled)));
}

#[tokio::test]
async fn test_empty_source() {
    let result = executor(4)
        .run(stream::iter(Vec::<u32>::new()), |_| async {
            Ok::<(), TestError>(())
        })
        .await;
    assert!(result.is_ok());
}
