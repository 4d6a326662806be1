//! End-to-end scenarios for the background processor: loop pacing,
//! FIFO draining, disposal semantics, and result capture via Deferred.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::time::Instant;

use taskpace::{BackgroundProcessor, Deferred, ErrorHandler, ProcessorConfig};

fn noop_handler() -> ErrorHandler {
    Arc::new(|_err| async { Ok(()) }.boxed())
}

#[tokio::test(start_paused = true)]
async fn test_loop_runs_fifo_without_overlap() {
    let processor = BackgroundProcessor::new(noop_handler());
    let order = Arc::new(Mutex::new(Vec::new()));
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));

    for index in 0..5 {
        let order = Arc::clone(&order);
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        processor
            .process_action(move || {
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    order.lock().push(index);
                    tokio::task::yield_now().await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }

    // The queue drains with no breaks in between (default
    // break_only_when_no_work).
    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    processor.dispose(false).await;
}

#[tokio::test(start_paused = true)]
async fn test_back_to_back_actions_skip_the_idle_break() {
    let processor = BackgroundProcessor::new(noop_handler());
    let stamps = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..2 {
        let stamps = Arc::clone(&stamps);
        processor
            .process_action(move || {
                async move {
                    stamps.lock().push(Instant::now());
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let stamps = stamps.lock();
    assert_eq!(stamps.len(), 2);
    // No 1000ms gap between consecutive busy-queue actions.
    assert_eq!(stamps[1] - stamps[0], Duration::ZERO);
    drop(stamps);
    processor.dispose(false).await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_loop_waits_the_full_interval() {
    let start = Instant::now();
    let processor = BackgroundProcessor::new(noop_handler());
    let stamps = Arc::new(Mutex::new(Vec::new()));

    {
        let stamps = Arc::clone(&stamps);
        processor
            .process_action(move || {
                async move {
                    stamps.lock().push(Instant::now());
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }

    // The queue is non-empty on the loop's first check, so the first
    // action runs with no break at all.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(stamps.lock().len(), 1);

    // Submitted mid-break at t=1100; the loop is already sleeping and
    // only re-checks on its next tick at t=2000.
    {
        let stamps = Arc::clone(&stamps);
        processor
            .process_action(move || {
                async move {
                    stamps.lock().push(Instant::now());
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(1000)).await;

    let stamps = stamps.lock();
    assert_eq!(stamps.len(), 2);
    assert_eq!(stamps[1] - start, Duration::from_millis(2000));
    drop(stamps);
    processor.dispose(false).await;
}

#[tokio::test(start_paused = true)]
async fn test_always_break_mode_paces_every_action() {
    let processor = BackgroundProcessor::with_config(
        noop_handler(),
        ProcessorConfig {
            break_interval: Duration::from_millis(100),
            break_only_when_no_work: false,
        },
    )
    .unwrap();
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    for _ in 0..3 {
        let stamps = Arc::clone(&stamps);
        processor
            .process_action(move || {
                async move {
                    stamps.lock().push(Instant::now());
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(350)).await;

    let stamps = stamps.lock();
    let offsets: Vec<Duration> = stamps.iter().map(|s| *s - start).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(300),
        ]
    );
    drop(stamps);
    processor.dispose(true).await;
}

#[tokio::test(start_paused = true)]
async fn test_drain_burst_starts_pending_actions_concurrently() {
    // A huge idle break keeps the loop from starting anything; disposal
    // must still complete all pending work, and does so as one burst.
    let processor = BackgroundProcessor::with_config(
        noop_handler(),
        ProcessorConfig {
            break_interval: Duration::from_secs(3600),
            break_only_when_no_work: false,
        },
    )
    .unwrap();

    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        let completed = Arc::clone(&completed);
        processor
            .process_action(move || {
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }

    assert_eq!(processor.queue_length(), 4);
    processor.dispose(false).await;

    // dispose resolved only after every action completed, and the burst
    // abandoned one-at-a-time pacing.
    assert_eq!(completed.load(Ordering::SeqCst), 4);
    assert_eq!(max_active.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_kill_queue_waits_for_in_flight_but_discards_pending() {
    let processor = Arc::new(BackgroundProcessor::new(noop_handler()));
    let gate = Arc::new(tokio::sync::Notify::new());
    let first_done = Arc::new(AtomicUsize::new(0));
    let others_ran = Arc::new(AtomicUsize::new(0));

    {
        let gate = Arc::clone(&gate);
        let first_done = Arc::clone(&first_done);
        processor
            .process_action(move || {
                async move {
                    gate.notified().await;
                    first_done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }
    // Let the loop pick the first action up and block on the gate.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    for _ in 0..2 {
        let others_ran = Arc::clone(&others_ran);
        processor
            .process_action(move || {
                async move {
                    others_ran.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }

    // Unblock the in-flight action shortly after disposal begins.
    {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            gate.notify_one();
        });
    }

    processor.dispose(true).await;
    assert_eq!(first_done.load(Ordering::SeqCst), 1);
    assert_eq!(others_ran.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_result_capture_through_deferred() {
    // The queue is fire-and-forget; a caller that wants the outcome
    // moves a Deferred into the action and waits on it.
    let processor = BackgroundProcessor::new(noop_handler());
    let deferred: Deferred<u64> = Deferred::new();

    {
        let deferred = deferred.clone();
        processor
            .process_action(move || {
                async move {
                    deferred.resolve(6 * 7);
                    Ok(())
                }
                .boxed()
            })
            .unwrap();
    }

    processor.dispose(false).await;
    assert_eq!(deferred.wait().await.unwrap(), 42);
}
