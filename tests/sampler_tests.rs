use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use proptest::prelude::*;
use tokio::sync::mpsc;

use kline_watch::error::SamplerError;
use kline_watch::event::AppEvent;
use kline_watch::model::tick::Tick;
use kline_watch::queue::{tick_queue, TickQueue};
use kline_watch::sampler::{Baseline, RandomWalkSource, TickSampler, TickSource};

const LONG_PERIOD: Duration = Duration::from_secs(5);

fn sampler_with(
    source: Arc<dyn TickSource>,
    baseline: Option<f64>,
    period: Duration,
) -> (TickSampler, TickQueue, mpsc::Receiver<AppEvent>) {
    let (tx, queue) = tick_queue();
    let (status_tx, status_rx) = mpsc::channel(8);
    let b = Baseline::new();
    b.set(baseline);
    let sampler = TickSampler::new(source, tx, b, status_tx, period);
    (sampler, queue, status_rx)
}

async fn next_stop(rx: &mut mpsc::Receiver<AppEvent>) -> Option<SamplerError> {
    let evt = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("sampler should report stop")
        .expect("status channel open");
    match evt {
        AppEvent::SamplerStopped { reason, .. } => reason,
        other => panic!("unexpected event {:?}", other),
    }
}

/// Succeeds `ok_calls` times, then fails.
struct FlakySource {
    calls: AtomicUsize,
    ok_calls: usize,
}

impl TickSource for FlakySource {
    fn next_tick(&self, last_close: f64, now: DateTime<Local>) -> Result<Tick, SamplerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.ok_calls {
            Ok(Tick::from_baseline(now, last_close, last_close, 10_000))
        } else {
            Err(SamplerError::Computation("source failed".to_string()))
        }
    }
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(1)));
    let (mut sampler, _queue, _rx) = sampler_with(src, Some(10.0), LONG_PERIOD);

    sampler.start().unwrap();
    assert!(sampler.is_running());
    assert_eq!(sampler.start(), Err(SamplerError::AlreadyRunning));
    sampler.stop();
    assert!(!sampler.is_running());
}

#[tokio::test]
async fn missing_baseline_ends_the_loop() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(1)));
    let (mut sampler, mut queue, mut rx) = sampler_with(src, None, LONG_PERIOD);

    sampler.start().unwrap();
    assert_eq!(next_stop(&mut rx).await, Some(SamplerError::NoBaseline));
    assert!(!sampler.is_running());
    assert!(queue.drain_all().is_empty());
}

#[tokio::test]
async fn stop_keeps_already_queued_ticks() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(3)));
    let (mut sampler, mut queue, mut rx) = sampler_with(src, Some(10.0), LONG_PERIOD);

    sampler.start().unwrap();
    // The first tick is produced immediately, the next one only after 5s.
    tokio::time::sleep(Duration::from_millis(100)).await;
    sampler.stop();
    assert_eq!(next_stop(&mut rx).await, None);

    let batch = queue.drain_all();
    assert_eq!(batch.len(), 1);
    let price = batch[0].price;
    assert!((9.90 - 1e-9..=10.10 + 1e-9).contains(&price), "price {}", price);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(queue.drain_all().is_empty());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(3)));
    let (mut sampler, _queue, mut rx) = sampler_with(src, Some(10.0), LONG_PERIOD);

    sampler.stop();
    sampler.start().unwrap();
    sampler.stop();
    sampler.stop();
    assert_eq!(next_stop(&mut rx).await, None);
    assert!(!sampler.is_running());
}

#[tokio::test]
async fn failing_source_terminates_without_restart() {
    let src = Arc::new(FlakySource {
        calls: AtomicUsize::new(0),
        ok_calls: 1,
    });
    let (mut sampler, mut queue, mut rx) =
        sampler_with(src.clone(), Some(10.0), Duration::from_millis(10));

    sampler.start().unwrap();
    assert!(matches!(
        next_stop(&mut rx).await,
        Some(SamplerError::Computation(_))
    ));
    assert!(!sampler.is_running());
    assert_eq!(queue.drain_all().len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(queue.drain_all().is_empty());
    assert_eq!(src.calls.load(Ordering::SeqCst), 2);

    // An explicit start runs the source again.
    sampler.start().unwrap();
    assert!(next_stop(&mut rx).await.is_some());
    assert_eq!(src.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn closed_queue_stops_the_sampler() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(5)));
    let (mut sampler, queue, mut rx) = sampler_with(src, Some(10.0), LONG_PERIOD);
    drop(queue);

    sampler.start().unwrap();
    assert_eq!(next_stop(&mut rx).await, Some(SamplerError::QueueClosed));
}

#[tokio::test]
async fn set_period_is_visible_immediately() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(5)));
    let (sampler, _queue, _rx) = sampler_with(src, Some(10.0), LONG_PERIOD);
    sampler.set_period(Duration::from_secs(15));
    assert_eq!(sampler.period(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn new_period_applies_after_the_current_sleep() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(5)));
    let (mut sampler, mut queue, _rx) =
        sampler_with(src, Some(10.0), Duration::from_secs(10));

    sampler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(queue.drain_all().len(), 1);

    // The loop is already sleeping 10s; that sleep is not shortened.
    sampler.set_period(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert!(queue.drain_all().is_empty());

    // t = 10.5s: the old sleep ended and produced one tick.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(queue.drain_all().len(), 1);

    // t = 12.6s: ticks at 11s and 12s on the new cadence.
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(queue.drain_all().len(), 2);

    sampler.stop();
}

#[tokio::test]
async fn each_start_gets_a_new_run_id() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(7)));
    let (mut sampler, _queue, mut rx) = sampler_with(src, Some(10.0), LONG_PERIOD);
    assert_eq!(sampler.run_id(), 0);

    sampler.start().unwrap();
    sampler.stop();
    sampler.start().unwrap();
    assert_eq!(sampler.run_id(), 2);
    sampler.stop();

    let mut runs = Vec::new();
    for _ in 0..2 {
        match rx.recv().await {
            Some(AppEvent::SamplerStopped { run, reason }) => {
                assert_eq!(reason, None);
                runs.push(run);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    runs.sort();
    assert_eq!(runs, vec![1, 2]);
}

/// Blocks inside `next_tick` so a stop can land mid-iteration.
struct SlowSource {
    delay: Duration,
}

impl TickSource for SlowSource {
    fn next_tick(&self, last_close: f64, now: DateTime<Local>) -> Result<Tick, SamplerError> {
        std::thread::sleep(self.delay);
        Ok(Tick::from_baseline(now, last_close, last_close, 10_000))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_and_wait_leaves_nothing_in_flight() {
    let src = Arc::new(SlowSource {
        delay: Duration::from_millis(40),
    });
    let (mut sampler, mut queue, _rx) =
        sampler_with(src, Some(10.0), Duration::from_millis(5));

    sampler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(sampler.stop_and_wait(Duration::from_secs(2)).await);
    assert!(sampler.is_finished());
    assert!(!sampler.is_running());

    queue.drain_all();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(queue.drain_all().is_empty());
}

#[tokio::test]
async fn stop_and_wait_without_a_run_returns_at_once() {
    let src = Arc::new(RandomWalkSource::new(0.01, Some(5)));
    let (mut sampler, _queue, _rx) = sampler_with(src, Some(10.0), LONG_PERIOD);
    assert!(sampler.stop_and_wait(Duration::from_millis(10)).await);
}

proptest! {
    #[test]
    fn random_walk_stays_within_band(
        seed in any::<u64>(),
        last_close in 0.5f64..5_000.0,
        max_change in 0.0001f64..0.01,
    ) {
        let src = RandomWalkSource::new(max_change, Some(seed));
        let tick = src.next_tick(last_close, Local::now()).unwrap();
        let tol = last_close * 1e-12;
        prop_assert!(tick.price >= last_close * (1.0 - max_change) - tol);
        prop_assert!(tick.price <= last_close * (1.0 + max_change) + tol);
        prop_assert!((10_000..100_000).contains(&tick.volume));
        prop_assert!((tick.change_amount - (tick.price - last_close)).abs() < 1e-9);
    }
}
