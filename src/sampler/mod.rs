pub mod source;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::SamplerError;
use crate::event::AppEvent;
use crate::queue::TickSender;

pub use source::{RandomWalkSource, TickSource};

/// Last loaded bar close, shared with the sampling task as a single atomic
/// word. Written by the consumer side on history load; a slightly stale read
/// is acceptable.
#[derive(Debug, Clone, Default)]
pub struct Baseline(Arc<AtomicU64>);

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a close. Non-positive or non-finite values clear the baseline.
    pub fn set(&self, close: Option<f64>) {
        let bits = match close {
            Some(c) if c.is_finite() && c > 0.0 => c.to_bits(),
            _ => 0,
        };
        self.0.store(bits, Ordering::Release);
    }

    pub fn get(&self) -> Option<f64> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            bits => Some(f64::from_bits(bits)),
        }
    }
}

struct SamplerRun {
    stop_tx: watch::Sender<bool>,
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Background producer of ticks. One tick per period while running; every
/// tick goes through the [`TickSender`], nothing else is shared.
pub struct TickSampler {
    source: Arc<dyn TickSource>,
    sender: TickSender,
    baseline: Baseline,
    status_tx: mpsc::Sender<AppEvent>,
    period_tx: watch::Sender<Duration>,
    run: Option<SamplerRun>,
    run_id: u64,
}

impl TickSampler {
    pub fn new(
        source: Arc<dyn TickSource>,
        sender: TickSender,
        baseline: Baseline,
        status_tx: mpsc::Sender<AppEvent>,
        period: Duration,
    ) -> Self {
        let (period_tx, _) = watch::channel(period);
        Self {
            source,
            sender,
            baseline,
            status_tx,
            period_tx,
            run: None,
            run_id: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|r| r.running.load(Ordering::Acquire))
    }

    /// Id of the latest run, carried by its `SamplerStopped` report.
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn period(&self) -> Duration {
        *self.period_tx.borrow()
    }

    /// Spawn the sampling loop on the current tokio runtime and return
    /// immediately.
    pub fn start(&mut self) -> Result<(), SamplerError> {
        if self.is_running() {
            return Err(SamplerError::AlreadyRunning);
        }
        // A previous run that already ended leaves only its handle behind.
        self.run.take();
        self.run_id += 1;

        let (stop_tx, stop_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));
        let ctx = LoopContext {
            source: self.source.clone(),
            sender: self.sender.clone(),
            baseline: self.baseline.clone(),
            status_tx: self.status_tx.clone(),
            period_rx: self.period_tx.subscribe(),
            stop_rx,
            running: running.clone(),
            run_id: self.run_id,
        };
        let task = tokio::spawn(sampling_loop(ctx));
        tracing::info!(
            run = self.run_id,
            period_ms = self.period().as_millis() as u64,
            "Sampler started"
        );
        self.run = Some(SamplerRun {
            stop_tx,
            running,
            task,
        });
        Ok(())
    }

    /// Request the loop to exit. Idempotent. Ticks already queued stay queued.
    pub fn stop(&mut self) {
        if let Some(run) = &self.run {
            if run.running.swap(false, Ordering::AcqRel) {
                tracing::info!("Sampler stop requested");
            }
            let _ = run.stop_tx.send(true);
        }
    }

    /// Stop and wait up to `limit` for the task to exit. Once this returns
    /// `true` the run enqueues nothing more.
    pub async fn stop_and_wait(&mut self, limit: Duration) -> bool {
        self.stop();
        let finished = match self.run.as_mut() {
            None => return true,
            Some(run) => tokio::time::timeout(limit, &mut run.task).await.is_ok(),
        };
        if finished {
            self.run = None;
        } else {
            tracing::warn!(run = self.run_id, "Sampler task did not exit in time");
        }
        finished
    }

    /// Applies from the next iteration; a sleep already in progress keeps
    /// the old period.
    pub fn set_period(&self, period: Duration) {
        self.period_tx.send_replace(period);
        tracing::info!(period_ms = period.as_millis() as u64, "Sampler period changed");
    }

    /// Whether the task of the latest run has fully exited.
    pub fn is_finished(&self) -> bool {
        self.run.as_ref().map_or(true, |r| r.task.is_finished())
    }
}

impl Drop for TickSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    source: Arc<dyn TickSource>,
    sender: TickSender,
    baseline: Baseline,
    status_tx: mpsc::Sender<AppEvent>,
    period_rx: watch::Receiver<Duration>,
    stop_rx: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
    run_id: u64,
}

impl LoopContext {
    fn should_stop(&self) -> bool {
        *self.stop_rx.borrow() || !self.running.load(Ordering::Acquire)
    }

    fn sample_once(&self) -> Result<(), SamplerError> {
        let last_close = self.baseline.get().ok_or(SamplerError::NoBaseline)?;
        let started = Instant::now();
        let mut tick = self.source.next_tick(last_close, Local::now())?;
        tick.latency_us = started.elapsed().as_micros() as u64;
        if self.should_stop() {
            return Ok(());
        }
        if !self.sender.enqueue(tick) {
            return Err(SamplerError::QueueClosed);
        }
        Ok(())
    }
}

async fn sampling_loop(mut ctx: LoopContext) {
    let reason = loop {
        if ctx.should_stop() {
            break None;
        }
        if let Err(e) = ctx.sample_once() {
            tracing::error!(error = %e, "Sampler iteration failed, stopping");
            break Some(e);
        }
        let period = *ctx.period_rx.borrow();
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = ctx.stop_rx.changed() => break None,
        }
    };
    ctx.running.store(false, Ordering::Release);
    tracing::info!(run = ctx.run_id, failed = reason.is_some(), "Sampler loop exited");
    let _ = ctx
        .status_tx
        .send(AppEvent::SamplerStopped {
            run: ctx.run_id,
            reason,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_round_trips_and_clears() {
        let b = Baseline::new();
        assert_eq!(b.get(), None);
        b.set(Some(10.25));
        assert_eq!(b.get(), Some(10.25));
        b.set(Some(-1.0));
        assert_eq!(b.get(), None);
        b.set(Some(f64::INFINITY));
        assert_eq!(b.get(), None);
    }
}
