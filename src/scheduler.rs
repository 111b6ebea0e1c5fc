use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::model::tick::Tick;
use crate::queue::TickQueue;

/// Receiver of one scheduler cycle's work.
pub trait TickSink {
    /// Apply one drained tick. Called in generation order.
    fn apply_tick(&mut self, tick: &Tick);

    /// Refresh the wall-clock display. Called every cycle.
    fn refresh_clock(&mut self, now: DateTime<Local>);

    /// Pending chart changes not caused by ticks, e.g. a history reload.
    fn needs_redraw(&self) -> bool {
        false
    }

    /// Rebuild the chart. Called at most once per cycle.
    fn redraw(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub applied: usize,
    pub redrawn: bool,
}

/// Cancels an [`UpdateScheduler`] from anywhere.
#[derive(Debug, Clone, Default)]
pub struct SchedulerHandle(Arc<AtomicBool>);

impl SchedulerHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Fixed-cadence consumer of the tick queue, independent of the sampling
/// period. The UI event loop asks when the next cycle is due and runs it.
#[derive(Debug)]
pub struct UpdateScheduler {
    queue: TickQueue,
    period: Duration,
    next_due: Instant,
    handle: SchedulerHandle,
    cycles: u64,
}

impl UpdateScheduler {
    pub fn new(queue: TickQueue, period: Duration) -> Self {
        assert!(!period.is_zero(), "scheduler period must be > 0");
        Self {
            queue,
            period,
            next_due: Instant::now(),
            handle: SchedulerHandle::default(),
            cycles: 0,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Time left until the next cycle, zero if overdue.
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    /// Drop queued ticks without applying them, e.g. after the instrument
    /// changed. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        self.queue.drain_all().len()
    }

    /// Drain the queue, apply every tick in order, refresh the clock and
    /// redraw at most once. Returns `None` once cancelled.
    pub fn run_cycle<S: TickSink>(&mut self, sink: &mut S, now: DateTime<Local>) -> Option<CycleReport> {
        if self.handle.is_cancelled() {
            return None;
        }
        let batch = self.queue.drain_all();
        for tick in &batch {
            sink.apply_tick(tick);
        }
        sink.refresh_clock(now);
        let redrawn = !batch.is_empty() || sink.needs_redraw();
        if redrawn {
            sink.redraw();
        }
        self.cycles += 1;
        if batch.len() > 1 {
            tracing::debug!(batch = batch.len(), "Applied tick burst in one cycle");
        }
        Some(CycleReport {
            applied: batch.len(),
            redrawn,
        })
    }

    /// Run a cycle if one is due and schedule the next one.
    pub fn poll<S: TickSink>(&mut self, sink: &mut S, now: Instant) -> Option<CycleReport> {
        if !self.is_due(now) {
            return None;
        }
        let report = self.run_cycle(sink, Local::now());
        self.mark_ran(now);
        report
    }

    /// Schedule the next cycle after one that ran at `now`. Missed slots
    /// are skipped rather than replayed as a burst.
    pub fn mark_ran(&mut self, now: Instant) {
        while self.next_due <= now {
            self.next_due += self.period;
        }
    }
}
