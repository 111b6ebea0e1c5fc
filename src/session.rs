use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::model::tick::Tick;
use crate::stream::PriceStream;

/// Consumer-side live state. Only the update scheduler writes to it, after
/// draining a batch from the tick queue.
#[derive(Debug, Clone)]
pub struct LiveSession {
    stream: PriceStream,
    overlay: VecDeque<f64>,
    overlay_len: usize,
    latest: Option<Tick>,
    tick_count: u64,
    clock: Option<DateTime<Local>>,
}

impl LiveSession {
    pub fn new(stream_capacity: usize, overlay_len: usize) -> Self {
        Self {
            stream: PriceStream::new(stream_capacity),
            overlay: VecDeque::with_capacity(overlay_len),
            overlay_len,
            latest: None,
            tick_count: 0,
            clock: None,
        }
    }

    pub fn apply(&mut self, tick: &Tick) {
        self.stream.push_tick(tick);
        if self.overlay_len > 0 {
            self.overlay.push_back(tick.price);
            while self.overlay.len() > self.overlay_len {
                self.overlay.pop_front();
            }
        }
        self.latest = Some(tick.clone());
        self.tick_count += 1;
    }

    pub fn set_clock(&mut self, now: DateTime<Local>) {
        self.clock = Some(now);
    }

    pub fn clock(&self) -> Option<DateTime<Local>> {
        self.clock
    }

    pub fn stream(&self) -> &PriceStream {
        &self.stream
    }

    /// Overlay prices, oldest first.
    pub fn overlay(&self) -> Vec<f64> {
        self.overlay.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<&Tick> {
        self.latest.as_ref()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Drop live data, e.g. after switching instrument. The clock survives.
    pub fn reset(&mut self) {
        self.stream.clear();
        self.overlay.clear();
        self.latest = None;
        self.tick_count = 0;
    }
}
