use std::collections::VecDeque;

use crate::model::tick::Tick;

/// Newest-first log of formatted tick lines with a fixed capacity.
#[derive(Debug, Clone)]
pub struct PriceStream {
    lines: VecDeque<String>,
    capacity: usize,
}

impl PriceStream {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PriceStream capacity must be > 0");
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head, evicting the oldest line past capacity.
    pub fn push(&mut self, line: String) {
        self.lines.push_front(line);
        self.lines.truncate(self.capacity);
    }

    pub fn push_tick(&mut self, tick: &Tick) {
        self.push(tick.summary_line());
    }

    /// Lines, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
