use tokio::sync::mpsc;

use crate::model::tick::Tick;

/// Create the producer/consumer ends of the tick hand-off.
pub fn tick_queue() -> (TickSender, TickQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TickSender { tx }, TickQueue { rx })
}

/// Producer end. Cloning is cheap; enqueueing never blocks.
#[derive(Debug, Clone)]
pub struct TickSender {
    tx: mpsc::UnboundedSender<Tick>,
}

impl TickSender {
    /// Queue a tick. Returns `false` only when the consumer end was dropped,
    /// which happens during shutdown.
    pub fn enqueue(&self, tick: Tick) -> bool {
        match self.tx.send(tick) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!("Tick queue consumer dropped, discarding tick");
                false
            }
        }
    }
}

/// Consumer end. Only batch removal is exposed, so each scheduler cycle
/// sees one consistent batch.
#[derive(Debug)]
pub struct TickQueue {
    rx: mpsc::UnboundedReceiver<Tick>,
}

impl TickQueue {
    /// Remove and return every queued tick in enqueue order.
    pub fn drain_all(&mut self) -> Vec<Tick> {
        let mut batch = Vec::new();
        while let Ok(tick) = self.rx.try_recv() {
            batch.push(tick);
        }
        batch
    }
}
