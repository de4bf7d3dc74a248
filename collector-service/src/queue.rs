use keywatch_core::RawRecord;
use tokio::sync::mpsc;

/// Unbounded multi-producer single-consumer buffer between the collectors
/// and the persistence worker. Producers never block; the consumer drains
/// everything available per cycle.
pub fn raw_message_queue() -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueSender { tx }, QueueReceiver { rx, closed: false })
}

#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<RawRecord>,
}

impl QueueSender {
    /// Returns false when the consumer is gone, which only happens at
    /// process shutdown.
    pub fn push(&self, record: RawRecord) -> bool {
        self.tx.send(record).is_ok()
    }
}

#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<RawRecord>,
    closed: bool,
}

impl QueueReceiver {
    /// Everything currently buffered, in producer-relative order.
    pub fn drain(&mut self) -> Vec<RawRecord> {
        let mut batch = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        batch
    }

    /// True once every producer handle has been dropped and the buffer has
    /// been fully drained.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
