pub mod persistence;
pub mod queue;
pub mod search_collector;
pub mod stream_collector;

pub use persistence::PersistenceWorker;
pub use queue::{raw_message_queue, QueueReceiver, QueueSender};
pub use search_collector::SearchCollector;
pub use stream_collector::{SessionEnd, StreamCollector};
