pub mod cursor;
mod http;
pub mod rate_limit;
pub mod search;
pub mod stats;
pub mod stream;

pub use cursor::QueryCursor;
pub use rate_limit::{RateLimitStatus, RateLimitWindow, FALLBACK_RESET};
pub use search::{HttpSearchSource, SearchSource};
pub use stats::{IngestSnapshot, IngestStats};
pub use stream::{
    decode_frame, HttpStreamSession, HttpStreamSource, StreamMessage, StreamSession, StreamSource,
};
