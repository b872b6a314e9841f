pub mod cache;
pub mod error;
pub mod target;
pub mod upstream;

pub use cache::{
    CacheEntry, CacheStats, Clock, Lookup, ManualClock, Payload, ResponseCache, RetentionPolicy,
    SystemClock, UpstreamResponse,
};
pub use error::{ProxyError, SharedProxyError};
pub use upstream::UpstreamClient;
