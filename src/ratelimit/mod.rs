//! Rate limiting primitives and their composition.

mod backend;
mod bucket;
mod multi;
mod rate;

pub use backend::RateLimiter;
pub use bucket::TokenBucket;
pub use multi::MultiLimiter;
pub use rate::{Limit, TimeUnit};
