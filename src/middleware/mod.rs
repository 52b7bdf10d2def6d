pub mod origin;
pub mod rate_limit;

pub use origin::same_origin_middleware;
pub use rate_limit::{client_identity, rate_limit_middleware, RateBucket, RateLimiter};
