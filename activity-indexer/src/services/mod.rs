pub mod chain;
pub mod event;
pub mod feed;
pub mod rate_limiter;
pub mod storage;
