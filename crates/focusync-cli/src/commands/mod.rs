pub mod backoff;
pub mod config;
pub mod failed;
pub mod queue;
pub mod sync;
