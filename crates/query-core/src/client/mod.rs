//! Outbound Client Discipline
//!
//! Generic throttle, retry-with-backoff, and cursor pagination shared by every
//! client that talks to an external service.

mod paginate;
mod retry;

pub use paginate::{paginate, Connection, Edge, PageInfo};
pub use retry::{retry_with_backoff, RetryPolicy, RetryState, Throttle};
