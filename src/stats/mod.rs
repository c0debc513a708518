//! Response bookkeeping.
//!
//! # Data Flow
//! ```text
//! resolved status
//!     → counters.rs (all + class bucket, atomic)
//!     → statistics.rs (callback may inspect and force logging)
//!     → bitmask.rs (decide whether the access-log line is written)
//! ```

pub mod bitmask;
pub mod counters;
pub mod statistics;

pub use bitmask::{
    LogBitmask, LOG_STATUS_1XX, LOG_STATUS_2XX, LOG_STATUS_3XX, LOG_STATUS_4XX, LOG_STATUS_5XX,
    LOG_STATUS_ALL, LOG_STATUS_ERRORS,
};
pub use counters::{Bucket, Counters};
pub use statistics::{Callback, Statistics};
