//! Status-class counters.
//!
//! # Responsibilities
//! - Count responses per status class (1xx..5xx) plus a running total
//! - Read or read-and-reset any single counter without locking
//!
//! # Design Decisions
//! - One `AtomicU64` per bucket; buckets are independent so no lock is needed
//! - Shared through `Arc` rather than a process-wide static, so tests and
//!   multiple supervisors in one process each get their own set

use std::sync::atomic::{AtomicU64, Ordering};

/// A counter slot.
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    All = 0,
    Informational = 1,
    Success = 2,
    Redirection = 3,
    ClientError = 4,
    ServerError = 5,
}

impl Bucket {
    /// Resolve a status code to its class bucket.
    ///
    /// Codes outside 100..=599 are clamped into the nearest class. A status of
    /// zero never reaches here in practice because flush normalizes it to 200.
    pub fn for_status(status: u16) -> Self {
        match status / 100 {
            0 | 1 => Bucket::Informational,
            2 => Bucket::Success,
            3 => Bucket::Redirection,
            4 => Bucket::ClientError,
            _ => Bucket::ServerError,
        }
    }

    /// Label used for metrics (`"1xx"`, ..., `"all"`).
    pub fn label(self) -> &'static str {
        match self {
            Bucket::All => "all",
            Bucket::Informational => "1xx",
            Bucket::Success => "2xx",
            Bucket::Redirection => "3xx",
            Bucket::ClientError => "4xx",
            Bucket::ServerError => "5xx",
        }
    }
}

/// Response counters for one supervisor.
///
/// ```
/// use std::sync::Arc;
/// use request_supervisor::stats::Counters;
///
/// let counters = Arc::new(Counters::new());
/// counters.increment(404);
/// assert_eq!(counters.get_4xx(), 1);
/// assert_eq!(counters.get_all(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Counters {
    counters: [AtomicU64; 6],
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one response: the total first, then its class.
    pub fn increment(&self, status: u16) {
        self.counters[Bucket::All as usize].fetch_add(1, Ordering::Relaxed);
        self.counters[Bucket::for_status(status) as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, bucket: Bucket) -> u64 {
        self.counters[bucket as usize].load(Ordering::Relaxed)
    }

    /// Return the bucket's value and zero it in one atomic step.
    pub fn get_and_reset(&self, bucket: Bucket) -> u64 {
        self.counters[bucket as usize].swap(0, Ordering::Relaxed)
    }

    pub fn get_all(&self) -> u64 {
        self.get(Bucket::All)
    }

    pub fn get_1xx(&self) -> u64 {
        self.get(Bucket::Informational)
    }

    pub fn get_2xx(&self) -> u64 {
        self.get(Bucket::Success)
    }

    pub fn get_3xx(&self) -> u64 {
        self.get(Bucket::Redirection)
    }

    pub fn get_4xx(&self) -> u64 {
        self.get(Bucket::ClientError)
    }

    pub fn get_5xx(&self) -> u64 {
        self.get(Bucket::ServerError)
    }

    pub fn get_and_reset_all(&self) -> u64 {
        self.get_and_reset(Bucket::All)
    }

    pub fn get_and_reset_1xx(&self) -> u64 {
        self.get_and_reset(Bucket::Informational)
    }

    pub fn get_and_reset_2xx(&self) -> u64 {
        self.get_and_reset(Bucket::Success)
    }

    pub fn get_and_reset_3xx(&self) -> u64 {
        self.get_and_reset(Bucket::Redirection)
    }

    pub fn get_and_reset_4xx(&self) -> u64 {
        self.get_and_reset(Bucket::ClientError)
    }

    pub fn get_and_reset_5xx(&self) -> u64 {
        self.get_and_reset(Bucket::ServerError)
    }
}
