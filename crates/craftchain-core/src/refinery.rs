//! Greedy multi-queue scheduling of refinery work.
//!
//! A [`RefineryPool`] models a limited number of identical stations of one
//! size. Jobs open new queues until the pool is at capacity, then pile onto
//! the queue with the smallest running total -- online greedy list scheduling.
//! Deterministic and reproducible, not provably optimal.

use crate::catalog::ItemClass;
use crate::formula::Formula;
use crate::id::ItemId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default seconds to craft one unit by hand.
pub const DEFAULT_CRAFT_TIME: f64 = 0.5;

/// Output-slot capacity of a refiner for raw resources.
pub const RESOURCE_OUTPUT_BATCH: i64 = 4095;

/// Output-slot capacity of a refiner for everything else.
pub const DEFAULT_OUTPUT_BATCH: i64 = 10;

/// Refiner output-slot capacity for an item class.
pub fn refiner_output_batch(class: ItemClass) -> i64 {
    match class {
        ItemClass::Resource => RESOURCE_OUTPUT_BATCH,
        _ => DEFAULT_OUTPUT_BATCH,
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised when configuring pools.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("refinery pool size must be at least 1")]
    ZeroSize,
}

// ---------------------------------------------------------------------------
// Sizes, jobs, queues
// ---------------------------------------------------------------------------

/// Which station class work runs on. `Craft` is by-hand and always serial;
/// refiner sizes are chosen from a formula's ingredient count.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RefinerySize {
    Craft,
    Medium,
    Big,
}

/// One unit of queued work: a formula batch and how long it runs.
#[derive(Debug, Clone)]
pub struct RefineryJob {
    pub formula: Formula,
    pub duration: Duration,
    pub batch: i64,
}

impl RefineryJob {
    pub fn new(formula: Formula, duration: Duration, batch: i64) -> Self {
        Self {
            formula,
            duration,
            batch,
        }
    }
}

/// An ordered list of jobs bound to one station, with its running total.
#[derive(Debug, Clone, Default)]
pub struct RefineryJobQueue {
    jobs: Vec<RefineryJob>,
    total: Duration,
}

impl RefineryJobQueue {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[RefineryJob] {
        &self.jobs
    }

    pub fn total_time(&self) -> Duration {
        self.total
    }

    pub fn push(&mut self, job: RefineryJob) {
        self.total += job.duration;
        self.jobs.push(job);
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// A bounded (or unbounded) set of job queues for one station size.
///
/// New jobs open fresh queues until the configured size is reached, then go
/// to the queue with the smallest total duration. `max_time` is the pool's
/// makespan; `max_len` the longest queue seen.
#[derive(Debug, Clone)]
pub struct RefineryPool {
    capacity: Option<usize>,
    queues: Vec<RefineryJobQueue>,
    max_time: Duration,
    max_len: usize,
}

impl RefineryPool {
    /// A pool with a fixed number of stations. Zero stations is a
    /// configuration error.
    pub fn bounded(size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::ZeroSize);
        }
        Ok(Self {
            capacity: Some(size),
            queues: Vec::new(),
            max_time: Duration::ZERO,
            max_len: 0,
        })
    }

    /// A pool that opens a new queue for every job.
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            queues: Vec::new(),
            max_time: Duration::ZERO,
            max_len: 0,
        }
    }

    /// Build the pool for a station size from the configured limits.
    pub fn for_size(size: RefinerySize, limits: &RefineryLimits) -> Result<Self, PoolError> {
        match size {
            RefinerySize::Craft => Self::bounded(1),
            RefinerySize::Medium => limits.medium.map_or(Ok(Self::unbounded()), Self::bounded),
            RefinerySize::Big => limits.big.map_or(Ok(Self::unbounded()), Self::bounded),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.capacity.is_none()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of queues opened so far.
    pub fn open_queues(&self) -> usize {
        self.queues.len()
    }

    pub fn queues(&self) -> &[RefineryJobQueue] {
        &self.queues
    }

    /// The pool's makespan: total time of its longest-running queue.
    pub fn max_time(&self) -> Duration {
        self.max_time
    }

    /// Length of the longest queue.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn add_job(&mut self, job: RefineryJob) {
        let queue = self.next_queue();
        queue.push(job);
        let (total, len) = (queue.total_time(), queue.len());
        self.max_time = self.max_time.max(total);
        self.max_len = self.max_len.max(len);
    }

    fn next_queue(&mut self) -> &mut RefineryJobQueue {
        let at_capacity = self
            .capacity
            .is_some_and(|size| self.queues.len() >= size);
        let idx = if at_capacity {
            // Greedy placement: the first queue with the smallest total.
            // Capacity is validated >= 1, so at least one queue is open.
            let mut shortest = 0;
            for (candidate, queue) in self.queues.iter().enumerate() {
                if queue.total_time() < self.queues[shortest].total_time() {
                    shortest = candidate;
                }
            }
            shortest
        } else {
            self.queues.push(RefineryJobQueue::default());
            self.queues.len() - 1
        };
        &mut self.queues[idx]
    }
}

// ---------------------------------------------------------------------------
// Limits and production line
// ---------------------------------------------------------------------------

/// Per-size queue limits for one estimation run. `None` means unlimited.
/// Defaults match the refiner cap of one region: 3 medium, 2 big.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineryLimits {
    pub medium: Option<usize>,
    pub big: Option<usize>,
}

impl Default for RefineryLimits {
    fn default() -> Self {
        Self {
            medium: Some(3),
            big: Some(2),
        }
    }
}

impl RefineryLimits {
    pub fn unlimited() -> Self {
        Self {
            medium: None,
            big: None,
        }
    }
}

/// The three pools one chain or stage estimation schedules into: craft
/// (forced serial), medium refiners and big refiners.
#[derive(Debug, Clone)]
pub struct ProductionLine {
    craft: RefineryPool,
    medium: RefineryPool,
    big: RefineryPool,
}

impl ProductionLine {
    pub fn new(limits: RefineryLimits) -> Result<Self, PoolError> {
        Ok(Self {
            craft: RefineryPool::for_size(RefinerySize::Craft, &limits)?,
            medium: RefineryPool::for_size(RefinerySize::Medium, &limits)?,
            big: RefineryPool::for_size(RefinerySize::Big, &limits)?,
        })
    }

    pub fn pool(&self, size: RefinerySize) -> &RefineryPool {
        match size {
            RefinerySize::Craft => &self.craft,
            RefinerySize::Medium => &self.medium,
            RefinerySize::Big => &self.big,
        }
    }

    pub fn pool_mut(&mut self, size: RefinerySize) -> &mut RefineryPool {
        match size {
            RefinerySize::Craft => &mut self.craft,
            RefinerySize::Medium => &mut self.medium,
            RefinerySize::Big => &mut self.big,
        }
    }

    /// Makespan across all three pools.
    pub fn max_time(&self) -> Duration {
        self.craft
            .max_time()
            .max(self.medium.max_time())
            .max(self.big.max_time())
    }
}
