use std::fmt;
use std::sync::Arc;

use workers_api::SchedulerError;

use super::{Schedule, Scheduler, Timer};
use crate::config::{BucketSchedulerConfig, PoolConfig, SchedulerConfig};
use crate::pool::Pool;

/// Spreads timers over independent schedulers, each with its own thread and
/// pool.
///
/// A timer always lands in bucket `id % bucket_count`; ids never change, so
/// schedule and unschedule agree on the bucket.
pub struct BucketScheduler {
    buckets: Vec<Scheduler>,
}

impl BucketScheduler {
    pub fn new(config: BucketSchedulerConfig) -> Result<Self, SchedulerError> {
        let count = config.bucket_count.max(1);
        let mut buckets = Vec::with_capacity(count);

        for n in 0..count {
            let pool = Pool::new(
                PoolConfig::default()
                    .with_size(config.pool_size)
                    .with_thread_name_prefix(format!("bucket-{}-worker", n)),
            )?;
            let scheduler = Scheduler::new(
                SchedulerConfig::default()
                    .with_pool(Arc::new(pool))
                    .with_thread_name(format!("bucket-{}", n)),
            )?;
            buckets.push(scheduler);
        }

        Ok(Self { buckets })
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Index of the bucket responsible for `timer`.
    pub fn bucket_index(&self, timer: &Timer) -> usize {
        (timer.id().as_u128() % self.buckets.len() as u128) as usize
    }

    pub fn bucket(&self, index: usize) -> Option<&Scheduler> {
        self.buckets.get(index)
    }

    fn bucket_for(&self, timer: &Timer) -> &Scheduler {
        &self.buckets[self.bucket_index(timer)]
    }
}

impl Schedule for BucketScheduler {
    fn schedule(&self, timer: &Timer) {
        self.bucket_for(timer).schedule(timer);
    }

    fn reschedule(&self, timer: &Timer) -> bool {
        self.bucket_for(timer).reschedule(timer)
    }

    fn unschedule(&self, timer: &Timer) {
        self.bucket_for(timer).unschedule(timer);
    }

    fn wakeup(&self) {
        for bucket in &self.buckets {
            bucket.wakeup();
        }
    }

    /// Disposes every bucket; the first failure is returned after all of them
    /// were attempted.
    fn dispose(&self) -> Result<(), SchedulerError> {
        let mut first_error = None;
        for bucket in &self.buckets {
            if let Err(err) = bucket.dispose() {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_alive(&self) -> bool {
        self.buckets.iter().all(Scheduler::is_alive)
    }
}

impl fmt::Debug for BucketScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketScheduler")
            .field("buckets", &self.buckets.len())
            .finish()
    }
}
