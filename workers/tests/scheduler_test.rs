
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use test_helpers::{count, counter, wait_until, WAIT_LIMIT};
use workers::{
    BucketScheduler, BucketSchedulerConfig, PeriodicTimer, Pool, Schedule, Scheduler, SchedulerConfig, Timer,
    TimerConfig,
};

fn scheduler(pool_size: usize) -> Arc<Scheduler> {
    let pool = Arc::new(Pool::with_size(pool_size).unwrap());
    Arc::new(Scheduler::new(SchedulerConfig::default().with_pool(pool)).unwrap())
}

fn config(scheduler: &Arc<Scheduler>, delay: Duration) -> TimerConfig {
    TimerConfig::new(delay).with_scheduler(scheduler.clone())
}

#[test]
fn test_one_shot_timer_fires_once() {
    let scheduler = scheduler(2);
    let (hits, inner) = counter();
    let started = Instant::now();
    let fired_after = Arc::new(Mutex::new(None));
    let record = fired_after.clone();

    let timer = Timer::with_config(config(&scheduler, Duration::from_millis(50)), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        record.lock().get_or_insert(started.elapsed());
        Ok(())
    })
    .unwrap();

    assert!(wait_until(|| count(&hits) == 1));
    thread::sleep(Duration::from_millis(150));

    assert_eq!(count(&hits), 1);
    assert!(fired_after.lock().unwrap() >= Duration::from_millis(50));
    assert!(timer.is_overdue());
    assert_eq!(scheduler.pending(), 0);
    scheduler.dispose().unwrap();
}

#[test]
fn test_timers_fire_in_deadline_order() {
    let scheduler = scheduler(1);
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut timers = Vec::new();

    for (label, delay) in [("late", 120), ("early", 20), ("middle", 70)] {
        let order = order.clone();
        let timer = Timer::with_config(config(&scheduler, Duration::from_millis(delay)), move || {
            order.lock().push(label);
            Ok(())
        })
        .unwrap();
        timers.push(timer);
    }

    assert!(wait_until(|| order.lock().len() == 3));
    assert_eq!(*order.lock(), vec!["early", "middle", "late"]);
    scheduler.dispose().unwrap();
}

#[test]
fn test_many_timers_with_same_delay_all_fire() {
    let scheduler = scheduler(4);
    let (hits, inner) = counter();

    let timers: Vec<Timer> = (0..50)
        .map(|_| {
            let inner = inner.clone();
            Timer::with_config(config(&scheduler, Duration::from_millis(20)), move || {
                inner.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap()
        })
        .collect();

    assert!(wait_until(|| count(&hits) == 50));
    assert_eq!(timers.len(), 50);
    scheduler.dispose().unwrap();
}

#[test]
fn test_periodic_timer_until_cancelled() {
    let scheduler = scheduler(2);
    let (hits, inner) = counter();

    let timer = PeriodicTimer::with_config(config(&scheduler, Duration::from_millis(100)), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    thread::sleep(Duration::from_millis(350));
    timer.cancel();
    // A fire already handed to the pool may still land
    thread::sleep(Duration::from_millis(50));
    let fired = count(&hits);

    assert!((2..=4).contains(&fired), "fired {} times", fired);
    assert!(timer.repeats());
    assert!(timer.is_cancelled());

    thread::sleep(Duration::from_millis(300));
    assert_eq!(count(&hits), fired);
    scheduler.dispose().unwrap();
}

#[test]
fn test_fast_periodic_timer() {
    let scheduler = scheduler(2);
    let (hits, inner) = counter();

    let timer = PeriodicTimer::with_config(config(&scheduler, Duration::from_millis(50)), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    thread::sleep(Duration::from_millis(300));
    assert!(count(&hits) >= 5, "fired {} times", count(&hits));

    timer.cancel();
    thread::sleep(Duration::from_millis(20));
    let fired = count(&hits);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(count(&hits), fired);
    scheduler.dispose().unwrap();
}

#[test]
fn test_reset_postpones_fire() {
    let scheduler = scheduler(1);
    let (hits, inner) = counter();

    let timer = Timer::with_config(config(&scheduler, Duration::from_millis(200)), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    thread::sleep(Duration::from_millis(100));
    timer.reset();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(count(&hits), 0);

    assert!(wait_until(|| count(&hits) == 1));
    scheduler.dispose().unwrap();
}

#[test]
fn test_earlier_timer_wakes_scheduler() {
    let scheduler = scheduler(1);
    let (hits, inner) = counter();

    let _late = Timer::with_config(config(&scheduler, Duration::from_secs(60)), || Ok(())).unwrap();
    let started = Instant::now();
    let _early = Timer::with_config(config(&scheduler, Duration::from_millis(20)), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    assert!(wait_until(|| count(&hits) == 1));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(scheduler.pending(), 1);
    scheduler.dispose().unwrap();
}

#[test]
fn test_failing_callback_does_not_stop_scheduler() {
    let scheduler = scheduler(1);
    let (hits, inner) = counter();

    let _bad = Timer::with_config(config(&scheduler, Duration::from_millis(10)), || {
        Err(anyhow::anyhow!("callback failed"))
    })
    .unwrap();
    let _good = Timer::with_config(config(&scheduler, Duration::from_millis(30)), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    assert!(wait_until(|| count(&hits) == 1));
    assert!(scheduler.is_alive());
    assert_eq!(scheduler.pool().size(), 1);
    scheduler.dispose().unwrap();
}

#[test]
fn test_dispose_stops_scheduler() {
    let scheduler = scheduler(1);
    assert!(scheduler.is_alive());

    scheduler.dispose().unwrap();

    assert!(!scheduler.is_alive());
    assert_eq!(scheduler.pool().size(), 0);
}

#[test]
fn test_bucket_scheduler_routes_by_id() {
    let buckets = Arc::new(
        BucketScheduler::new(BucketSchedulerConfig::default().with_bucket_count(4)).unwrap(),
    );
    let (hits, inner) = counter();
    assert_eq!(buckets.bucket_count(), 4);
    assert!(buckets.is_alive());

    let mut timers = Vec::new();
    for _ in 0..20 {
        let inner = inner.clone();
        let config = TimerConfig::new(Duration::from_millis(20)).with_scheduler(buckets.clone());
        timers.push(
            Timer::with_config(config, move || {
                inner.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap(),
        );
    }

    for timer in &timers {
        let index = buckets.bucket_index(timer);
        assert_eq!(index, (timer.id().as_u128() % 4) as usize);
    }

    assert!(wait_until(|| count(&hits) == 20));
    buckets.dispose().unwrap();
    assert!(!buckets.is_alive());
}

#[test]
fn test_bucket_scheduler_cancel_reaches_right_bucket() {
    let buckets = Arc::new(
        BucketScheduler::new(BucketSchedulerConfig::default().with_bucket_count(3)).unwrap(),
    );
    let config = TimerConfig::new(Duration::from_secs(60)).with_scheduler(buckets.clone());
    let timer = Timer::with_config(config, || Ok(())).unwrap();
    let bucket = buckets.bucket(buckets.bucket_index(&timer)).unwrap();

    assert_eq!(bucket.pending(), 1);
    timer.cancel();
    assert_eq!(bucket.pending(), 0);

    buckets.dispose().unwrap();
}

#[test]
fn test_default_bucket_configuration() {
    let config = BucketSchedulerConfig::default();

    assert_eq!(config.bucket_count, 100);
    assert_eq!(config.pool_size, 1);
}

#[test]
fn test_unbounded_delay_is_saturated() {
    let scheduler = scheduler(1);
    let (hits, inner) = counter();

    let timer = Timer::with_config(config(&scheduler, Duration::MAX), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();
    let periodic = PeriodicTimer::with_config(config(&scheduler, Duration::MAX), || Ok(())).unwrap();

    assert!(!timer.is_overdue());
    assert!(timer.sec_remaining() > 365.0 * 24.0 * 3600.0);
    assert_eq!(scheduler.pending(), 2);

    timer.reset();
    periodic.reset();
    assert!(!periodic.is_overdue());
    assert_eq!(scheduler.pending(), 2);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(count(&hits), 0);
    assert!(scheduler.is_alive());
    scheduler.dispose().unwrap();
}

#[test]
fn test_slow_periodic_callback_does_not_pile_up() {
    let scheduler = scheduler(1);
    let (hits, inner) = counter();

    let timer = PeriodicTimer::with_config(config(&scheduler, Duration::from_millis(2)), move || {
        inner.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        Ok(())
    })
    .unwrap();

    let mut max_backlog = 0;
    let started = Instant::now();
    while started.elapsed() < Duration::from_millis(250) {
        max_backlog = max_backlog.max(scheduler.pool().backlog());
        thread::sleep(Duration::from_millis(5));
    }
    timer.cancel();

    assert!(max_backlog <= 1, "backlog reached {}", max_backlog);
    assert!(count(&hits) >= 2);
    scheduler.dispose().unwrap();
}

#[test]
fn test_bucket_wakeup_keeps_buckets_running() {
    let buckets = Arc::new(
        BucketScheduler::new(BucketSchedulerConfig::default().with_bucket_count(3)).unwrap(),
    );
    let (hits, inner) = counter();

    buckets.wakeup();
    assert!(buckets.is_alive());

    let mut timers = Vec::new();
    for _ in 0..6 {
        let inner = inner.clone();
        let config = TimerConfig::new(Duration::from_millis(20)).with_scheduler(buckets.clone());
        timers.push(
            Timer::with_config(config, move || {
                inner.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap(),
        );
    }
    buckets.wakeup();

    assert!(wait_until(|| count(&hits) == 6));
    assert!((0..3).all(|i| buckets.bucket(i).is_some_and(|bucket| bucket.is_alive())));
    buckets.dispose().unwrap();
}
