//! Blocking single-thread scheduler: one run at an absolute time, then one
//! run per interval, re-armed from the moment each run fires.

use chrono::{DateTime, Local};
use log::info;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SCHEDULE_FORMAT;
use crate::shutdown::Shutdown;

pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

// How often the wait checks the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Scheduler {
    first_run: DateTime<Local>,
    interval: Duration,
    poll_interval: Duration,
    shutdown: Shutdown,
}

impl Scheduler {
    pub fn daily(first_run: DateTime<Local>, shutdown: Shutdown) -> Self {
        Scheduler::new(first_run, DAILY, shutdown)
    }

    pub fn new(first_run: DateTime<Local>, interval: Duration, shutdown: Shutdown) -> Self {
        Scheduler {
            first_run,
            interval,
            poll_interval: POLL_INTERVAL,
            shutdown,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Wall-clock time of the run after one firing at `fired_at`.
    pub fn next_fire_time(&self, fired_at: DateTime<Local>) -> Option<DateTime<Local>> {
        let step = chrono::Duration::from_std(self.interval).ok()?;
        fired_at.checked_add_signed(step)
    }

    /// Block until shutdown is requested, calling `job` at every due time.
    ///
    /// A first run time already in the past fires immediately. The next
    /// deadline is taken from the instant a run fires, so a slow job pushes
    /// later runs back but never makes them overlap or get skipped. Returns
    /// the number of completed runs.
    pub fn run<F: FnMut()>(&self, mut job: F) -> usize {
        info!("New schedule: {}", self.first_run.format(SCHEDULE_FORMAT));
        let mut deadline = Instant::now() + delay_until(self.first_run, Local::now());
        let mut runs = 0;

        while self.wait_until(deadline) {
            let fired = Instant::now();
            match self.next_fire_time(Local::now()) {
                Some(next) => info!("New schedule for next run: {}", next.format(SCHEDULE_FORMAT)),
                None => info!("New schedule for next run: in {:?}", self.interval),
            }
            deadline = fired + self.interval;

            job();
            runs += 1;
        }

        info!("Scheduler stopped after {} runs", runs);
        runs
    }

    /// Sleep until `deadline` in poll-sized slices. False when shutdown was requested.
    fn wait_until(&self, deadline: Instant) -> bool {
        loop {
            if self.shutdown.is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(self.poll_interval));
        }
    }
}

fn delay_until(at: DateTime<Local>, now: DateTime<Local>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_millis(5);

    fn in_millis(ms: i64) -> DateTime<Local> {
        Local::now() + chrono::Duration::milliseconds(ms)
    }

    #[test]
    fn first_run_waits_for_the_armed_time() {
        let shutdown = Shutdown::new();
        let started = Instant::now();
        let scheduler = Scheduler::new(in_millis(200), DAILY, shutdown.clone()).with_poll_interval(POLL);
        let mut fired_after = None;
        let runs = scheduler.run(|| {
            fired_after = Some(started.elapsed());
            shutdown.request();
        });
        assert_eq!(runs, 1);
        assert!(fired_after.unwrap() >= Duration::from_millis(190));
    }

    #[test]
    fn past_first_run_fires_immediately() {
        let shutdown = Shutdown::new();
        let started = Instant::now();
        let scheduler = Scheduler::new(in_millis(-3_600_000), DAILY, shutdown.clone()).with_poll_interval(POLL);
        let runs = scheduler.run(|| shutdown.request());
        assert_eq!(runs, 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn rearms_from_the_fire_instant_not_completion() {
        let shutdown = Shutdown::new();
        let interval = Duration::from_millis(200);
        let scheduler = Scheduler::new(in_millis(0), interval, shutdown.clone()).with_poll_interval(POLL);
        let mut fires = Vec::new();
        let runs = scheduler.run(|| {
            fires.push(Instant::now());
            thread::sleep(Duration::from_millis(150));
            if fires.len() == 3 {
                shutdown.request();
            }
        });

        assert_eq!(runs, 3);
        for pair in fires.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= interval, "{gap:?}");
            // anchored on completion this would be at least 350ms
            assert!(gap < Duration::from_millis(320), "{gap:?}");
        }
    }

    #[test]
    fn job_longer_than_interval_runs_back_to_back() {
        let shutdown = Shutdown::new();
        let scheduler =
            Scheduler::new(in_millis(0), Duration::from_millis(10), shutdown.clone()).with_poll_interval(POLL);
        let mut count = 0;
        let runs = scheduler.run(|| {
            count += 1;
            thread::sleep(Duration::from_millis(30));
            if count == 2 {
                shutdown.request();
            }
        });
        assert_eq!(runs, 2);
    }

    #[test]
    fn shutdown_while_idle_stops_without_running() {
        let shutdown = Shutdown::new();
        let scheduler = Scheduler::daily(in_millis(3_600_000), shutdown.clone()).with_poll_interval(POLL);
        let stopper = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                shutdown.request();
            })
        };
        let started = Instant::now();
        let runs = scheduler.run(|| panic!("must not run"));
        stopper.join().unwrap();
        assert_eq!(runs, 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn next_fire_time_is_one_day_later() {
        let scheduler = Scheduler::daily(Local::now(), Shutdown::new());
        let fired = Local::now();
        assert_eq!(
            scheduler.next_fire_time(fired).unwrap() - fired,
            chrono::Duration::hours(24)
        );
    }
}
