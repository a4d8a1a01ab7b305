//! Clock-driven scheduler for the pipeline's periodic tasks.
//!
//! Tasks are plain functions over a shared context. Each task is single-flight:
//! a task still running when it falls due again is skipped, never queued.
//!
//! [`Scheduler::run_due`] runs due tasks inline against the injected clock,
//! which makes tick sequences deterministic under a manual clock.
//! [`Scheduler::run`] drives the same tasks from tokio timers, dispatching
//! each execution onto a blocking worker thread.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// A scheduled task body.
pub type TaskFn<C> = fn(&C, DateTime<Utc>) -> anyhow::Result<()>;

/// Guard that lets at most one holder run at a time.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: Arc<AtomicBool>,
}

impl SingleFlight {
    /// Creates an idle guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the guard, or returns `None` if it is already held.
    #[must_use]
    pub fn try_acquire(&self) -> Option<FlightPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Returns true while a permit is held.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held while a single-flight operation runs. Released on drop.
#[derive(Debug)]
pub struct FlightPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// What happened to a due task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The task ran and succeeded.
    Completed,
    /// The task ran and returned an error.
    Failed,
    /// The previous run was still in flight.
    Skipped,
}

struct ScheduledTask<C> {
    name: &'static str,
    every: Duration,
    next_due: DateTime<Utc>,
    run: TaskFn<C>,
    flight: SingleFlight,
}

/// Runs named tasks on fixed intervals.
pub struct Scheduler<C> {
    context: Arc<C>,
    clock: Arc<dyn Clock>,
    tasks: Vec<ScheduledTask<C>>,
}

impl<C: Send + Sync + 'static> Scheduler<C> {
    /// Creates a scheduler with no tasks.
    #[must_use]
    pub fn new(context: Arc<C>, clock: Arc<dyn Clock>) -> Self {
        Self {
            context,
            clock,
            tasks: Vec::new(),
        }
    }

    /// Adds a task that first falls due one period from now.
    ///
    /// A period too long to represent never falls due.
    #[must_use]
    pub fn every(mut self, name: &'static str, every: Duration, run: TaskFn<C>) -> Self {
        self.tasks.push(ScheduledTask {
            name,
            every,
            next_due: after(self.clock.now(), every),
            run,
            flight: SingleFlight::new(),
        });
        self
    }

    /// Names of the registered tasks.
    #[must_use]
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name).collect()
    }

    /// Runs every task that is due at the clock's current time, inline.
    ///
    /// Periods missed while the clock jumped are skipped; each due task runs
    /// at most once per call.
    pub fn run_due(&mut self) -> Vec<(&'static str, Dispatch)> {
        let now = self.clock.now();
        let mut outcomes = Vec::new();

        for task in &mut self.tasks {
            if task.next_due > now {
                continue;
            }
            while task.next_due <= now {
                task.next_due = after(task.next_due, task.every);
            }

            let outcome = match task.flight.try_acquire() {
                Some(_permit) => execute(task.name, task.run, &self.context, now),
                None => {
                    warn!(task = task.name, "Task still in flight, skipping tick");
                    Dispatch::Skipped
                }
            };
            outcomes.push((task.name, outcome));
        }

        outcomes
    }

    /// Drives every task from tokio timers until `shutdown` flips to true.
    ///
    /// On shutdown no new executions are dispatched and in-flight executions
    /// are awaited before this returns.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut drivers = JoinSet::new();
        for task in self.tasks {
            drivers.spawn(drive(
                task,
                Arc::clone(&self.context),
                Arc::clone(&self.clock),
                shutdown.clone(),
            ));
        }
        while drivers.join_next().await.is_some() {}
        info!("Scheduler stopped");
    }
}

/// `from + every`, saturating at the latest representable time.
fn after(from: DateTime<Utc>, every: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(every)
        .ok()
        .and_then(|period| from.checked_add_signed(period))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn execute<C>(name: &'static str, run: TaskFn<C>, context: &C, now: DateTime<Utc>) -> Dispatch {
    match run(context, now) {
        Ok(()) => {
            debug!(task = name, "Task completed");
            Dispatch::Completed
        }
        Err(e) => {
            error!(task = name, error = %e, "Task failed");
            Dispatch::Failed
        }
    }
}

async fn drive<C: Send + Sync + 'static>(
    task: ScheduledTask<C>,
    context: Arc<C>,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(first) = Instant::now().checked_add(task.every) else {
        warn!(
            task = task.name,
            every = ?task.every,
            "Task period out of range, never scheduling"
        );
        let _ = shutdown.wait_for(|stop| *stop).await;
        return;
    };
    let mut ticker = tokio::time::interval_at(first, task.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                while in_flight.try_join_next().is_some() {}

                let Some(permit) = task.flight.try_acquire() else {
                    warn!(task = task.name, "Task still in flight, skipping tick");
                    continue;
                };
                let context = Arc::clone(&context);
                let now = clock.now();
                let (name, run) = (task.name, task.run);
                in_flight.spawn_blocking(move || {
                    let _permit = permit;
                    execute(name, run, &context, now)
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!(task = task.name, error = %e, "Task panicked during shutdown drain");
        }
    }
    debug!(task = task.name, "Task driver stopped");
}
