use crate::error::Error;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How one dispatched task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Failed(String),
    /// The task ran past its deadline. Whatever it returns later is dropped.
    TimedOut,
}

enum Event<T> {
    Started(usize, Instant),
    Finished(usize, Result<T, String>),
}

/// Fixed-size pool running one task per item, each bounded by a timeout
/// measured from the moment a worker picks it up.
pub struct WorkerPool {
    pool: ThreadPool,
    timeout: Duration,
}

impl WorkerPool {
    pub fn new(workers: usize, timeout: Duration) -> Result<Self, Error> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("resolve-{}", i))
            .build()?;
        Ok(Self { pool, timeout })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `task` for every item and returns the outcomes in item order.
    ///
    /// `task` receives its item and the instant it has to be done by.
    /// `progress` is called with `(finished, total)` after each outcome.
    pub fn run<I, T, F>(
        &self,
        items: Vec<I>,
        task: F,
        progress: &dyn Fn(usize, usize),
    ) -> Vec<TaskOutcome<T>>
    where
        I: Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(&I, Instant) -> T + Send + Sync + 'static,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let items = Arc::new(items);
        let task = Arc::new(task);
        let (tx, rx) = mpsc::channel::<Event<T>>();

        for index in 0..total {
            let items = Arc::clone(&items);
            let task = Arc::clone(&task);
            let tx = tx.clone();
            let timeout = self.timeout;
            self.pool.spawn(move || {
                let started = Instant::now();
                if tx.send(Event::Started(index, started)).is_err() {
                    // Collector gave up on this batch.
                    return;
                }
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    task(&items[index], started + timeout)
                }))
                .map_err(panic_message);
                let _ = tx.send(Event::Finished(index, result));
            });
        }
        drop(tx);

        let mut outcomes: Vec<Option<TaskOutcome<T>>> = (0..total).map(|_| None).collect();
        let mut running: HashMap<usize, Instant> = HashMap::new();
        let mut finished = 0;

        while finished < total {
            // With nothing running, wait at most one timeout for a worker to
            // pick up the next task before declaring the pool stuck.
            let wait_until = running
                .values()
                .min()
                .copied()
                .unwrap_or_else(|| Instant::now() + self.timeout);

            match rx.recv_timeout(wait_until.saturating_duration_since(Instant::now())) {
                Ok(Event::Started(index, at)) => {
                    running.insert(index, at + self.timeout);
                }
                Ok(Event::Finished(index, result)) => {
                    running.remove(&index);
                    if outcomes[index].is_none() {
                        outcomes[index] = Some(match result {
                            Ok(value) => TaskOutcome::Completed(value),
                            Err(message) => TaskOutcome::Failed(message),
                        });
                        finished += 1;
                        progress(finished, total);
                    }
                }
                Err(RecvTimeoutError::Timeout) if running.is_empty() => {
                    warn!(
                        "No worker picked up a task within {:?}, abandoning {} tasks",
                        self.timeout,
                        total - finished
                    );
                    for outcome in outcomes.iter_mut().filter(|o| o.is_none()) {
                        *outcome = Some(TaskOutcome::TimedOut);
                    }
                    finished = total;
                    progress(finished, total);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    for outcome in outcomes.iter_mut().filter(|o| o.is_none()) {
                        *outcome = Some(TaskOutcome::Failed("worker pool shut down".to_string()));
                    }
                    finished = total;
                    progress(finished, total);
                }
            }

            let now = Instant::now();
            let overdue: Vec<usize> = running
                .iter()
                .filter(|(_, deadline)| **deadline <= now)
                .map(|(index, _)| *index)
                .collect();
            for index in overdue {
                running.remove(&index);
                if outcomes[index].is_none() {
                    debug!("Task {} exceeded {:?}", index, self.timeout);
                    outcomes[index] = Some(TaskOutcome::TimedOut);
                    finished += 1;
                    progress(finished, total);
                }
            }
        }

        outcomes
            .into_iter()
            .map(|o| o.unwrap_or(TaskOutcome::TimedOut))
            .collect()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
