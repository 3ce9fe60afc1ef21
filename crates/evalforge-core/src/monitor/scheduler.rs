use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use crate::errors::CoreResult;
use crate::monitor::probe::ProbeExecutor;
use crate::storage::Store;

/// Delay before a newly scheduled test's first tick.
const STARTUP_DELAY: Duration = Duration::from_secs(10);

struct ScheduledTask {
    interval_secs: u64,
    handle: JoinHandle<()>,
}

/// Interval scheduler for synthetic tests: one tokio task per active test.
/// The scheduler only triggers the executor; the single-invocation contract
/// (exactly one Execution per probe) lives in the executor.
pub struct Scheduler {
    store: Store,
    executor: Arc<ProbeExecutor>,
    tasks: Mutex<HashMap<i64, ScheduledTask>>,
}

impl Scheduler {
    pub fn new(store: Store, executor: Arc<ProbeExecutor>) -> Self {
        Self {
            store,
            executor,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile running tasks against the store: spawn tasks for newly
    /// active tests, retire tasks whose test is gone or inactive, respawn
    /// tasks whose interval changed. Call at startup and periodically.
    pub fn sync(&self) -> CoreResult<usize> {
        let active = self.store.list_active_synthetic_tests()?;
        let mut tasks = self.tasks.lock().unwrap();

        let active_ids: HashMap<i64, u64> =
            active.iter().map(|t| (t.id, t.interval_secs)).collect();
        tasks.retain(|id, task| {
            let keep = active_ids.get(id) == Some(&task.interval_secs);
            if !keep {
                tracing::info!(test = *id, "unscheduling synthetic test");
                task.handle.abort();
            }
            keep
        });

        for test in &active {
            if tasks.contains_key(&test.id) {
                continue;
            }
            tracing::info!(
                test = test.id,
                interval_secs = test.interval_secs,
                "scheduling synthetic test"
            );
            tasks.insert(
                test.id,
                ScheduledTask {
                    interval_secs: test.interval_secs,
                    handle: self.spawn(test.id, test.interval_secs),
                },
            );
        }
        Ok(tasks.len())
    }

    fn spawn(&self, test_id: i64, interval_secs: u64) -> JoinHandle<()> {
        let store = self.store.clone();
        let executor = self.executor.clone();
        tokio::spawn(async move {
            sleep(STARTUP_DELAY).await;
            let mut tick = interval(Duration::from_secs(interval_secs.max(1)));
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                // Re-fetch each tick so deletion or deactivation stops the
                // loop even between sync passes.
                let test = match store.get_synthetic_test(test_id) {
                    Ok(test) if test.active => test,
                    Ok(_) => {
                        tracing::info!(test = test_id, "test deactivated, stopping schedule");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(test = test_id, "test gone, stopping schedule");
                        break;
                    }
                };
                if let Err(e) = executor.execute(&test).await {
                    tracing::warn!(test = test_id, error = %e, "scheduled probe failed to record");
                }
            }
        })
    }

    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (_, task) in tasks.drain() {
            task.handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
