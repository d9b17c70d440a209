use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// A spawned task that is aborted when the guard is dropped
#[derive(Debug)]
pub(crate) struct TaskGuard {
    task: JoinHandle<()>,
}

impl TaskGuard {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Named, cancellable timer posting events into the session loop
#[derive(Debug)]
pub(crate) struct TimerHandle {
    name: &'static str,
    _task: TaskGuard,
}

impl TimerHandle {
    /// Post `event` once after `delay`
    pub(crate) fn after<E>(
        name: &'static str,
        delay: Duration,
        events: mpsc::UnboundedSender<E>,
        event: E,
    ) -> Self
    where
        E: Send + 'static,
    {
        let task = TaskGuard::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event);
        });
        Self { name, _task: task }
    }

    /// Post `make()` every `period`, first one period from now
    pub(crate) fn every<E, F>(
        name: &'static str,
        period: Duration,
        events: mpsc::UnboundedSender<E>,
        make: F,
    ) -> Self
    where
        E: Send + 'static,
        F: Fn() -> E + Send + 'static,
    {
        let task = TaskGuard::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(make()).is_err() {
                    break;
                }
            }
        });
        Self { name, _task: task }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the timer; no event is posted after this returns
    pub(crate) fn cancel(self) {
        drop(self);
    }
}
