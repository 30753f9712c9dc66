/// Bounded task pool for concurrent report generation
///
/// At most `max_concurrency` tasks run at once. Tasks start in descending
/// priority order (ties keep input order) and results come back in input
/// order. A panicking task yields `TaskError::Panicked` instead of taking the
/// pool down.
use futures::FutureExt;
use std::cmp::Reverse;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled")]
    Cancelled,
}

pub struct PoolTask<F> {
    pub priority: u8,
    pub future: F,
}

impl<F> PoolTask<F> {
    pub fn new(priority: u8, future: F) -> Self {
        Self { priority, future }
    }
}

#[derive(Debug, Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl TaskPool {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn run<T, F>(&self, tasks: Vec<PoolTask<F>>) -> Vec<Result<T, TaskError>>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let count = tasks.len();
        let mut order: Vec<usize> = (0..count).collect();
        order.sort_by_key(|&i| Reverse(tasks[i].priority));

        let mut pending: Vec<Option<F>> = tasks.into_iter().map(|t| Some(t.future)).collect();
        let mut running = JoinSet::new();

        for index in order {
            // Waiting for a permit before spawning keeps start order == priority order
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let Some(future) = pending[index].take() else {
                continue;
            };

            running.spawn(async move {
                let outcome = AssertUnwindSafe(future).catch_unwind().await;
                drop(permit);
                (index, outcome.map_err(|panic| TaskError::Panicked(panic_message(&*panic))))
            });
        }

        let mut results: Vec<Option<Result<T, TaskError>>> = (0..count).map(|_| None).collect();
        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((index, outcome)) => results[index] = Some(outcome),
                Err(e) => tracing::warn!(error = %e, "Pool task did not complete"),
            }
        }

        results
            .into_iter()
            .map(|slot| slot.unwrap_or(Err(TaskError::Cancelled)))
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
