//! Bounded concurrent fan-out with streaming-as-completed delivery
//!
//! Every job runs in its own tokio task and must hold a semaphore permit
//! while it works, so at most `ceiling` jobs are in flight. Finished items
//! are pushed onto a channel the moment they are ready; the consumer sees
//! them in completion order. A job that errors or panics still produces an
//! item through the caller's `on_fault` mapping.

use futures::{FutureExt, Stream};
use std::any::Any;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Items produced by a fan-out, in completion order
///
/// Dropping the stream aborts every job still running.
pub struct JobStream<T> {
    rx: mpsc::Receiver<T>,
    _tasks: JoinSet<()>,
}

impl<T: Send + 'static> JobStream<T> {
    /// Stream over items that are already computed
    pub fn ready(items: Vec<T>) -> Self {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            // capacity covers every item
            let _ = tx.try_send(item);
        }
        Self {
            rx,
            _tasks: JoinSet::new(),
        }
    }

    /// Next finished item, `None` once every job has reported
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Drain the stream
    pub async fn collect(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item);
        }
        items
    }
}

impl<T> Stream for JobStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Run `job_fn` over `jobs` with at most `ceiling` in flight.
///
/// Must be called from within a tokio runtime.
pub fn spawn<K, T, E, F, Fut, H>(jobs: Vec<K>, ceiling: usize, job_fn: F, on_fault: H) -> JobStream<T>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    H: Fn(&K, String) -> T + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(ceiling.max(1)));
    let (tx, rx) = mpsc::channel(jobs.len().max(1));
    let job_fn = Arc::new(job_fn);
    let on_fault = Arc::new(on_fault);
    let mut tasks = JoinSet::new();

    tracing::debug!("Fanning out {} jobs (ceiling={})", jobs.len(), ceiling.max(1));

    for key in jobs {
        let semaphore = Arc::clone(&semaphore);
        let job_fn = Arc::clone(&job_fn);
        let on_fault = Arc::clone(&on_fault);
        let tx = tx.clone();

        tasks.spawn(async move {
            // Held until the job's item is produced
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            let outcome = AssertUnwindSafe(job_fn(key.clone())).catch_unwind().await;

            let item = match outcome {
                Ok(Ok(item)) => item,
                Ok(Err(err)) => on_fault(&key, err.to_string()),
                Err(payload) => on_fault(&key, panic_message(payload)),
            };

            // capacity covers every job
            let _ = tx.send(item).await;
        });
    }

    JobStream { rx, _tasks: tasks }
}

/// Bounded fan-out whose results come back in input order.
///
/// Used where the source order matters (paginated listings); gives up
/// streaming for ordering. A failed or panicked job yields `Err(description)`
/// at its position.
pub async fn collect_ordered<K, T, E, F, Fut>(jobs: Vec<K>, ceiling: usize, job_fn: F) -> Vec<Result<T, String>>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let job_fn = Arc::new(job_fn);
    let indexed: Vec<(usize, K)> = jobs.into_iter().enumerate().collect();

    let stream = spawn(
        indexed,
        ceiling,
        move |(index, key): (usize, K)| {
            let job_fn = Arc::clone(&job_fn);
            async move { Ok::<_, Infallible>((index, job_fn(key).await.map_err(|e| e.to_string()))) }
        },
        |job: &(usize, K), message: String| (job.0, Err(message)),
    );

    let mut results = stream.collect().await;
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown cause".to_string()
    };
    format!("job panicked: {}", detail)
}
