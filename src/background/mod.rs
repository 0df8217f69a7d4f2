//! Background tasks — fire-and-forget work that must not hold up a response.
//!
//! [`TaskQueue`] accepts jobs without blocking the caller and runs them on
//! the Tokio runtime behind a bounded queue:
//!
//! - the queue holds at most `capacity` pending jobs; submitting to a full
//!   queue fails fast with [`TaskError::QueueFull`] instead of waiting;
//! - at most `max_in_flight` jobs run concurrently;
//! - a job that fails or panics is logged and otherwise ignored.
//!
//! The response cache uses it for cache writes after a miss: the response
//! goes back to the client immediately while the write proceeds here.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

/// Errors returned by [`TaskQueue::submit`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("background queue is full, dropping task `{name}`")]
    QueueFull { name: &'static str },

    #[error("background dispatcher has shut down")]
    Closed,
}

struct Task {
    name: &'static str,
    future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
}

/// A bounded, non-blocking queue of background jobs.
///
/// Cloning is cheap; clones feed the same dispatcher. The dispatcher stops
/// once every clone has been dropped and the queue has drained.
///
/// # Examples
///
/// ```rust,no_run
/// use cachegate::background::TaskQueue;
///
/// # async fn example() {
/// let queue = TaskQueue::new(128, 8);
/// queue
///     .submit("warm-up", async { Ok::<_, std::io::Error>(()) })
///     .expect("queue has room");
/// # }
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Task>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl TaskQueue {
    /// Creates a queue and spawns its dispatcher on the current runtime.
    ///
    /// Both limits are clamped to at least 1.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(capacity: usize, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let permits = Arc::new(Semaphore::new(max_in_flight));

        tokio::spawn(dispatch(rx, Arc::clone(&permits)));

        Self {
            tx,
            permits,
            max_in_flight,
        }
    }

    /// Queues `job` for background execution without waiting for it.
    ///
    /// An `Err` outcome of the job is logged at `warn` with `name`.
    ///
    /// # Errors
    ///
    /// - [`TaskError::QueueFull`] — the queue is at capacity; the job is dropped.
    /// - [`TaskError::Closed`] — the dispatcher is gone; the job is dropped.
    pub fn submit<F, E>(&self, name: &'static str, job: F) -> Result<(), TaskError>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let future = Box::pin(async move {
            if let Err(e) = job.await {
                warn!(task = name, error = %e, "background task failed");
            }
        });

        self.tx
            .try_send(Task { name, future })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TaskError::QueueFull { name },
                mpsc::error::TrySendError::Closed(_) => TaskError::Closed,
            })
    }

    /// Jobs accepted but not finished yet: queued plus running. A job the
    /// dispatcher holds while waiting for a free slot is not counted.
    pub fn pending(&self) -> usize {
        let queued = self.tx.max_capacity() - self.tx.capacity();
        let running = self.max_in_flight - self.permits.available_permits();
        queued + running
    }
}

// Pulls jobs off the queue and runs each as its own task once a permit is free.
async fn dispatch(mut rx: mpsc::Receiver<Task>, permits: Arc<Semaphore>) {
    while let Some(task) = rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };

        tokio::spawn(async move {
            let name = task.name;
            // Run in a nested task so a panic surfaces as a JoinError here.
            if let Err(e) = tokio::spawn(task.future).await {
                warn!(task = name, error = %e, "background task aborted");
            }
            drop(permit);
        });
    }

    debug!("background dispatcher stopped");
}
