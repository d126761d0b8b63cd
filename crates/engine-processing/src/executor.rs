//! Bounded-parallel processing of a lazy stream.
//!
//! A single pump reads the source in order into a queue of capacity `P`;
//! `P` workers take items off the queue and await the unit of work. The
//! first failure stops the pump and prevents further dequeues; work already
//! in flight is allowed to finish before the failure is returned.

use crate::error::ExecutorError;
use futures::{FutureExt, Stream, StreamExt};
use std::{
    any::Any,
    future::Future,
    num::NonZeroUsize,
    panic::AssertUnwindSafe,
    pin::pin,
    sync::{Arc, Mutex},
};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_PARALLELISM: usize = 20;

pub struct BoundedExecutor {
    parallelism: NonZeroUsize,
    cancel: CancellationToken,
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_PARALLELISM).unwrap_or(NonZeroUsize::MIN))
    }
}

impl BoundedExecutor {
    pub fn new(parallelism: NonZeroUsize) -> Self {
        Self {
            parallelism,
            cancel: CancellationToken::new(),
        }
    }

    /// Ties the executor to a caller token. Cancelling it stops the pump and
    /// abandons in-flight work at its next await point.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism.get()
    }

    pub async fn run<S, T, E, F, Fut>(&self, source: S, f: F) -> Result<(), ExecutorError<E>>
    where
        S: Stream<Item = T>,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.try_run(source.map(Ok::<T, E>), f).await
    }

    /// Processes a fallible source. A source error counts as a failure like
    /// any error of `f`.
    pub async fn try_run<S, T, E, F, Fut>(&self, source: S, f: F) -> Result<(), ExecutorError<E>>
    where
        S: Stream<Item = Result<T, E>>,
        T: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let parallelism = self.parallelism.get();
        // Fires on the first failure or when the caller cancels.
        let stop = self.cancel.child_token();
        let failure = FirstFailure::new(stop.clone());

        let (tx, rx) = mpsc::channel::<T>(parallelism);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let f = Arc::new(f);

        let mut workers = JoinSet::new();
        for worker in 0..parallelism {
            let rx = Arc::clone(&rx);
            let f = Arc::clone(&f);
            let stop = stop.clone();
            let cancel = self.cancel.clone();
            let failure = failure.clone();

            workers.spawn(async move {
                loop {
                    let item = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            biased;
                            _ = stop.cancelled() => None,
                            item = rx.recv() => item,
                        }
                    };
                    let Some(item) = item else {
                        break;
                    };

                    // Deferring the call also catches panics raised before the
                    // future is built.
                    let work_fn = &f;
                    let work = AssertUnwindSafe(async move { work_fn(item).await }).catch_unwind();
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        outcome = work => outcome,
                    };

                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            failure.record(worker, ExecutorError::Failed(err));
                            break;
                        }
                        Err(panic) => {
                            let message = panic_message(panic);
                            failure.record(worker, ExecutorError::WorkerPanicked(message));
                            break;
                        }
                    }
                }
            });
        }
        // Workers own the receiver now; the channel closes once they all exit.
        drop(rx);

        let mut source = pin!(source);
        loop {
            let next = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                next = source.next() => next,
            };

            match next {
                None => break,
                Some(Err(err)) => {
                    failure.record(usize::MAX, ExecutorError::Failed(err));
                    break;
                }
                Some(Ok(item)) => {
                    let sent = tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        sent = tx.send(item) => sent,
                    };
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
        // Lets idle workers drain the queue and exit.
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    let message = panic_message(err.into_panic());
                    failure.record(usize::MAX, ExecutorError::WorkerPanicked(message));
                } else {
                    warn!(error = %err, "Worker task aborted");
                }
            }
        }

        if let Some(err) = failure.take() {
            return Err(err);
        }
        if self.cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }
        Ok(())
    }
}

/// Keeps the first failure reported by any task and discards the rest.
struct FirstFailure<E> {
    slot: Arc<Mutex<Option<ExecutorError<E>>>>,
    stop: CancellationToken,
}

impl<E> Clone for FirstFailure<E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            stop: self.stop.clone(),
        }
    }
}

impl<E> FirstFailure<E> {
    fn new(stop: CancellationToken) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            stop,
        }
    }

    fn record(&self, worker: usize, err: ExecutorError<E>) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(err);
            self.stop.cancel();
        } else {
            debug!(worker, "Discarding failure after the first one");
        }
    }

    fn take(&self) -> Option<ExecutorError<E>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests;
