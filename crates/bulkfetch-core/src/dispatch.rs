//! Fan-out of a job sequence to a fixed pool of worker threads.
//!
//! The producer (the calling thread) feeds jobs into a bounded queue whose
//! capacity equals the worker count, so it can never run far ahead of the
//! workers. After the last job it pushes one end marker per worker and joins
//! them all. Every worker is started up front and sees a [`JobStream`] that
//! ends at the first end marker it pops.

use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

enum Slot<T> {
    Job(T),
    End,
}

/// A worker's view of the shared queue. Yields jobs in global enqueue order
/// (interleaved with other workers) until the end marker or until the
/// producer is gone.
pub struct JobStream<T> {
    rx: Arc<Mutex<Receiver<Slot<T>>>>,
    finished: bool,
}

impl<T> Iterator for JobStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        let slot = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        match slot {
            Ok(Slot::Job(job)) => Some(job),
            Ok(Slot::End) | Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

/// Runs `consumer` on `worker_count` threads, feeding them every item of `jobs`.
///
/// Each job goes to exactly one worker. Returns once all workers have exited,
/// with the value each consumer returned (a worker that panicked is logged and
/// left out). A `worker_count` of 0 is treated as 1.
///
/// `consumer` must drain its stream and not panic; if every worker dies the
/// remaining jobs are dropped rather than blocking the producer forever.
pub fn dispatch<I, T, R, F>(jobs: I, consumer: F, worker_count: usize) -> Result<Vec<R>>
where
    I: IntoIterator<Item = T>,
    T: Send,
    R: Send,
    F: Fn(JobStream<T>) -> R + Sync,
{
    let worker_count = worker_count.max(1);
    let (tx, rx) = mpsc::sync_channel::<Slot<T>>(worker_count);
    let rx = Arc::new(Mutex::new(rx));
    let consumer = &consumer;

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(worker_count);
        let mut spawn_error = None;
        for i in 0..worker_count {
            let stream = JobStream {
                rx: Arc::clone(&rx),
                finished: false,
            };
            let spawned = thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn_scoped(scope, move || consumer(stream));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }
        // Only workers hold the receiver now; if they all exit, sends fail instead of blocking.
        drop(rx);
        tracing::debug!(workers = handles.len(), "workers started");

        if spawn_error.is_none() {
            let mut enqueued = 0u64;
            for job in jobs {
                if tx.send(Slot::Job(job)).is_err() {
                    tracing::error!("all workers exited early; dropping remaining jobs");
                    break;
                }
                enqueued += 1;
            }
            tracing::debug!(enqueued, "all jobs enqueued");
        }

        for _ in 0..handles.len() {
            if tx.send(Slot::End).is_err() {
                break;
            }
        }
        drop(tx);

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            match handle.join() {
                Ok(r) => results.push(r),
                Err(_) => tracing::error!(worker = %name, "worker panicked"),
            }
        }
        tracing::debug!(finished = results.len(), "workers joined");

        match spawn_error {
            Some(e) => Err(e).context("failed to start worker thread"),
            None => Ok(results),
        }
    })
}
