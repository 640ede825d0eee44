// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Single-worker FIFO queue
//!
//! Exactly one path is processed at a time, in arrival order. This keeps
//! model requests to one in flight. A failed or panicking task is reported
//! on its own handle and the worker moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error};

use crate::pipeline::{Outcome, Processor};
use crate::{Result, ShotsortError};

struct Task {
    path: PathBuf,
    done: oneshot::Sender<Result<Outcome>>,
}

/// Handle to a queued task
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<Outcome>>,
}

impl TaskHandle {
    /// Wait for the task to finish
    pub async fn wait(self) -> Result<Outcome> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(ShotsortError::Queue("Worker stopped".to_string())))
    }
}

/// Cheaply cloneable handle to the work queue
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<Task>,
    pending: Arc<watch::Sender<usize>>,
    drained_tx: broadcast::Sender<()>,
}

impl WorkQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn start(processor: Arc<dyn Processor>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0usize);
        let pending = Arc::new(pending);
        let (drained_tx, _) = broadcast::channel(16);

        tokio::spawn(run_worker(processor, rx, pending.clone(), drained_tx.clone()));

        Self {
            tx,
            pending,
            drained_tx,
        }
    }

    /// Append a path to the queue
    pub fn push(&self, path: impl AsRef<Path>) -> TaskHandle {
        let (done, rx) = oneshot::channel();
        let path = path.as_ref().to_path_buf();

        self.pending.send_modify(|n| *n += 1);
        debug!("Queued {:?}", path);

        if self.tx.send(Task { path, done }).is_err() {
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
        }

        TaskHandle { rx }
    }

    /// Number of tasks waiting or running
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Resolves once nothing is waiting or running
    pub async fn drained(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Stream of "queue went from busy to empty" notifications
    ///
    /// Only drains that happen after this call are reported.
    pub fn drain_signal(&self) -> DrainSignal {
        DrainSignal {
            rx: self.drained_tx.subscribe(),
        }
    }
}

/// See [`WorkQueue::drain_signal`]
pub struct DrainSignal {
    rx: broadcast::Receiver<()>,
}

impl DrainSignal {
    /// Wait for the next time the worker finishes its last pending task
    pub async fn next(&mut self) -> Result<()> {
        match self.rx.recv().await {
            // Missed some drains while not listening, the queue still ran dry
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => Ok(()),
            Err(broadcast::error::RecvError::Closed) => {
                Err(ShotsortError::Queue("Queue dropped".to_string()))
            }
        }
    }
}

async fn run_worker(
    processor: Arc<dyn Processor>,
    mut rx: mpsc::UnboundedReceiver<Task>,
    pending: Arc<watch::Sender<usize>>,
    drained_tx: broadcast::Sender<()>,
) {
    while let Some(task) = rx.recv().await {
        let processor = processor.clone();
        let path = task.path.clone();

        // A separate task so a panic stays inside this path's boundary
        let result = match tokio::spawn(async move { processor.process(&path).await }).await {
            Ok(result) => result,
            Err(e) => Err(ShotsortError::Queue(format!("Task aborted: {}", e))),
        };

        if let Err(e) = &result {
            error!("Error processing file {:?}: {}", task.path, e);
        }

        // Count the task as finished before its handle resolves
        pending.send_modify(|n| *n = n.saturating_sub(1));
        if *pending.borrow() == 0 {
            let _ = drained_tx.send(());
        }
        let _ = task.done.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records start/end of every task, sleeping a little for paths named "slow"
    #[derive(Default)]
    struct Recorder {
        log: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Processor for Recorder {
        async fn process(&self, path: &Path) -> Result<Outcome> {
            let name = path.to_string_lossy().into_owned();
            self.log.lock().unwrap().push(format!("start {name}"));

            if name.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }

            let outcome = match name.as_str() {
                "fail" => Err(ShotsortError::Relocation("disk full".to_string())),
                "panic" => panic!("processor blew up"),
                _ => Ok(Outcome::Relocated(PathBuf::from(format!("done/{name}")))),
            };

            self.log.lock().unwrap().push(format!("end {name}"));
            outcome
        }
    }

    #[tokio::test]
    async fn test_tasks_run_one_at_a_time_in_order() {
        let recorder = Arc::new(Recorder::default());
        let queue = WorkQueue::start(recorder.clone());

        let a = queue.push("slow-a");
        let b = queue.push("b");
        let c = queue.push("slow-c");

        assert_eq!(c.wait().await.unwrap(), Outcome::Relocated(PathBuf::from("done/slow-c")));
        assert!(a.wait().await.is_ok());
        assert!(b.wait().await.is_ok());

        let log = recorder.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec!["start slow-a", "end slow-a", "start b", "end b", "start slow-c", "end slow-c"]
        );
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let recorder = Arc::new(Recorder::default());
        let queue = WorkQueue::start(recorder.clone());

        let failed = queue.push("fail");
        let panicked = queue.push("panic");
        let good = queue.push("good");

        assert!(matches!(failed.wait().await, Err(ShotsortError::Relocation(_))));
        assert!(matches!(panicked.wait().await, Err(ShotsortError::Queue(_))));
        assert_eq!(good.wait().await.unwrap(), Outcome::Relocated(PathBuf::from("done/good")));
    }

    #[tokio::test]
    async fn test_drained_after_all_tasks_complete() {
        let recorder = Arc::new(Recorder::default());
        let queue = WorkQueue::start(recorder.clone());

        // Nothing queued yet
        queue.drained().await;

        for name in ["slow-1", "slow-2", "3"] {
            queue.push(name);
        }
        assert!(queue.pending() > 0);

        queue.drained().await;

        assert_eq!(queue.pending(), 0);
        assert_eq!(recorder.log.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_drain_signal_fires_per_busy_period() {
        let recorder = Arc::new(Recorder::default());
        let queue = WorkQueue::start(recorder.clone());
        let mut signal = queue.drain_signal();

        queue.push("slow-x");
        signal.next().await.unwrap();
        assert_eq!(recorder.log.lock().unwrap().len(), 2);

        queue.push("slow-y");
        signal.next().await.unwrap();
        assert_eq!(recorder.log.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_drain_signal_reports_short_busy_periods() {
        let recorder = Arc::new(Recorder::default());
        let queue = WorkQueue::start(recorder.clone());
        let mut signal = queue.drain_signal();

        // Both periods are over before anyone listens
        queue.push("x").wait().await.unwrap();
        queue.push("y").wait().await.unwrap();

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(1), signal.next())
                .await
                .expect("drain was reported")
                .unwrap();
        }
    }
}
