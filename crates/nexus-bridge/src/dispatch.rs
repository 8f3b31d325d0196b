// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded job queue and worker pool for inbound processing.
//!
//! Webhook requests only persist the raw payload and enqueue a job. Workers
//! pull jobs off a shared receiver until the cancellation token fires. A full
//! queue never blocks the caller; the event stays unprocessed in storage and
//! the replay sweep submits it again later.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use nexus_core::{Platform, TenantId};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Work item for the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Normalize and route a stored webhook event.
    ProcessWebhook { event_id: i64 },
    /// Score a freshly stored inbound message.
    Assist(AssistJob),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistJob {
    pub tenant: TenantId,
    pub platform: Platform,
    pub conversation_id: String,
    pub message_id: String,
    pub external_id: String,
    pub customer_name: Option<String>,
    pub content: String,
}

/// Executes dispatched jobs.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job);
}

#[derive(Default)]
struct Tracker {
    pending: AtomicUsize,
    queued: AtomicUsize,
    idle: Notify,
}

/// Sending half of the dispatcher.
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    capacity: usize,
    tracker: Arc<Tracker>,
}

/// Receiving half, consumed by [`spawn_workers`].
pub struct JobReceiver {
    rx: mpsc::Receiver<Job>,
    tracker: Arc<Tracker>,
    capacity: usize,
}

impl JobQueue {
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let tracker = Arc::new(Tracker::default());
        (
            Self {
                tx,
                capacity,
                tracker: Arc::clone(&tracker),
            },
            JobReceiver {
                rx,
                tracker,
                capacity,
            },
        )
    }

    /// Enqueues without waiting. Returns `false` when the queue is full or
    /// the workers are gone.
    pub fn try_submit(&self, job: Job) -> bool {
        self.tracker.pending.fetch_add(1, Ordering::SeqCst);
        match self.tx.try_send(job) {
            Ok(()) => {
                let depth = self.tracker.queued.fetch_add(1, Ordering::SeqCst) + 1;
                nexus_prometheus::set_queue_depth(depth);
                true
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(?job, "dispatch queue full, job deferred");
                self.tracker.finish_one();
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(?job, "dispatch queue closed, job dropped");
                self.tracker.finish_one();
                false
            }
        }
    }

    /// Jobs waiting in the channel.
    pub fn depth(&self) -> usize {
        self.tracker.queued.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs submitted and not yet finished, including those being handled.
    pub fn pending(&self) -> usize {
        self.tracker.pending.load(Ordering::SeqCst)
    }

    /// Resolves once every submitted job, and every job those jobs
    /// submitted, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.tracker.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Tracker {
    fn dequeued(&self) {
        let depth = self.queued.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        nexus_prometheus::set_queue_depth(depth);
    }

    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Starts `workers` tasks draining `receiver` into `handler`.
pub fn spawn_workers(
    receiver: JobReceiver,
    handler: Arc<dyn JobHandler>,
    workers: usize,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let JobReceiver {
        rx,
        tracker,
        capacity,
    } = receiver;
    let rx = Arc::new(Mutex::new(rx));
    let workers = workers.max(1);
    info!(workers, capacity, "dispatch workers starting");

    (0..workers)
        .map(|worker| {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let tracker = Arc::clone(&tracker);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let job = tokio::select! {
                        _ = cancel.cancelled() => break,
                        job = async { rx.lock().await.recv().await } => match job {
                            Some(job) => job,
                            None => break,
                        },
                    };
                    tracker.dequeued();
                    debug!(worker, ?job, "dispatching job");
                    handler.handle(job).await;
                    tracker.finish_one();
                }
                debug!(worker, "dispatch worker stopped");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Recorder {
        seen: Mutex<Vec<Job>>,
        follow_up: Option<Arc<JobQueue>>,
    }

    #[async_trait]
    impl JobHandler for Recorder {
        async fn handle(&self, job: Job) {
            if let (Job::ProcessWebhook { event_id }, Some(queue)) = (&job, &self.follow_up)
                && *event_id < 100
            {
                queue.try_submit(Job::ProcessWebhook {
                    event_id: event_id + 100,
                });
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.seen.lock().await.push(job);
        }
    }

    #[tokio::test]
    async fn workers_handle_every_submitted_job() {
        let (queue, rx) = JobQueue::new(16);
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            follow_up: None,
        });
        let cancel = CancellationToken::new();
        let handles = spawn_workers(rx, recorder.clone(), 3, cancel.clone());

        for id in 0..10 {
            assert!(queue.try_submit(Job::ProcessWebhook { event_id: id }));
        }
        tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
            .await
            .unwrap();

        let mut ids: Vec<i64> = recorder
            .seen
            .lock()
            .await
            .iter()
            .map(|j| match j {
                Job::ProcessWebhook { event_id } => *event_id,
                Job::Assist(_) => -1,
            })
            .collect();
        ids.sort();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn wait_idle_covers_jobs_submitted_by_jobs() {
        let (queue, rx) = JobQueue::new(16);
        let queue = Arc::new(queue);
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            follow_up: Some(Arc::clone(&queue)),
        });
        let cancel = CancellationToken::new();
        spawn_workers(rx, recorder.clone(), 2, cancel.clone());

        queue.try_submit(Job::ProcessWebhook { event_id: 1 });
        queue.try_submit(Job::ProcessWebhook { event_id: 2 });
        tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
            .await
            .unwrap();

        assert_eq!(recorder.seen.lock().await.len(), 4);
        cancel.cancel();
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (queue, _rx) = JobQueue::new(2);
        assert!(queue.try_submit(Job::ProcessWebhook { event_id: 1 }));
        assert!(queue.try_submit(Job::ProcessWebhook { event_id: 2 }));
        assert!(!queue.try_submit(Job::ProcessWebhook { event_id: 3 }));
        assert_eq!(queue.depth(), 2);
        assert_eq!(queue.pending(), 2);
    }

    #[tokio::test]
    async fn closed_queue_rejects() {
        let (queue, rx) = JobQueue::new(2);
        drop(rx);
        assert!(!queue.try_submit(Job::ProcessWebhook { event_id: 1 }));
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_nothing_pending() {
        let (queue, _rx) = JobQueue::new(4);
        tokio::time::timeout(Duration::from_millis(100), queue.wait_idle())
            .await
            .unwrap();
    }
}
