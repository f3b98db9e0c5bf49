//! Asynchronous delivery of user-facing notifications.
//!
//! Producers hand a [`NotificationTask`] to a [`NotificationQueue`] and
//! return immediately. The [`Dispatcher`] runs a pool of workers, each with
//! its own bounded channel; tasks are routed by event id so the updates and
//! cancellation of one event are delivered in the order they were queued.
//! Delivery is at-least-once: a failed or panicking send is retried with a
//! linear backoff until `max_attempts` is reached.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use derive_more::Display;
use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::Event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTask {
    BookingConfirmation {
        email: String,
        event_id: Uuid,
        event_title: String,
        tickets_count: i32,
    },
    EventUpdate {
        event_id: Uuid,
        event_title: String,
        message: String,
    },
    EventCancellation {
        event_id: Uuid,
        event_title: String,
        message: String,
    },
}

impl NotificationTask {
    pub fn booking_confirmation(email: String, event: &Event, tickets_count: i32) -> Self {
        NotificationTask::BookingConfirmation {
            email,
            event_id: event.id,
            event_title: event.title.clone(),
            tickets_count,
        }
    }

    pub fn event_update(event: &Event) -> Self {
        NotificationTask::EventUpdate {
            event_id: event.id,
            event_title: event.title.clone(),
            message: format!(
                "Event '{}' has been updated. Check the new details!",
                event.title
            ),
        }
    }

    pub fn event_cancellation(event: &Event) -> Self {
        NotificationTask::EventCancellation {
            event_id: event.id,
            event_title: event.title.clone(),
            message: format!(
                "IMPORTANT: Event '{}' has been CANCELLED. Refunds will be processed shortly.",
                event.title
            ),
        }
    }

    pub fn job_name(&self) -> &'static str {
        match self {
            NotificationTask::BookingConfirmation { .. } => "booking-confirmation",
            NotificationTask::EventUpdate { .. } => "event-update",
            NotificationTask::EventCancellation { .. } => "event-cancellation",
        }
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            NotificationTask::BookingConfirmation { event_id, .. }
            | NotificationTask::EventUpdate { event_id, .. }
            | NotificationTask::EventCancellation { event_id, .. } => *event_id,
        }
    }
}

/// A queued task. `attempt` counts deliveries started so far.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub task: NotificationTask,
    pub attempt: u32,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[display(fmt = "notification queue is full")]
    Timeout,

    #[display(fmt = "notification queue is closed")]
    Closed,
}

impl std::error::Error for EnqueueError {}

#[derive(Debug, Display)]
#[display(fmt = "delivery failed: {}", _0)]
pub struct DeliveryError(pub String);

impl std::error::Error for DeliveryError {}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Queues `task` and returns its job id without waiting for delivery.
    async fn enqueue(&self, task: NotificationTask) -> Result<Uuid, EnqueueError>;
}

/// The side effect of a delivery. Must be safe to repeat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, job: &Job) -> Result<(), DeliveryError>;
}

/// Simulated email/notification sender that only writes log lines.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, job: &Job) -> Result<(), DeliveryError> {
        match &job.task {
            NotificationTask::BookingConfirmation {
                email,
                event_title,
                tickets_count,
                ..
            } => {
                info!("processing booking confirmation for {}", email);
                info!(
                    "[EMAIL] SIMULATION: Sending booking confirmation to {} \
                     for event '{}' ({} tickets).",
                    email, event_title, tickets_count
                );
            }
            NotificationTask::EventUpdate {
                event_id,
                event_title,
                message,
            }
            | NotificationTask::EventCancellation {
                event_id,
                event_title,
                message,
            } => {
                let kind = match job.task {
                    NotificationTask::EventCancellation { .. } => "CANCELLATION",
                    _ => "UPDATE",
                };
                info!("processing notification for event {}: {}", event_id, event_title);
                info!(
                    "[NOTIFICATION] SIMULATION: Sending {} to all customers \
                     who booked event '{}': \"{}\"",
                    kind, event_title, message
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub enqueue_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            enqueue_timeout: Duration::from_millis(500),
        }
    }
}

/// Producer side of the worker pool.
#[derive(Clone)]
pub struct Dispatcher {
    senders: Arc<Vec<mpsc::Sender<Job>>>,
    enqueue_timeout: Duration,
}

/// Stops the worker pool.
pub struct DispatcherHandle {
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the workers on the current tokio runtime.
    pub fn start(
        notifier: Arc<dyn Notifier>,
        config: DispatcherConfig,
    ) -> (Self, DispatcherHandle) {
        let shutdown = CancellationToken::new();
        let worker_count = config.workers.max(1);
        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
            senders.push(tx);
            workers.push(tokio::spawn(run_worker(
                index,
                rx,
                notifier.clone(),
                config.clone(),
                shutdown.clone(),
            )));
        }
        info!("notification dispatcher started with {} workers", worker_count);
        let dispatcher = Dispatcher {
            senders: Arc::new(senders),
            enqueue_timeout: config.enqueue_timeout,
        };
        (dispatcher, DispatcherHandle { shutdown, workers })
    }

    fn shard(&self, event_id: Uuid) -> usize {
        (event_id.as_u128() % self.senders.len() as u128) as usize
    }
}

#[async_trait]
impl NotificationQueue for Dispatcher {
    async fn enqueue(&self, task: NotificationTask) -> Result<Uuid, EnqueueError> {
        let sender = self
            .senders
            .get(self.shard(task.event_id()))
            .ok_or(EnqueueError::Closed)?;
        let job = Job {
            id: Uuid::new_v4(),
            task,
            attempt: 0,
        };
        let id = job.id;
        let name = job.task.job_name();
        match timeout(self.enqueue_timeout, sender.send(job)).await {
            Ok(Ok(())) => {
                debug!("queued {} job {}", name, id);
                Ok(id)
            }
            Ok(Err(_)) => Err(EnqueueError::Closed),
            Err(_) => Err(EnqueueError::Timeout),
        }
    }
}

impl DispatcherHandle {
    /// Lets the workers finish what is already queued, then waits for them.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for worker in self.workers {
            if let Err(err) = worker.await {
                error!("notification worker ended abnormally: {:?}", err);
            }
        }
        info!("notification dispatcher stopped");
    }
}

async fn run_worker(
    index: usize,
    mut rx: mpsc::Receiver<Job>,
    notifier: Arc<dyn Notifier>,
    config: DispatcherConfig,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => return,
            },
        };
        deliver(job, notifier.as_ref(), &config).await;
    }
    rx.close();
    while let Ok(job) = rx.try_recv() {
        deliver(job, notifier.as_ref(), &config).await;
    }
    debug!("notification worker {} drained", index);
}

async fn deliver(mut job: Job, notifier: &dyn Notifier, config: &DispatcherConfig) {
    loop {
        job.attempt += 1;
        match AssertUnwindSafe(notifier.send(&job)).catch_unwind().await {
            Ok(Ok(())) => {
                info!("notification job {} ({}) completed", job.id, job.task.job_name());
                return;
            }
            Ok(Err(err)) => warn!(
                "notification job {} attempt {} failed: {}",
                job.id, job.attempt, err
            ),
            Err(_) => warn!(
                "notification job {} attempt {} panicked",
                job.id, job.attempt
            ),
        }
        if job.attempt >= config.max_attempts {
            error!(
                "notification job {} ({}) failed after {} attempts, dropping it",
                job.id,
                job.task.job_name(),
                job.attempt
            );
            return;
        }
        tokio::time::sleep(config.retry_backoff * job.attempt).await;
    }
}
