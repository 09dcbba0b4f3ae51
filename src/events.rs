//! Event loop that drives a [`CacheWorker`] from a host runtime.
//!
//! The host translates its lifecycle notifications into [`WorkerEvent`]s and
//! pushes them through a [`WorkerHandle`]. Lifecycle events are handled one
//! at a time in arrival order, while fetches are answered from spawned tasks
//! so a slow origin never blocks the loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::net::{Network, Request};
use crate::store::CacheStore;
use crate::worker::{CacheWorker, FetchDecision};

/// Events a host runtime dispatches to the worker.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A new worker version was installed and should pre-fetch its core files.
    Install {
        /// Resolved once installation finishes.
        done: oneshot::Sender<Result<()>>,
    },
    /// The installed version took over and should upgrade the caches.
    Activate {
        /// Resolved once activation finishes.
        done: oneshot::Sender<()>,
    },
    /// A request was intercepted and the worker may answer it.
    Fetch {
        /// The intercepted request.
        request: Request,
        /// Resolved with the worker's decision for this request.
        reply: oneshot::Sender<Result<FetchDecision>>,
    },
    /// A client posted a message to the worker.
    Message {
        /// Raw message payload.
        data: String,
    },
}

/// Cheaply cloneable sender half used to dispatch events into the loop.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerHandle {
    /// Dispatches an install event and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if installation fails or the loop has terminated.
    pub async fn install(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.events
            .send(WorkerEvent::Install { done: done_tx })
            .map_err(|_| Error::Terminated)?;
        done_rx.await.map_err(|_| Error::Terminated)?
    }

    /// Dispatches an activate event and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop has terminated.
    pub async fn activate(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.events
            .send(WorkerEvent::Activate { done: done_tx })
            .map_err(|_| Error::Terminated)?;
        done_rx.await.map_err(|_| Error::Terminated)
    }

    /// Dispatches an intercepted request and waits for the worker's decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the loop has terminated.
    pub async fn fetch(&self, request: Request) -> Result<FetchDecision> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .send(WorkerEvent::Fetch {
                request,
                reply: reply_tx,
            })
            .map_err(|_| Error::Terminated)?;
        reply_rx.await.map_err(|_| Error::Terminated)?
    }

    /// Dispatches a client message without waiting for it to be handled.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop has terminated.
    pub fn message(&self, data: impl Into<String>) -> Result<()> {
        self.events
            .send(WorkerEvent::Message { data: data.into() })
            .map_err(|_| Error::Terminated)
    }
}

/// A worker loop running on the tokio runtime.
pub struct WorkerTask {
    handle: WorkerHandle,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerTask {
    /// Returns a handle for dispatching events into the loop.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Stops the loop once the event currently being handled finishes.
    ///
    /// In-flight fetch tasks are drained before this returns, so every
    /// dispatched reply channel is resolved or dropped by the time it does.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}

/// Spawns the event loop for `worker` on the current tokio runtime.
#[must_use]
pub fn spawn<S, N>(worker: CacheWorker<S, N>) -> WorkerTask
where
    S: CacheStore + 'static,
    N: Network + 'static,
{
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run(Arc::new(worker), events_rx, shutdown.clone()));
    WorkerTask {
        handle: WorkerHandle { events: events_tx },
        shutdown,
        task,
    }
}

/// Runs the event loop until `shutdown` is cancelled or every handle is gone.
///
/// Install, activate and message events are awaited inline, so they are
/// handled strictly in arrival order. Fetch events are spawned into a task
/// set and answered through their reply channels as they complete.
pub async fn run<S, N>(
    worker: Arc<CacheWorker<S, N>>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    shutdown: CancellationToken,
) where
    S: CacheStore + 'static,
    N: Network + 'static,
{
    let mut fetches: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_event(&worker, &mut fetches, event).await;
            }
            Some(result) = fetches.join_next() => {
                if let Err(err) = result {
                    log::error!("Fetch task failed: {err}");
                }
            }
        }
    }

    // Let in-flight fetches finish so their reply channels resolve.
    while let Some(result) = fetches.join_next().await {
        if let Err(err) = result {
            log::error!("Fetch task failed: {err}");
        }
    }
}

async fn handle_event<S, N>(
    worker: &Arc<CacheWorker<S, N>>,
    fetches: &mut JoinSet<()>,
    event: WorkerEvent,
) where
    S: CacheStore + 'static,
    N: Network + 'static,
{
    match event {
        WorkerEvent::Install { done } => {
            let result = worker.install().await;
            if let Err(err) = &result {
                log::error!("Install failed: {err}");
            }
            let _ = done.send(result);
        }
        WorkerEvent::Activate { done } => {
            worker.activate().await;
            let _ = done.send(());
        }
        WorkerEvent::Fetch { request, reply } => {
            let worker = Arc::clone(worker);
            fetches.spawn(async move {
                let _ = reply.send(worker.fetch(&request).await);
            });
        }
        WorkerEvent::Message { data } => {
            if let Err(err) = worker.message(&data).await {
                log::error!("Message handling failed: {err}");
            }
        }
    }
}
