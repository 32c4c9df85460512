use tokio::sync::broadcast;

use crate::error::ErrorInfo;
use crate::types::{JobInfo, ProgressUpdate};

/// Events emitted by [`SupernetClient`](crate::SupernetClient).
///
/// A closed set of named channels; subscribe with
/// [`SupernetClient::subscribe`](crate::SupernetClient::subscribe).
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connection established and models ready.
    Connected,
    /// Connection dropped by an explicit disconnect.
    Disconnected,
    /// A reconnection attempt has been scheduled.
    Reconnecting { attempt: u32 },
    /// A scheduled reconnection succeeded.
    Reconnected,
    /// A connection attempt failed.
    Error(ErrorInfo),
    /// A project was accepted by the Supernet.
    ProjectCreated { project_id: String },
    /// Step-level progress for a running project.
    ProjectProgress(ProgressUpdate),
    /// A project finished with all of its output URLs.
    ProjectCompleted {
        project_id: String,
        image_urls: Vec<String>,
    },
    /// A project failed or timed out.
    ProjectFailed(ErrorInfo),
    /// One image within a project completed.
    JobCompleted(JobInfo),
    /// One image within a project failed.
    JobFailed(JobInfo),
}

/// Internal publish/subscribe fan-out for [`ClientEvent`]s.
///
/// Slow subscribers lag rather than block the emitter; emitting with no
/// subscribers is a no-op.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ClientEvent) {
        // send() only errors when there are no receivers.
        let _ = self.tx.send(event);
    }
}
