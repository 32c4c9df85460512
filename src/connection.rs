//! Connection-state machine.
//!
//! Tracks the lifecycle `disconnected → connecting → connected`, with
//! `failed → reconnecting → connecting → …` on errors, and enforces at most
//! one concurrent connection attempt per client: a second caller waits for
//! the in-flight attempt and adopts its outcome instead of starting a
//! duplicate handshake against the Supernet.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::{classify_connect_failure, ErrorInfo, Result, SupernetError};
use crate::events::{ClientEvent, EventBus};
use crate::retry::poll_until;
use crate::sdk::{SdkFactory, SupernetSdk};
use crate::types::{ConnectionState, ConnectionStatus};

/// How long a second caller waits for an in-flight attempt to settle.
const INFLIGHT_WAIT: Duration = Duration::from_secs(30);
const INFLIGHT_POLL: Duration = Duration::from_millis(50);

pub(crate) struct ConnectionManager {
    config: ClientConfig,
    factory: SdkFactory,
    events: EventBus,
    inner: Mutex<Inner>,
}

struct Inner {
    status: ConnectionStatus,
    reconnect_attempts: u32,
    last_error: Option<ErrorInfo>,
    connected_at: Option<DateTime<Utc>>,
    /// Live SDK instance. Present only while connected.
    session: Option<Arc<dyn SupernetSdk>>,
    /// A handshake is in flight right now.
    connecting: bool,
    /// A reconnect cycle is active (timer pending or attempt running).
    reconnecting: bool,
    /// Pending reconnect timer. At most one exists at a time.
    reconnect_timer: Option<JoinHandle<()>>,
}

enum Entry {
    AlreadyConnected(Arc<dyn SupernetSdk>),
    WaitForInflight,
    Start,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, factory: SdkFactory, events: EventBus) -> Self {
        Self {
            config,
            factory,
            events,
            inner: Mutex::new(Inner {
                status: ConnectionStatus::Disconnected,
                reconnect_attempts: 0,
                last_error: None,
                connected_at: None,
                session: None,
                connecting: false,
                reconnecting: false,
                reconnect_timer: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| SupernetError::Unknown {
            message: "connection state lock poisoned".into(),
        })
    }

    /// Connect to the Supernet, or return the live session when already
    /// connected. When an attempt is already in flight the caller waits for
    /// it (bounded) and adopts its outcome.
    pub async fn connect(self: &Arc<Self>) -> Result<Arc<dyn SupernetSdk>> {
        let entry = {
            let mut guard = self.lock()?;
            if guard.status == ConnectionStatus::Connected && guard.session.is_some() {
                Entry::AlreadyConnected(guard.session.clone().ok_or_else(|| {
                    SupernetError::Connection {
                        message: "connected without a live session".into(),
                    }
                })?)
            } else if guard.connecting {
                Entry::WaitForInflight
            } else {
                guard.connecting = true;
                guard.status = ConnectionStatus::Connecting;
                Entry::Start
            }
        };

        match entry {
            Entry::AlreadyConnected(session) => Ok(session),
            Entry::WaitForInflight => self.adopt_inflight_outcome().await,
            Entry::Start => self.attempt().await,
        }
    }

    /// Run one handshake: create the SDK instance, log in, wait for models.
    async fn attempt(self: &Arc<Self>) -> Result<Arc<dyn SupernetSdk>> {
        let sdk = (self.factory)(&self.config);

        let handshake = async {
            sdk.login(&self.config.username, &self.config.password).await?;
            sdk.wait_for_models().await
        };

        match handshake.await {
            Ok(()) => {
                let timer = {
                    let mut guard = self.lock()?;
                    guard.session = Some(Arc::clone(&sdk));
                    guard.status = ConnectionStatus::Connected;
                    guard.reconnect_attempts = 0;
                    guard.connected_at = Some(Utc::now());
                    guard.last_error = None;
                    guard.connecting = false;
                    guard.reconnecting = false;
                    guard.reconnect_timer.take()
                };
                if let Some(timer) = timer {
                    timer.abort();
                }
                if self.config.debug {
                    tracing::debug!(app_id = %self.config.app_id, "connected to the Supernet");
                }
                self.events.emit(ClientEvent::Connected);
                Ok(sdk)
            }
            Err(e) => {
                let err = classify_connect_failure(e);
                let info = err.info();
                {
                    let mut guard = self.lock()?;
                    guard.status = ConnectionStatus::Failed;
                    guard.last_error = Some(info.clone());
                    guard.connecting = false;
                    guard.session = None;
                }
                self.events.emit(ClientEvent::Error(info));
                if self.config.reconnect {
                    self.schedule_reconnect();
                }
                Err(err)
            }
        }
    }

    /// Wait for the in-flight attempt started by another caller, then report
    /// the same outcome it saw.
    async fn adopt_inflight_outcome(self: &Arc<Self>) -> Result<Arc<dyn SupernetSdk>> {
        let this = Arc::clone(self);
        let settled = poll_until(
            move || {
                this.inner
                    .lock()
                    .map(|guard| !guard.connecting)
                    .unwrap_or(true)
            },
            INFLIGHT_POLL,
            INFLIGHT_WAIT,
        )
        .await;

        if !settled {
            return Err(SupernetError::Timeout {
                duration: INFLIGHT_WAIT,
            });
        }

        let guard = self.lock()?;
        if guard.status == ConnectionStatus::Connected {
            guard.session.clone().ok_or_else(|| SupernetError::Connection {
                message: "connected without a live session".into(),
            })
        } else {
            Err(guard
                .last_error
                .as_ref()
                .map(|info| info.to_error())
                .unwrap_or_else(|| SupernetError::Connection {
                    message: "connection attempt failed".into(),
                }))
        }
    }

    /// Schedule a reconnection attempt after the fixed interval. Guarded so
    /// only one pending timer exists at a time. The interval is deliberately
    /// constant, not exponential.
    fn schedule_reconnect(self: &Arc<Self>) {
        let interval = self.config.reconnect_interval;
        let attempt;
        {
            let mut guard = match self.inner.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            if guard.reconnect_timer.is_some() {
                return;
            }
            guard.reconnecting = true;
            guard.status = ConnectionStatus::Reconnecting;
            guard.reconnect_attempts += 1;
            attempt = guard.reconnect_attempts;

            // Weak: the timer must not keep a dropped client's reconnect
            // chain alive.
            let weak: Weak<ConnectionManager> = Arc::downgrade(self);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(interval).await;
                let Some(mgr) = weak.upgrade() else { return };
                let already_connected = {
                    let Ok(mut guard) = mgr.inner.lock() else { return };
                    guard.reconnect_timer = None;
                    guard.status == ConnectionStatus::Connected
                };
                if already_connected {
                    return;
                }
                match mgr.connect().await {
                    Ok(_) => mgr.events.emit(ClientEvent::Reconnected),
                    // No caller waits on a background attempt; the failed
                    // attempt has already rescheduled the next one.
                    Err(e) => {
                        tracing::warn!(attempt, error = %e, "reconnection attempt failed")
                    }
                }
            });
            guard.reconnect_timer = Some(handle);
        }
        self.events.emit(ClientEvent::Reconnecting { attempt });
    }

    /// Drop the connection. Cancels any pending reconnect timer and closes
    /// the live session. Idempotent.
    pub async fn disconnect(&self) {
        let (session, timer) = {
            let Ok(mut guard) = self.inner.lock() else {
                return;
            };
            guard.status = ConnectionStatus::Disconnected;
            guard.connecting = false;
            guard.reconnecting = false;
            guard.connected_at = None;
            (guard.session.take(), guard.reconnect_timer.take())
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(session) = session {
            session.close().await;
        }
        self.events.emit(ClientEvent::Disconnected);
    }

    /// True iff the state says connected and a live session is present.
    pub fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .map(|guard| guard.status == ConnectionStatus::Connected && guard.session.is_some())
            .unwrap_or(false)
    }

    /// Read-only snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        match self.inner.lock() {
            Ok(guard) => ConnectionState {
                status: guard.status,
                is_connected: guard.status == ConnectionStatus::Connected,
                is_connecting: matches!(
                    guard.status,
                    ConnectionStatus::Connecting | ConnectionStatus::Reconnecting
                ),
                reconnect_attempts: guard.reconnect_attempts,
                last_error: guard.last_error.clone(),
                connected_at: guard.connected_at,
            },
            Err(_) => ConnectionState {
                status: ConnectionStatus::Failed,
                is_connected: false,
                is_connecting: false,
                reconnect_attempts: 0,
                last_error: None,
                connected_at: None,
            },
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(timer) = guard.reconnect_timer.take() {
                timer.abort();
            }
        }
    }
}
