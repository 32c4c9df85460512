use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::error::{Result, SupernetError};
use crate::events::{ClientEvent, EventBus};
use crate::request::ProjectRequest;
use crate::retry::{self, RetryOptions};
use crate::sdk::{ProjectEvent, ProjectHandle, SdkFactory, SupernetSdk};
use crate::transport::HttpSupernet;
use crate::types::{Balance, ConnectionState, ModelInfo, Network, ProjectResult, SizePreset};

/// Convenience wrapper around the Supernet SDK.
///
/// Adds connection-state tracking with auto-reconnect, validated
/// project creation with a completion timeout, retry helpers, and a typed
/// event stream. Cheap to clone; clones share the same connection.
///
/// # Example
/// ```no_run
/// use supernet_rs::{ClientConfig, ProjectRequest, SupernetClient};
///
/// # async fn example() -> supernet_rs::Result<()> {
/// let client = SupernetClient::new(ClientConfig::builder("artist", "hunter2").build()).await?;
///
/// let model = client.most_popular_model().await?;
/// let result = client
///     .create_project(
///         ProjectRequest::new(&model.id, "a sunset over mountains")
///             .number_of_images(4)
///             .on_progress(|p| println!("step {}/{}", p.current_step, p.total_steps)),
///     )
///     .await?;
///
/// for url in result.image_urls.unwrap_or_default() {
///     println!("{url}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SupernetClient {
    core: Arc<ClientCore>,
}

impl std::fmt::Debug for SupernetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupernetClient").finish_non_exhaustive()
    }
}

struct ClientCore {
    config: ClientConfig,
    connection: Arc<ConnectionManager>,
    events: EventBus,
}

impl SupernetClient {
    /// Validate `config` and build a client backed by the bundled HTTP/WebSocket
    /// transport. Connects immediately when `config.auto_connect` is set.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let factory: SdkFactory =
            Arc::new(|config: &ClientConfig| Arc::new(HttpSupernet::new(config)) as Arc<dyn SupernetSdk>);
        Self::with_sdk_factory(config, factory).await
    }

    /// Like [`new`](Self::new), with a custom SDK factory. The factory is
    /// invoked once per connection attempt.
    pub async fn with_sdk_factory(config: ClientConfig, factory: SdkFactory) -> Result<Self> {
        config.validate()?;
        let events = EventBus::new();
        let connection = Arc::new(ConnectionManager::new(
            config.clone(),
            factory,
            events.clone(),
        ));
        let client = Self {
            core: Arc::new(ClientCore {
                config,
                connection,
                events,
            }),
        };
        if client.core.config.auto_connect {
            client.connect().await?;
        }
        Ok(client)
    }

    /// Connect to the Supernet: log in and wait for the model list. No-op
    /// when already connected; a concurrent call waits for the in-flight
    /// attempt instead of starting a second handshake.
    pub async fn connect(&self) -> Result<()> {
        self.core.connection.connect().await.map(|_| ())
    }

    /// Disconnect and cancel any pending reconnection. Idempotent.
    pub async fn disconnect(&self) {
        self.core.connection.disconnect().await;
    }

    /// True iff connected with a live session.
    pub fn is_connected(&self) -> bool {
        self.core.connection.is_connected()
    }

    /// Read-only snapshot of the connection state machine.
    pub fn connection_state(&self) -> ConnectionState {
        self.core.connection.state()
    }

    /// Subscribe to the client's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.core.events.subscribe()
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.core.config
    }

    async fn ensure_connected(&self) -> Result<Arc<dyn SupernetSdk>> {
        self.core.connection.connect().await
    }

    // ── Models & account ────────────────────────────────────────────

    /// Models currently offered on the configured network.
    pub async fn available_models(&self) -> Result<Vec<ModelInfo>> {
        let sdk = self.ensure_connected().await?;
        sdk.available_models().await
    }

    /// Look up a model by id.
    pub async fn get_model(&self, model_id: &str) -> Result<ModelInfo> {
        let models = self.available_models().await?;
        models
            .into_iter()
            .find(|m| m.id == model_id)
            .ok_or_else(|| SupernetError::ModelNotFound {
                model_id: model_id.to_string(),
            })
    }

    /// The model with the most active workers right now.
    pub async fn most_popular_model(&self) -> Result<ModelInfo> {
        let models = self.available_models().await?;
        models
            .into_iter()
            .max_by_key(|m| m.worker_count)
            .ok_or_else(|| SupernetError::ModelNotFound {
                model_id: "(none available)".to_string(),
            })
    }

    /// Refresh and return the account balance.
    pub async fn get_balance(&self) -> Result<Balance> {
        let sdk = self.ensure_connected().await?;
        sdk.refresh_balance().await
    }

    /// Size presets supported by `model_id` on `network`.
    pub async fn size_presets(&self, network: Network, model_id: &str) -> Result<Vec<SizePreset>> {
        let sdk = self.ensure_connected().await?;
        sdk.size_presets(network, model_id).await
    }

    // ── Projects ────────────────────────────────────────────────────

    /// Create a generation project.
    ///
    /// Validates the request (before any network activity), ensures
    /// connectivity, submits the project, fans its progress and per-job
    /// events out to both the request's callbacks and the client event
    /// stream, and races completion against the timeout unless the request
    /// opted out of waiting. A lost race yields
    /// [`SupernetError::Timeout`]; the project itself keeps running on the
    /// Supernet unobserved.
    pub async fn create_project(&self, request: ProjectRequest) -> Result<ProjectResult> {
        request.validate()?;
        let sdk = self.ensure_connected().await?;

        let wait = request.wait_for_completion;
        let timeout = request.timeout.unwrap_or(self.core.config.timeout);
        let params = request.to_params();

        let handle = match sdk.create_project(params).await {
            Ok(handle) => handle,
            Err(e) => {
                let err = wrap_project_failure(e);
                self.core.events.emit(ClientEvent::ProjectFailed(err.info()));
                return Err(err);
            }
        };

        let project_id = handle.id().to_string();
        self.core.events.emit(ClientEvent::ProjectCreated {
            project_id: project_id.clone(),
        });
        self.spawn_event_forwarder(&handle, &request);

        if !wait {
            return Ok(ProjectResult {
                project: handle,
                image_urls: None,
                completed: false,
                error: None,
            });
        }

        match tokio::time::timeout(timeout, handle.wait_for_completion()).await {
            Ok(Ok(image_urls)) => {
                self.core.events.emit(ClientEvent::ProjectCompleted {
                    project_id,
                    image_urls: image_urls.clone(),
                });
                Ok(ProjectResult {
                    project: handle,
                    image_urls: Some(image_urls),
                    completed: true,
                    error: None,
                })
            }
            Ok(Err(e)) => {
                let err = wrap_project_failure(e);
                self.core.events.emit(ClientEvent::ProjectFailed(err.info()));
                Err(err)
            }
            Err(_elapsed) => {
                let err = SupernetError::Timeout { duration: timeout };
                self.core.events.emit(ClientEvent::ProjectFailed(err.info()));
                Err(err)
            }
        }
    }

    /// Create a project, retrying transient failures with exponential
    /// backoff. `on_retry(attempt_number, &error)` fires before each retry.
    ///
    /// Validation failures are not transient, so the first attempt's
    /// validation error propagates without retries ever happening for it.
    pub async fn create_project_with_retry<F>(
        &self,
        request: ProjectRequest,
        options: &RetryOptions,
        mut on_retry: F,
    ) -> Result<ProjectResult>
    where
        F: FnMut(u32, &SupernetError),
    {
        request.validate()?;
        let client = self.clone();
        retry::retry_with(
            move || {
                let client = client.clone();
                let request = request.clone();
                async move { client.create_project(request).await }
            },
            options,
            |attempt, err: &SupernetError| {
                tracing::warn!(attempt, error = %err, "create_project failed, retrying");
                on_retry(attempt, err);
            },
        )
        .await
    }

    /// Fan the project's event stream out to the request's callbacks and the
    /// client-level event channels. Ends when the project's sender side is
    /// dropped.
    fn spawn_event_forwarder(&self, handle: &Arc<dyn ProjectHandle>, request: &ProjectRequest) {
        let mut rx = handle.subscribe();
        let events = self.core.events.clone();
        let on_progress = request.on_progress.clone();
        let on_job_completed = request.on_job_completed.clone();
        let on_job_failed = request.on_job_failed.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ProjectEvent::Progress(update)) => {
                        if let Some(cb) = &on_progress {
                            cb(&update);
                        }
                        events.emit(ClientEvent::ProjectProgress(update));
                    }
                    Ok(ProjectEvent::JobCompleted(job)) => {
                        if let Some(cb) = &on_job_completed {
                            cb(&job);
                        }
                        events.emit(ClientEvent::JobCompleted(job));
                    }
                    Ok(ProjectEvent::JobFailed(job)) => {
                        if let Some(cb) = &on_job_failed {
                            cb(&job);
                        }
                        events.emit(ClientEvent::JobFailed(job));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "project event forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

/// Wrap a project failure generically. A timeout is already a precise
/// classification and passes through unchanged.
fn wrap_project_failure(err: SupernetError) -> SupernetError {
    match err {
        SupernetError::Timeout { .. } => err,
        SupernetError::Project { .. } => err,
        other => SupernetError::Project {
            message: other.to_string(),
        },
    }
}
