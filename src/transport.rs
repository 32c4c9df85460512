//! Default [`SupernetSdk`] implementation over the Supernet's REST and
//! WebSocket APIs.
//!
//! Project watching prefers the WebSocket event stream and falls back to
//! status polling automatically when the socket cannot be established or
//! closes early.

use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::{Result, SupernetError};
use crate::sdk::{ProjectEvent, ProjectHandle, ProjectParams, SupernetSdk};
use crate::types::{Balance, JobInfo, ModelInfo, Network, ProgressUpdate, SizePreset};

const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MODELS_READY_DEADLINE: Duration = Duration::from_secs(60);

/// REST + WebSocket client for the Supernet API.
#[derive(Debug)]
pub struct HttpSupernet {
    http: Client,
    endpoint: String,
    app_id: String,
    network: Network,
    token: RwLock<Option<String>>,
}

impl HttpSupernet {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            network: config.network,
            token: RwLock::new(None),
        }
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json(&self, url: &str, context: &str) -> Result<Value> {
        let resp = self
            .authed(self.http.get(url))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| SupernetError::Network {
                context: format!(
                    "Cannot reach the Supernet at {} — is the endpoint correct?",
                    self.endpoint
                ),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), context, &body));
        }

        resp.json().await.map_err(|e| SupernetError::Network {
            context: format!("Failed to parse {} response", context),
            source: e,
        })
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!(
            "{}/v1/models?network={}",
            self.endpoint,
            self.network.as_str()
        );
        let json = self.get_json(&url, "model list").await?;
        Ok(parse_models(&json))
    }
}

#[async_trait]
impl SupernetSdk for HttpSupernet {
    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = format!("{}/v1/account/login", self.endpoint);
        let body = serde_json::json!({
            "username": username,
            "password": password,
            "appId": self.app_id,
        });

        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| SupernetError::Network {
                context: format!(
                    "Cannot reach the Supernet at {} — is the endpoint correct?",
                    self.endpoint
                ),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), "login", &body_text));
        }

        let json: Value = resp.json().await.map_err(|e| SupernetError::Network {
            context: "Failed to parse login response".into(),
            source: e,
        })?;

        let token = json
            .get("token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SupernetError::Authentication {
                message: "login response missing session token".into(),
            })?;

        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.to_string());
        }
        Ok(())
    }

    async fn wait_for_models(&self) -> Result<()> {
        let start = tokio::time::Instant::now();
        loop {
            if !self.fetch_models().await?.is_empty() {
                return Ok(());
            }
            if start.elapsed() >= MODELS_READY_DEADLINE {
                return Err(SupernetError::Connection {
                    message: "Supernet published no models within the readiness window".into(),
                });
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    async fn available_models(&self) -> Result<Vec<ModelInfo>> {
        self.fetch_models().await
    }

    async fn refresh_balance(&self) -> Result<Balance> {
        let url = format!("{}/v1/account/balance", self.endpoint);
        let json = self.get_json(&url, "balance").await?;
        Ok(Balance {
            spark: json.get("spark").and_then(|v| v.as_f64()).unwrap_or(0.0),
            sogni: json.get("sogni").and_then(|v| v.as_f64()).unwrap_or(0.0),
        })
    }

    async fn size_presets(&self, network: Network, model_id: &str) -> Result<Vec<SizePreset>> {
        let url = format!(
            "{}/v1/models/{}/size-presets?network={}",
            self.endpoint,
            model_id,
            network.as_str()
        );
        let json = self.get_json(&url, "size presets").await?;
        Ok(parse_presets(&json))
    }

    async fn create_project(&self, params: ProjectParams) -> Result<Arc<dyn ProjectHandle>> {
        let url = format!("{}/v1/projects", self.endpoint);
        let body = serde_json::json!({
            "modelId": params.model_id,
            "positivePrompt": params.positive_prompt,
            "negativePrompt": params.negative_prompt,
            "stylePrompt": params.style_prompt,
            "numberOfImages": params.number_of_images,
            "steps": params.steps,
            "guidance": params.guidance,
            "width": params.width,
            "height": params.height,
            "tokenType": params.token_type.as_str(),
            "outputFormat": params.output_format.as_str(),
            "network": self.network.as_str(),
            "appId": self.app_id,
        });

        let resp = self
            .authed(self.http.post(&url))
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| SupernetError::Network {
                context: "Failed to submit project to the Supernet".into(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), "project creation", &body_text));
        }

        let json: Value = resp.json().await.map_err(|e| SupernetError::Network {
            context: "Failed to parse project creation response".into(),
            source: e,
        })?;

        let project_id = json
            .get("projectId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| SupernetError::Project {
                message: "response missing projectId".into(),
            })?;

        Ok(HttpProjectHandle::spawn(
            self.http.clone(),
            self.endpoint.clone(),
            self.app_id.clone(),
            self.bearer(),
            project_id,
        ))
    }

    async fn close(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }
}

fn status_error(status: u16, context: &str, body: &str) -> SupernetError {
    match status {
        401 | 403 => SupernetError::Authentication {
            message: format!("{} rejected (HTTP {}): {}", context, status, body),
        },
        402 => SupernetError::InsufficientBalance {
            message: format!("{} rejected: {}", context, body),
        },
        404 => SupernetError::Connection {
            message: format!("{} failed (HTTP 404): {}", context, body),
        },
        _ => SupernetError::Connection {
            message: format!("{} failed (HTTP {}): {}", context, status, body),
        },
    }
}

/// Terminal result of a project as reported by the Supernet.
#[derive(Debug, Clone)]
enum ProjectOutcome {
    Completed(Vec<String>),
    Failed(String),
}

/// Project handle backed by a detached watcher task.
///
/// The watcher outlives any completion race the client loses; a timed-out
/// project keeps running on the Supernet with no observer, by contract.
struct HttpProjectHandle {
    project_id: String,
    events: broadcast::Sender<ProjectEvent>,
    outcome: watch::Receiver<Option<ProjectOutcome>>,
}

impl HttpProjectHandle {
    fn spawn(
        http: Client,
        endpoint: String,
        app_id: String,
        bearer: Option<String>,
        project_id: String,
    ) -> Arc<dyn ProjectHandle> {
        let (events, _) = broadcast::channel(256);
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let watcher = Watcher {
            http,
            endpoint,
            app_id,
            bearer,
            project_id: project_id.clone(),
            events: events.clone(),
        };
        tokio::spawn(async move {
            let outcome = watcher.run().await;
            let _ = outcome_tx.send(Some(outcome));
        });

        Arc::new(Self {
            project_id,
            events,
            outcome: outcome_rx,
        })
    }
}

#[async_trait]
impl ProjectHandle for HttpProjectHandle {
    fn id(&self) -> &str {
        &self.project_id
    }

    fn subscribe(&self) -> broadcast::Receiver<ProjectEvent> {
        self.events.subscribe()
    }

    async fn wait_for_completion(&self) -> Result<Vec<String>> {
        let mut rx = self.outcome.clone();
        loop {
            let current = rx.borrow().clone();
            if let Some(outcome) = current {
                return match outcome {
                    ProjectOutcome::Completed(urls) => Ok(urls),
                    ProjectOutcome::Failed(message) => Err(SupernetError::Project { message }),
                };
            }
            rx.changed().await.map_err(|_| SupernetError::Project {
                message: format!("watcher for project {} terminated", self.project_id),
            })?;
        }
    }
}

struct Watcher {
    http: Client,
    endpoint: String,
    app_id: String,
    bearer: Option<String>,
    project_id: String,
    events: broadcast::Sender<ProjectEvent>,
}

impl Watcher {
    async fn run(&self) -> ProjectOutcome {
        match self.watch_socket().await {
            Some(outcome) => outcome,
            None => self.poll_status().await,
        }
    }

    /// Follow the project's WebSocket event stream. Returns `None` when the
    /// socket cannot be used, so the caller falls back to polling.
    async fn watch_socket(&self) -> Option<ProjectOutcome> {
        let ws_url = format!(
            "{}/v1/projects/{}/events?appId={}",
            self.endpoint
                .replace("http://", "ws://")
                .replace("https://", "wss://"),
            self.project_id,
            self.app_id
        );

        let (mut ws, _) = match tokio_tungstenite::connect_async(&ws_url).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(project = %self.project_id, error = %e,
                    "WebSocket unavailable, falling back to status polling");
                return None;
            }
        };

        while let Ok(Some(msg)) = tokio::time::timeout(Duration::from_secs(30), ws.next()).await {
            let text = match msg {
                Ok(m) if m.is_text() => m.into_text().unwrap_or_default(),
                Ok(_) => continue,
                Err(_) => break,
            };

            match parse_ws_event(&self.project_id, &text) {
                Some(WsEvent::Progress(update)) => {
                    let _ = self.events.send(ProjectEvent::Progress(update));
                }
                Some(WsEvent::JobCompleted(job)) => {
                    let _ = self.events.send(ProjectEvent::JobCompleted(job));
                }
                Some(WsEvent::JobFailed(job)) => {
                    let _ = self.events.send(ProjectEvent::JobFailed(job));
                }
                Some(WsEvent::Completed(urls)) => {
                    return Some(ProjectOutcome::Completed(urls));
                }
                Some(WsEvent::Failed(message)) => {
                    return Some(ProjectOutcome::Failed(message));
                }
                None => continue,
            }
        }

        // Socket closed before a terminal event.
        tracing::debug!(project = %self.project_id,
            "WebSocket closed early, falling back to status polling");
        None
    }

    async fn poll_status(&self) -> ProjectOutcome {
        let url = format!("{}/v1/projects/{}", self.endpoint, self.project_id);
        loop {
            let request = match &self.bearer {
                Some(token) => self.http.get(&url).bearer_auth(token),
                None => self.http.get(&url),
            };
            match request.timeout(Duration::from_secs(10)).send().await {
                Ok(resp) if resp.status().is_success() => {
                    if let Ok(json) = resp.json::<Value>().await {
                        if let Some(outcome) = parse_project_status(&json) {
                            return outcome;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(project = %self.project_id, error = %e,
                        "status poll failed, retrying");
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

enum WsEvent {
    Progress(ProgressUpdate),
    JobCompleted(JobInfo),
    JobFailed(JobInfo),
    Completed(Vec<String>),
    Failed(String),
}

fn parse_ws_event(project_id: &str, text: &str) -> Option<WsEvent> {
    let json: Value = serde_json::from_str(text).ok()?;
    let msg_type = json.get("type").and_then(|v| v.as_str())?;
    let data = json.get("data");

    match msg_type {
        "progress" => {
            let step = data?.get("step").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let step_count = data?
                .get("stepCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as u32;
            Some(WsEvent::Progress(ProgressUpdate {
                project_id: project_id.to_string(),
                current_step: step,
                total_steps: step_count,
            }))
        }
        "jobCompleted" => Some(WsEvent::JobCompleted(JobInfo {
            project_id: project_id.to_string(),
            job_id: data?
                .get("jobId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            image_url: data?
                .get("imageUrl")
                .and_then(|v| v.as_str())
                .map(String::from),
            error: None,
        })),
        "jobFailed" => Some(WsEvent::JobFailed(JobInfo {
            project_id: project_id.to_string(),
            job_id: data?
                .get("jobId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            image_url: None,
            error: data?
                .get("error")
                .and_then(|v| v.as_str())
                .map(String::from),
        })),
        "completed" => Some(WsEvent::Completed(
            data.and_then(|d| d.get("imageUrls"))
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
        )),
        "failed" => Some(WsEvent::Failed(
            data.and_then(|d| d.get("error"))
                .and_then(|v| v.as_str())
                .unwrap_or("project failed")
                .to_string(),
        )),
        _ => None,
    }
}

fn parse_project_status(json: &Value) -> Option<ProjectOutcome> {
    match json.get("status").and_then(|v| v.as_str()) {
        Some("completed") => Some(ProjectOutcome::Completed(
            json.get("imageUrls")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default(),
        )),
        Some("failed") => Some(ProjectOutcome::Failed(
            json.get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("project failed")
                .to_string(),
        )),
        _ => None,
    }
}

fn parse_models(json: &Value) -> Vec<ModelInfo> {
    json.get("models")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|m| {
                    Some(ModelInfo {
                        id: m.get("id")?.as_str()?.to_string(),
                        name: m
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        worker_count: m
                            .get("workerCount")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0) as u32,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_presets(json: &Value) -> Vec<SizePreset> {
    json.get("presets")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|p| {
                    Some(SizePreset {
                        id: p.get("id")?.as_str()?.to_string(),
                        label: p
                            .get("label")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        width: p.get("width").and_then(|v| v.as_u64())? as u32,
                        height: p.get("height").and_then(|v| v.as_u64())? as u32,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
