use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ErrorInfo;
use crate::sdk::ProjectHandle;

/// Lifecycle status of the wrapper's connection to the Supernet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Not connected.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// Logged in and models are ready.
    Connected,
    /// A reconnect is scheduled after a failed attempt.
    Reconnecting,
    /// The last connection attempt failed.
    Failed,
}

/// Read-only snapshot of the connection state machine.
///
/// Produced under lock, so a snapshot never shows an in-progress mutation.
/// `is_connected` is true only when `status` is [`ConnectionStatus::Connected`];
/// `is_connecting` only during `Connecting`/`Reconnecting`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub is_connected: bool,
    pub is_connecting: bool,
    pub reconnect_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

/// Which Supernet to submit work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Low-latency network of dedicated workers.
    #[default]
    Fast,
    /// Cheaper network of opportunistic workers.
    Relaxed,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Fast => "fast",
            Network::Relaxed => "relaxed",
        }
    }
}

/// Token used to pay for a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    #[default]
    Spark,
    Sogni,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Spark => "spark",
            TokenType::Sogni => "sogni",
        }
    }
}

/// Encoding of the generated images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpg => "jpg",
        }
    }
}

/// A model offered on the Supernet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    /// Active compute nodes currently offering this model. Used as a
    /// popularity/availability proxy.
    #[serde(default)]
    pub worker_count: u32,
}

/// A size preset supported by a model on a given network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizePreset {
    pub id: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
}

/// Account balance per token type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub spark: f64,
    pub sogni: f64,
}

/// Step-level progress for a running project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub project_id: String,
    pub current_step: u32,
    pub total_steps: u32,
}

/// Per-image outcome within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub project_id: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of [`create_project`](crate::SupernetClient::create_project).
///
/// Holds the live project handle; when the request did not wait for
/// completion, `completed` is false and `image_urls` is `None`.
#[derive(Clone)]
pub struct ProjectResult {
    pub project: Arc<dyn ProjectHandle>,
    pub image_urls: Option<Vec<String>>,
    pub completed: bool,
    pub error: Option<ErrorInfo>,
}

impl std::fmt::Debug for ProjectResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectResult")
            .field("project_id", &self.project.id())
            .field("image_urls", &self.image_urls)
            .field("completed", &self.completed)
            .field("error", &self.error)
            .finish()
    }
}
