//! Seam between the wrapper and the underlying Supernet SDK.
//!
//! The wrapper never talks to the network directly; it drives an
//! implementation of [`SupernetSdk`]. The default is the bundled
//! [`HttpSupernet`](crate::transport::HttpSupernet); tests substitute mocks.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::types::{
    Balance, JobInfo, ModelInfo, Network, OutputFormat, ProgressUpdate, SizePreset, TokenType,
};

/// Fully resolved parameters handed to the SDK. All prompt fields are
/// concrete strings; empty-string defaults have already been applied.
#[derive(Debug, Clone)]
pub struct ProjectParams {
    pub model_id: String,
    pub positive_prompt: String,
    pub negative_prompt: String,
    pub style_prompt: String,
    pub number_of_images: u32,
    pub steps: u32,
    pub guidance: f64,
    pub width: u32,
    pub height: u32,
    pub token_type: TokenType,
    pub output_format: OutputFormat,
}

/// Event stream element for a single project.
#[derive(Debug, Clone)]
pub enum ProjectEvent {
    Progress(ProgressUpdate),
    JobCompleted(JobInfo),
    JobFailed(JobInfo),
}

/// Live handle to a project accepted by the Supernet.
#[async_trait]
pub trait ProjectHandle: Send + Sync {
    /// Supernet-assigned project id.
    fn id(&self) -> &str;

    /// Subscribe to this project's progress and per-job events.
    fn subscribe(&self) -> broadcast::Receiver<ProjectEvent>;

    /// Wait until every job in the project finished. Returns the output URLs.
    async fn wait_for_completion(&self) -> Result<Vec<String>>;
}

/// One logged-in SDK instance. Created per connection attempt; the instance
/// held by the connection manager is the live connection handle.
#[async_trait]
pub trait SupernetSdk: Send + Sync {
    /// Authenticate the session.
    async fn login(&self, username: &str, password: &str) -> Result<()>;

    /// Block until the Supernet has published its model list.
    async fn wait_for_models(&self) -> Result<()>;

    /// Models currently offered, with worker counts.
    async fn available_models(&self) -> Result<Vec<ModelInfo>>;

    /// Refresh and return the account balance.
    async fn refresh_balance(&self) -> Result<Balance>;

    /// Size presets supported by a model on the given network.
    async fn size_presets(&self, network: Network, model_id: &str) -> Result<Vec<SizePreset>>;

    /// Submit a project and return its live handle.
    async fn create_project(&self, params: ProjectParams) -> Result<Arc<dyn ProjectHandle>>;

    /// Tear down the session. Must not fail.
    async fn close(&self);
}

/// Creates one SDK instance per connection attempt, bound to the client's
/// app id and network.
pub type SdkFactory = Arc<dyn Fn(&ClientConfig) -> Arc<dyn SupernetSdk> + Send + Sync>;
