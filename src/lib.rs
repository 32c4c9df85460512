//! # supernet-rs
//!
//! Async Rust wrapper for the Sogni Supernet image-generation API.
//!
//! Wraps the raw SDK surface with connection-state tracking and
//! auto-reconnect, validated project creation with completion timeouts,
//! generic retry/backoff helpers, and a typed event stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use supernet_rs::{ClientConfig, ClientEvent, ProjectRequest, SupernetClient};
//! use std::time::Duration;
//!
//! # async fn example() -> supernet_rs::Result<()> {
//! let client = SupernetClient::new(
//!     ClientConfig::builder("artist", "hunter2")
//!         .with_timeout(Duration::from_secs(120))
//!         .build(),
//! )
//! .await?;
//!
//! // Observe lifecycle and project events
//! let mut events = client.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let ClientEvent::ProjectProgress(p) = event {
//!             println!("step {}/{}", p.current_step, p.total_steps);
//!         }
//!     }
//! });
//!
//! // Pick a model and generate
//! let model = client.most_popular_model().await?;
//! let result = client
//!     .create_project(ProjectRequest::new(&model.id, "a sunset over mountains"))
//!     .await?;
//!
//! for url in result.image_urls.unwrap_or_default() {
//!     println!("{url}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod connection;
pub mod error;
pub mod events;
pub mod request;
pub mod retry;
pub mod sdk;
pub mod transport;
pub mod types;

pub use client::SupernetClient;
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_ENDPOINT};
pub use error::{ErrorInfo, Result, SupernetError};
pub use events::ClientEvent;
pub use request::{JobCallback, ProgressCallback, ProjectRequest};
pub use retry::{poll_until, retry, retry_with, RetryOptions};
pub use sdk::{ProjectEvent, ProjectHandle, ProjectParams, SdkFactory, SupernetSdk};
pub use transport::HttpSupernet;
pub use types::{
    Balance, ConnectionState, ConnectionStatus, JobInfo, ModelInfo, Network, OutputFormat,
    ProgressUpdate, ProjectResult, SizePreset, TokenType,
};
