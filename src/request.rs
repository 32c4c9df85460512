use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SupernetError};
use crate::sdk::ProjectParams;
use crate::types::{JobInfo, OutputFormat, ProgressUpdate, TokenType};

/// Callback invoked with step-level progress for a project.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Callback invoked when a job (one image) completes or fails.
pub type JobCallback = Arc<dyn Fn(&JobInfo) + Send + Sync>;

/// Builder for a Supernet generation project.
///
/// Validated by [`validate`](Self::validate) before any network activity;
/// never persisted.
///
/// # Example
/// ```
/// use supernet_rs::ProjectRequest;
///
/// let request = ProjectRequest::new("flux1-schnell", "a sunset over mountains")
///     .negative_prompt("lowres, blurry")
///     .number_of_images(4)
///     .steps(20)
///     .guidance(7.5)
///     .size(1024, 1024);
///
/// assert!(request.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct ProjectRequest {
    pub model_id: String,
    pub positive_prompt: String,
    pub negative_prompt: Option<String>,
    pub style_prompt: Option<String>,
    pub number_of_images: u32,
    pub steps: u32,
    pub guidance: f64,
    pub width: u32,
    pub height: u32,
    pub token_type: TokenType,
    pub output_format: OutputFormat,
    /// Wait for the project to finish before returning (default true).
    pub wait_for_completion: bool,
    /// Per-call completion timeout; falls back to the client-level timeout.
    pub timeout: Option<Duration>,
    pub on_progress: Option<ProgressCallback>,
    pub on_job_completed: Option<JobCallback>,
    pub on_job_failed: Option<JobCallback>,
}

impl ProjectRequest {
    /// Create a request with a model and prompt. Uses sensible defaults for
    /// everything else (1 image, 20 steps, guidance 7.5, 1024x1024, png).
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            positive_prompt: prompt.into(),
            negative_prompt: None,
            style_prompt: None,
            number_of_images: 1,
            steps: 20,
            guidance: 7.5,
            width: 1024,
            height: 1024,
            token_type: TokenType::default(),
            output_format: OutputFormat::default(),
            wait_for_completion: true,
            timeout: None,
            on_progress: None,
            on_job_completed: None,
            on_job_failed: None,
        }
    }

    /// Set the negative prompt.
    pub fn negative_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.negative_prompt = Some(prompt.into());
        self
    }

    /// Set the style prompt.
    pub fn style_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.style_prompt = Some(prompt.into());
        self
    }

    /// Set the number of images to generate (1-10).
    pub fn number_of_images(mut self, count: u32) -> Self {
        self.number_of_images = count;
        self
    }

    /// Set the number of sampling steps (1-100).
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    /// Set the guidance scale (0-30).
    pub fn guidance(mut self, guidance: f64) -> Self {
        self.guidance = guidance;
        self
    }

    /// Set output dimensions (128-2048 per side).
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Select the token type used to pay for the generation.
    pub fn token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    /// Select the output image format.
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Return as soon as the project is created instead of waiting for
    /// completion.
    pub fn no_wait(mut self) -> Self {
        self.wait_for_completion = false;
        self
    }

    /// Override the client-level completion timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Invoke `callback` for each step-level progress update.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Invoke `callback` when an individual job (image) completes.
    pub fn on_job_completed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&JobInfo) + Send + Sync + 'static,
    {
        self.on_job_completed = Some(Arc::new(callback));
        self
    }

    /// Invoke `callback` when an individual job (image) fails.
    pub fn on_job_failed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&JobInfo) + Send + Sync + 'static,
    {
        self.on_job_failed = Some(Arc::new(callback));
        self
    }

    /// Check every field constraint, failing on the first violation.
    ///
    /// Order: model id, prompt, image count, steps, guidance, width, height.
    /// Token type and output format are closed enums and need no range check.
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(SupernetError::Validation {
                field: "model_id",
                message: "model id is required".into(),
            });
        }
        if self.positive_prompt.trim().is_empty() {
            return Err(SupernetError::Validation {
                field: "positive_prompt",
                message: "prompt is required".into(),
            });
        }
        if !(1..=10).contains(&self.number_of_images) {
            return Err(SupernetError::Validation {
                field: "number_of_images",
                message: format!("must be between 1 and 10, got {}", self.number_of_images),
            });
        }
        if !(1..=100).contains(&self.steps) {
            return Err(SupernetError::Validation {
                field: "steps",
                message: format!("must be between 1 and 100, got {}", self.steps),
            });
        }
        if !self.guidance.is_finite() || !(0.0..=30.0).contains(&self.guidance) {
            return Err(SupernetError::Validation {
                field: "guidance",
                message: format!("must be between 0 and 30, got {}", self.guidance),
            });
        }
        if !(128..=2048).contains(&self.width) {
            return Err(SupernetError::Validation {
                field: "width",
                message: format!("must be between 128 and 2048, got {}", self.width),
            });
        }
        if !(128..=2048).contains(&self.height) {
            return Err(SupernetError::Validation {
                field: "height",
                message: format!("must be between 128 and 2048, got {}", self.height),
            });
        }
        Ok(())
    }

    /// Flatten into the parameter struct handed to the SDK. Optional prompt
    /// fields the Supernet requires are defaulted to empty strings here.
    pub(crate) fn to_params(&self) -> ProjectParams {
        ProjectParams {
            model_id: self.model_id.clone(),
            positive_prompt: self.positive_prompt.clone(),
            negative_prompt: self.negative_prompt.clone().unwrap_or_default(),
            style_prompt: self.style_prompt.clone().unwrap_or_default(),
            number_of_images: self.number_of_images,
            steps: self.steps,
            guidance: self.guidance,
            width: self.width,
            height: self.height,
            token_type: self.token_type,
            output_format: self.output_format,
        }
    }
}

impl std::fmt::Debug for ProjectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectRequest")
            .field("model_id", &self.model_id)
            .field("positive_prompt", &self.positive_prompt)
            .field("negative_prompt", &self.negative_prompt)
            .field("style_prompt", &self.style_prompt)
            .field("number_of_images", &self.number_of_images)
            .field("steps", &self.steps)
            .field("guidance", &self.guidance)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("token_type", &self.token_type)
            .field("output_format", &self.output_format)
            .field("wait_for_completion", &self.wait_for_completion)
            .field("timeout", &self.timeout)
            .field("has_on_progress", &self.on_progress.is_some())
            .field("has_on_job_completed", &self.on_job_completed.is_some())
            .field("has_on_job_failed", &self.on_job_failed.is_some())
            .finish()
    }
}
