use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::category::Category;
use crate::codec::ImageInput;
use crate::error::{Result, TryOnError};

/// Status of a remote job as far as the client is concerned.
///
/// The service reports several intermediate states (queued, processing, ...);
/// they all collapse into `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A single try-on submission. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct TryOnRequest {
    pub model_image: ImageInput,
    pub garment_image: ImageInput,
    pub category: Category,
}

impl TryOnRequest {
    pub fn new(model_image: ImageInput, garment_image: ImageInput, category: Category) -> Self {
        Self {
            model_image,
            garment_image,
            category,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_image.is_empty() {
            return Err(TryOnError::InvalidInput("person image is empty".into()));
        }
        if self.garment_image.is_empty() {
            return Err(TryOnError::InvalidInput("garment image is empty".into()));
        }
        Ok(())
    }

    /// Body of `POST /v1/run`
    pub fn to_run_request(&self) -> RunRequest {
        if !self.category.is_recognized() {
            warn!("Forwarding unrecognized category '{}'", self.category);
        }
        RunRequest {
            model_image: self.model_image.to_data_uri(),
            garment_image: self.garment_image.to_data_uri(),
            category: self.category.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRequest {
    pub model_image: String,
    pub garment_image: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl RunResponse {
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().and_then(error_text)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub output: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl StatusResponse {
    pub fn job_status(&self) -> JobStatus {
        JobStatus::parse(&self.status)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().and_then(error_text)
    }
}

/// The service sends errors either as a bare string or as an object with a
/// `message` field. Null and empty strings mean no error.
fn error_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    };
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Local view of a remote job, refreshed from status responses.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub output_urls: Vec<String>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            output_urls: Vec::new(),
            error: None,
        }
    }

    /// Apply a status response. Once terminal, a job never changes again;
    /// returns false when the update was ignored for that reason.
    pub fn apply(&mut self, resp: &StatusResponse) -> bool {
        if self.status.is_terminal() {
            if resp.job_status() != self.status {
                warn!(
                    "Ignoring status '{}' for job {} already {:?}",
                    resp.status, self.id, self.status
                );
            }
            return false;
        }

        self.status = resp.job_status();
        if let Some(output) = &resp.output {
            self.output_urls = output.clone();
        }
        self.error = resp.error_message();
        true
    }
}
