//! Transport to the remote try-on service.

use std::time::Duration;
use log::debug;
use reqwest::blocking::{Client, Response};
use vt_core::job::{RunRequest, RunResponse, StatusResponse};
use vt_core::{Result, TryOnError};

/// The three calls the job lifecycle needs from the service.
pub trait TryOnApi {
    /// `POST /v1/run`
    fn run(&self, body: &RunRequest) -> Result<RunResponse>;

    /// `GET /v1/status/{id}`
    fn status(&self, job_id: &str) -> Result<StatusResponse>;

    /// Unauthenticated GET of a result URL
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TryOnError::transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn run_url(&self) -> String {
        format!("{}/v1/run", self.base_url)
    }

    pub fn status_url(&self, job_id: &str) -> String {
        format!("{}/v1/status/{}", self.base_url, job_id)
    }

    fn authorized(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn check_status(response: Response) -> Result<Response> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(TryOnError::Transport(format!("HTTP {}: {}", status, body)));
        }
        Ok(response)
    }
}

impl TryOnApi for HttpApi {
    fn run(&self, body: &RunRequest) -> Result<RunResponse> {
        let url = self.run_url();
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(url))
            .json(body)
            .send()
            .map_err(TryOnError::transport)?;

        Self::check_status(response)?
            .json()
            .map_err(|e| TryOnError::Transport(format!("Failed to parse response: {}", e)))
    }

    fn status(&self, job_id: &str) -> Result<StatusResponse> {
        let url = self.status_url(job_id);
        debug!("GET {}", url);

        let response = self
            .authorized(self.client.get(url))
            .send()
            .map_err(TryOnError::transport)?;

        Self::check_status(response)?
            .json()
            .map_err(|e| TryOnError::Transport(format!("Failed to parse status: {}", e)))
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);

        let response = self.client.get(url).send().map_err(TryOnError::transport)?;
        let bytes = Self::check_status(response)?
            .bytes()
            .map_err(TryOnError::transport)?;

        Ok(bytes.to_vec())
    }
}
