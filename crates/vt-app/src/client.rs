//! Submit / poll / fetch lifecycle of a single try-on job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use log::{debug, info};
use vt_core::job::StatusResponse;
use vt_core::progress::PollProgress;
use vt_core::{Job, JobStatus, Result, TryOnError, TryOnRequest};
use crate::api::TryOnApi;
use crate::store::{ResultArtifact, ResultStore};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;

const WAIT_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Stops an in-flight poll loop from another thread.
///
/// Cancellation sticks: every later poll on the same client returns
/// `Cancelled` straight away until [`CancelToken::reset`] is called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on cancellation.
    /// Returns false if cancelled.
    fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(WAIT_SLICE));
        }
    }
}

/// How a poll loop ended, short of a transport error.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalResult {
    /// Raw bytes fetched from the first output URL
    Completed(Vec<u8>),
    Failed(String),
    /// Ceiling reached; the job may still be running server-side
    TimedOut { job_id: String },
}

pub struct TryOnClient<A: TryOnApi> {
    api: A,
    policy: PollPolicy,
    store: ResultStore,
    cancel: CancelToken,
}

impl<A: TryOnApi> TryOnClient<A> {
    pub fn new(api: A, policy: PollPolicy, store: ResultStore) -> Self {
        Self {
            api,
            policy,
            store,
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Submit a job and return its id.
    pub fn submit(&self, request: &TryOnRequest) -> Result<String> {
        request.validate()?;

        let body = request.to_run_request();
        let resp = self.api.run(&body)?;

        if let Some(message) = resp.error_message() {
            return Err(TryOnError::JobRejected(message));
        }

        let job_id = resp
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TryOnError::Transport("response carried no job id".into()))?;

        info!("Submitted try-on job {} ({})", job_id, request.category);
        Ok(job_id)
    }

    /// Single status check, no waiting.
    pub fn check(&self, job_id: &str) -> Result<Job> {
        let resp = self.api.status(job_id)?;
        let mut job = Job::new(job_id);
        job.apply(&resp);
        Ok(job)
    }

    pub fn poll(&self, job_id: &str) -> Result<TerminalResult> {
        self.poll_with(job_id, |_| {})
    }

    /// Wait the poll interval, then check status, until the job completes,
    /// fails, or the attempt ceiling is hit. `on_progress` sees every
    /// attempt before its wait.
    pub fn poll_with<F>(&self, job_id: &str, mut on_progress: F) -> Result<TerminalResult>
    where
        F: FnMut(&PollProgress),
    {
        let max_attempts = self.policy.max_attempts;
        let mut job = Job::new(job_id);

        for attempt in 0..max_attempts {
            on_progress(&PollProgress::new(job_id, attempt, max_attempts));

            if !self.cancel.wait(self.policy.interval) {
                info!("Polling cancelled for job {}", job_id);
                return Err(TryOnError::Cancelled { job_id: job_id.to_string() });
            }

            let resp = self.api.status(job_id)?;
            debug!("Job {} attempt {}/{}: {}", job_id, attempt + 1, max_attempts, resp.status);
            job.apply(&resp);

            match job.status {
                JobStatus::Completed => {
                    let bytes = self.fetch_output(&resp)?;
                    info!("Job {} completed after {} checks", job_id, attempt + 1);
                    return Ok(TerminalResult::Completed(bytes));
                }
                JobStatus::Failed => {
                    let message = job.error.unwrap_or_else(|| "Unknown error".to_string());
                    info!("Job {} failed: {}", job_id, message);
                    return Ok(TerminalResult::Failed(message));
                }
                JobStatus::Pending => {}
            }
        }

        info!("Job {} still pending after {} checks", job_id, max_attempts);
        Ok(TerminalResult::TimedOut { job_id: job_id.to_string() })
    }

    fn fetch_output(&self, resp: &StatusResponse) -> Result<Vec<u8>> {
        let url = resp
            .output
            .as_ref()
            .and_then(|urls| urls.first())
            .ok_or_else(|| TryOnError::Transport("completed job returned no output".into()))?;

        self.api.fetch(url)
    }

    pub fn persist(&self, bytes: &[u8]) -> Result<std::path::PathBuf> {
        self.store.persist(bytes)
    }

    /// Poll an already submitted job and store its result.
    pub fn resume<F>(&self, job_id: &str, on_progress: F) -> Result<ResultArtifact>
    where
        F: FnMut(&PollProgress),
    {
        match self.poll_with(job_id, on_progress)? {
            TerminalResult::Completed(bytes) => self.store.store(job_id, &bytes),
            TerminalResult::Failed(message) => Err(TryOnError::JobFailed(message)),
            TerminalResult::TimedOut { job_id } => Err(TryOnError::JobTimedOut { job_id }),
        }
    }

    /// Full lifecycle: submit, poll, fetch, store.
    pub fn try_on<F>(&self, request: &TryOnRequest, on_progress: F) -> Result<ResultArtifact>
    where
        F: FnMut(&PollProgress),
    {
        let job_id = self.submit(request)?;
        self.resume(&job_id, on_progress)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use serde_json::json;
    use vt_core::job::{RunRequest, RunResponse};
    use vt_core::{Category, ImageInput};

    /// Plays back canned responses and counts calls.
    #[derive(Default)]
    pub(crate) struct ScriptedApi {
        pub run_response: Mutex<Option<Result<RunResponse>>>,
        pub statuses: Mutex<VecDeque<StatusResponse>>,
        pub result_bytes: Vec<u8>,
        pub run_bodies: Mutex<Vec<RunRequest>>,
        pub status_calls: Mutex<u32>,
        pub fetched: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        pub fn accepting(job_id: &str) -> Self {
            let api = Self::default();
            *api.run_response.lock().unwrap() = Some(Ok(RunResponse {
                id: Some(job_id.to_string()),
                error: None,
            }));
            api
        }

        pub fn with_statuses(self, statuses: Vec<serde_json::Value>) -> Self {
            *self.statuses.lock().unwrap() = statuses
                .into_iter()
                .map(|v| serde_json::from_value(v).unwrap())
                .collect();
            self
        }

        pub fn with_result(mut self, bytes: &[u8]) -> Self {
            self.result_bytes = bytes.to_vec();
            self
        }

        pub fn status_calls(&self) -> u32 {
            *self.status_calls.lock().unwrap()
        }
    }

    impl TryOnApi for ScriptedApi {
        fn run(&self, body: &RunRequest) -> Result<RunResponse> {
            self.run_bodies.lock().unwrap().push(body.clone());
            self.run_response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(TryOnError::transport("no scripted run response")))
        }

        fn status(&self, _job_id: &str) -> Result<StatusResponse> {
            *self.status_calls.lock().unwrap() += 1;
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| StatusResponse {
                    status: "processing".into(),
                    ..Default::default()
                }))
        }

        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.fetched.lock().unwrap().push(url.to_string());
            Ok(self.result_bytes.clone())
        }
    }

    pub(crate) fn fast_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub(crate) fn request() -> TryOnRequest {
        TryOnRequest::new(
            ImageInput::from_bytes(b"person".to_vec()),
            ImageInput::from_bytes(b"garment".to_vec()),
            Category::Auto,
        )
    }

    fn client(api: ScriptedApi, store: ResultStore) -> TryOnClient<ScriptedApi> {
        TryOnClient::new(api, fast_policy(), store)
    }

    #[test]
    fn test_submit_returns_job_id() {
        let tmp = tempfile::tempdir().unwrap();
        let client = client(ScriptedApi::accepting("test_job_id"), ResultStore::new(tmp.path()));

        assert_eq!(client.submit(&request()).unwrap(), "test_job_id");

        let bodies = client.api.run_bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].category, "auto");
        assert!(bodies[0].model_image.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_submit_rejected_never_yields_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::default();
        *api.run_response.lock().unwrap() = Some(Ok(RunResponse {
            id: Some("ignored".into()),
            error: Some(json!("Invalid garment image")),
        }));
        let client = client(api, ResultStore::new(tmp.path()));

        let err = client.try_on(&request(), |_| {}).unwrap_err();
        match err {
            TryOnError::JobRejected(message) => assert_eq!(message, "Invalid garment image"),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(client.api.status_calls(), 0);
    }

    #[test]
    fn test_submit_transport_error_keeps_text() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::default();
        *api.run_response.lock().unwrap() =
            Some(Err(TryOnError::transport("error sending request: connection refused")));
        let client = client(api, ResultStore::new(tmp.path()));

        let err = client.try_on(&request(), |_| {}).unwrap_err();
        assert!(matches!(err, TryOnError::Transport(ref text) if text.contains("connection refused")));
        assert!(err.to_string().starts_with("API request error:"));
    }

    #[test]
    fn test_submit_without_id() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::default();
        *api.run_response.lock().unwrap() = Some(Ok(RunResponse::default()));
        let client = client(api, ResultStore::new(tmp.path()));

        assert!(matches!(client.submit(&request()), Err(TryOnError::Transport(_))));
    }

    #[test]
    fn test_submit_empty_image_sends_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let client = client(ScriptedApi::accepting("id"), ResultStore::new(tmp.path()));
        let request = TryOnRequest::new(
            ImageInput::from_bytes(b"person".to_vec()),
            ImageInput::from_bytes(Vec::new()),
            Category::Tops,
        );

        assert!(matches!(client.submit(&request), Err(TryOnError::InvalidInput(_))));
        assert!(client.api.run_bodies.lock().unwrap().is_empty());
    }

    #[test]
    fn test_completed_on_nth_check() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("job")
            .with_statuses(vec![
                json!({"status": "starting"}),
                json!({"status": "in_queue"}),
                json!({"status": "processing"}),
                json!({"status": "completed", "output": ["https://cdn.example.com/result.jpg", "https://cdn.example.com/other.jpg"]}),
            ])
            .with_result(b"fake_image_data");
        let client = client(api, ResultStore::new(tmp.path()));

        let result = client.poll("job").unwrap();

        assert_eq!(result, TerminalResult::Completed(b"fake_image_data".to_vec()));
        assert_eq!(client.api.status_calls(), 4);
        assert_eq!(
            *client.api.fetched.lock().unwrap(),
            vec!["https://cdn.example.com/result.jpg".to_string()]
        );
    }

    #[test]
    fn test_failed_stops_polling() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("job").with_statuses(vec![
            json!({"status": "processing"}),
            json!({"status": "failed", "error": "X"}),
            json!({"status": "completed", "output": ["never"]}),
        ]);
        let client = client(api, ResultStore::new(tmp.path()));

        assert_eq!(client.poll("job").unwrap(), TerminalResult::Failed("X".into()));
        assert_eq!(client.api.status_calls(), 2);
        assert!(client.api.fetched.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_without_message() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("job").with_statuses(vec![json!({"status": "failed"})]);
        let client = client(api, ResultStore::new(tmp.path()));

        assert_eq!(client.poll("job").unwrap(), TerminalResult::Failed("Unknown error".into()));
    }

    #[test]
    fn test_times_out_at_ceiling() {
        let tmp = tempfile::tempdir().unwrap();
        let client = client(ScriptedApi::accepting("job"), ResultStore::new(tmp.path()));

        let mut seen = Vec::new();
        let result = client.poll_with("job", |p| seen.push(p.fraction)).unwrap();

        assert_eq!(result, TerminalResult::TimedOut { job_id: "job".into() });
        assert_eq!(client.api.status_calls(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(seen.len(), DEFAULT_MAX_ATTEMPTS as usize);
        assert_eq!(seen[0], 0.0);
        assert!(seen.iter().all(|f| *f <= 0.95));
    }

    #[test]
    fn test_completed_without_output() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("job")
            .with_statuses(vec![json!({"status": "completed", "output": []})]);
        let client = client(api, ResultStore::new(tmp.path()));

        assert!(matches!(client.poll("job"), Err(TryOnError::Transport(_))));
    }

    #[test]
    fn test_try_on_stores_result() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("test_job_id")
            .with_statuses(vec![json!({"status": "completed", "output": ["https://example.com/result.jpg"]})])
            .with_result(b"fake_image_data");
        let client = client(api, ResultStore::new(tmp.path().join("results")));

        let artifact = client.try_on(&request(), |_| {}).unwrap();

        assert_eq!(artifact.job_id, "test_job_id");
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"fake_image_data");
        assert!(artifact.path.starts_with(tmp.path().join("results")));
    }

    #[test]
    fn test_try_on_maps_terminal_outcomes() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("job").with_statuses(vec![json!({"status": "failed", "error": "pose not detected"})]);
        let failing = client(api, ResultStore::new(tmp.path()));
        assert!(matches!(
            failing.try_on(&request(), |_| {}),
            Err(TryOnError::JobFailed(ref m)) if m == "pose not detected"
        ));

        let slow = TryOnClient::new(
            ScriptedApi::accepting("slow"),
            PollPolicy { interval: Duration::ZERO, max_attempts: 3 },
            ResultStore::new(tmp.path()),
        );
        assert!(matches!(
            slow.try_on(&request(), |_| {}),
            Err(TryOnError::JobTimedOut { ref job_id }) if job_id == "slow"
        ));
        assert_eq!(slow.api.status_calls(), 3);
    }

    #[test]
    fn test_cancelled_before_first_check() {
        let tmp = tempfile::tempdir().unwrap();
        let client = TryOnClient::new(
            ScriptedApi::accepting("job"),
            PollPolicy::default(),
            ResultStore::new(tmp.path()),
        );
        client.cancel_token().cancel();

        let started = Instant::now();
        let err = client.poll("job").unwrap_err();

        assert!(matches!(err, TryOnError::Cancelled { .. }));
        assert_eq!(client.api.status_calls(), 0);
        assert!(started.elapsed() < DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_cancel_sticks_until_reset() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("job").with_statuses(vec![json!({"status": "failed", "error": "X"})]);
        let client = client(api, ResultStore::new(tmp.path()));
        let token = client.cancel_token();

        token.cancel();
        assert!(matches!(client.poll("job"), Err(TryOnError::Cancelled { .. })));
        assert!(matches!(client.poll("job"), Err(TryOnError::Cancelled { .. })));
        assert_eq!(client.api.status_calls(), 0);

        token.reset();
        assert!(!token.is_cancelled());
        assert_eq!(client.poll("job").unwrap(), TerminalResult::Failed("X".into()));
        assert_eq!(client.api.status_calls(), 1);
    }

    #[test]
    fn test_persist_names_by_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let client = client(ScriptedApi::default(), ResultStore::new(tmp.path().join("out")));

        let path = client.persist(b"bytes").unwrap();

        assert_eq!(path.parent().unwrap(), tmp.path().join("out"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("result_") && name.ends_with(".jpg"));
    }

    #[test]
    fn test_check_reports_current_state() {
        let tmp = tempfile::tempdir().unwrap();
        let api = ScriptedApi::accepting("job")
            .with_statuses(vec![json!({"status": "completed", "output": ["u1"]})]);
        let client = client(api, ResultStore::new(tmp.path()));

        let job = client.check("job").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_urls, vec!["u1".to_string()]);
    }
}
