use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};
use vt_core::progress::PollProgress;
use vt_core::{TryOnError, TryOnRequest};
use crate::api::TryOnApi;
use crate::client::{CancelToken, TryOnClient};
use crate::error::AppError;
use crate::store::ResultArtifact;

pub enum WorkerCommand {
    Run(TryOnRequest),
    Resume(String),
    Shutdown,
}

pub enum WorkerResponse {
    Status(String),
    Progress(PollProgress),
    Success(ResultArtifact),
    Error(TryOnError),
}

/// Runs a [`TryOnClient`] on its own thread so the caller can render
/// progress while a job is polled.
pub struct TryOnWorker {
    command_tx: Sender<WorkerCommand>,
    response_rx: Receiver<WorkerResponse>,
    cancel: CancelToken,
    thread_handle: Option<JoinHandle<()>>,
}

impl TryOnWorker {
    pub fn new<A>(client: TryOnClient<A>) -> Self
    where
        A: TryOnApi + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = channel::<WorkerCommand>();
        let (resp_tx, resp_rx) = channel::<WorkerResponse>();
        let cancel = client.cancel_token();

        let thread_handle = thread::spawn(move || {
            let progress = |p: &PollProgress| {
                let _ = resp_tx.send(WorkerResponse::Progress(p.clone()));
            };

            loop {
                let result = match cmd_rx.recv() {
                    Ok(WorkerCommand::Run(request)) => {
                        let _ = resp_tx.send(WorkerResponse::Status(format!(
                            "Submitting try-on ({})",
                            request.category.name()
                        )));
                        client.try_on(&request, progress)
                    }
                    Ok(WorkerCommand::Resume(job_id)) => {
                        let _ = resp_tx.send(WorkerResponse::Status(format!("Waiting on job {}", job_id)));
                        client.resume(&job_id, progress)
                    }
                    Ok(WorkerCommand::Shutdown) | Err(_) => break,
                };

                let response = match result {
                    Ok(artifact) => WorkerResponse::Success(artifact),
                    Err(e) => WorkerResponse::Error(e),
                };
                let _ = resp_tx.send(response);
            }
        });

        Self {
            command_tx: cmd_tx,
            response_rx: resp_rx,
            cancel,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn send_request(&self, request: TryOnRequest) -> Result<(), AppError> {
        self.command_tx
            .send(WorkerCommand::Run(request))
            .map_err(|e| AppError::Worker(format!("Failed to send request to worker: {}", e)))
    }

    pub fn send_resume(&self, job_id: String) -> Result<(), AppError> {
        self.command_tx
            .send(WorkerCommand::Resume(job_id))
            .map_err(|e| AppError::Worker(format!("Failed to send job id to worker: {}", e)))
    }

    pub fn try_recv_response(&self) -> Option<WorkerResponse> {
        self.response_rx.try_recv().ok()
    }

    /// Blocks until the worker reports something; `None` once it has exited.
    pub fn recv_response(&self) -> Option<WorkerResponse> {
        self.response_rx.recv().ok()
    }

    /// Cancels any job being polled and joins the thread.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TryOnWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
