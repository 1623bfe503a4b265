/// Cosmetic progress estimate while waiting on a job.
///
/// Caps at 0.95 so the bar never looks finished before a terminal status.
pub fn estimate(attempt: u32, max_attempts: u32) -> f32 {
    if max_attempts == 0 {
        return 0.95;
    }
    (attempt as f32 / max_attempts as f32).min(0.95)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollProgress {
    pub job_id: String,
    /// Zero-based attempt about to be made
    pub attempt: u32,
    pub max_attempts: u32,
    pub fraction: f32,
}

impl PollProgress {
    pub fn new(job_id: &str, attempt: u32, max_attempts: u32) -> Self {
        Self {
            job_id: job_id.to_string(),
            attempt,
            max_attempts,
            fraction: estimate(attempt, max_attempts),
        }
    }

    pub fn label(&self) -> String {
        format!("Processing... ({}/{}s)", self.attempt + 1, self.max_attempts)
    }
}
