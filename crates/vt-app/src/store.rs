use std::path::{Path, PathBuf};
use chrono::Utc;
use log::info;
use vt_core::Result;
use vt_core::codec::to_jpeg;

/// A try-on result written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultArtifact {
    pub job_id: String,
    pub path: PathBuf,
    pub size_bytes: usize,
    /// Width and height, when the fetched bytes decode as an image
    pub dimensions: Option<(u32, u32)>,
}

/// Directory of downloaded results, one `result_<unix_seconds>.jpg` per job.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, timestamp: i64) -> PathBuf {
        self.dir.join(format!("result_{}.jpg", timestamp))
    }

    pub fn persist(&self, bytes: &[u8]) -> Result<PathBuf> {
        self.persist_at(bytes, Utc::now().timestamp())
    }

    /// Two results stored in the same second land on the same path and the
    /// later one wins.
    pub fn persist_at(&self, bytes: &[u8], timestamp: i64) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(timestamp);
        std::fs::write(&path, bytes)?;
        info!("Stored result at {}", path.display());

        Ok(path)
    }

    pub fn store(&self, job_id: &str, bytes: &[u8]) -> Result<ResultArtifact> {
        let path = self.persist(bytes)?;
        let dimensions = image::load_from_memory(bytes)
            .ok()
            .map(|img| (img.width(), img.height()));

        Ok(ResultArtifact {
            job_id: job_id.to_string(),
            path,
            size_bytes: bytes.len(),
            dimensions,
        })
    }
}

/// Re-encode a stored result as JPEG into `dest_dir` under the download name
/// `virtual_tryon_result_<unix_seconds>.jpg`.
pub fn export_download(artifact: &ResultArtifact, dest_dir: &Path) -> Result<PathBuf> {
    // Stored results keep whatever format the service sent; sniff it.
    let img = image::ImageReader::open(&artifact.path)?
        .with_guessed_format()?
        .decode()?;
    let bytes = to_jpeg(&img)?;

    std::fs::create_dir_all(dest_dir)?;
    let path = dest_dir.join(format!("virtual_tryon_result_{}.jpg", Utc::now().timestamp()));
    std::fs::write(&path, bytes)?;

    Ok(path)
}
