pub mod category;
pub mod codec;
pub mod error;
pub mod job;
pub mod progress;

pub use category::Category;
pub use codec::ImageInput;
pub use error::{Result, TryOnError};
pub use job::{Job, JobStatus, TryOnRequest};
