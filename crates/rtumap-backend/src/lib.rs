pub mod client;
pub mod error;
pub mod normalize;
pub mod types;

pub use client::BackendClient;
pub use error::{BackendError, DetectionError, FieldError, PersistenceError};
pub use types::{Analytics, ApprovalResponse, SaveUploadForm};
