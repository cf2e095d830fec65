pub mod checked;
pub mod error;
pub mod storage;
pub mod time_value;
pub mod types;

pub use error::StorageEvalError;
pub use storage::{evaluate, evaluate_project, extract_metrics, StorageProject};
pub use types::*;

/// Standard result type for all storage-eval operations
pub type StorageEvalResult<T> = Result<T, StorageEvalError>;
