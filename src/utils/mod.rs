//! Utility modules.

pub mod file;
pub mod retry;

pub use file::{calculate_checksum, read_file_bytes, sanitize_filename, store_upload};
pub use retry::{RetryConfig, Retryable, with_retry};
