//! Where compiled templates are written.
//!
//! [`FsStorage`] writes to the local filesystem. Implement [`Storage`] to
//! publish the safe HTML and its script somewhere else.

mod fs;

pub use fs::FsStorage;

use crate::error::Result;

use std::future::Future;

/// MIME type of the safe HTML artifact.
pub const HTML_CONTENT_TYPE: &str = "text/html";

/// MIME type of the generated script artifact.
pub const JS_CONTENT_TYPE: &str = "application/javascript";

/// A backend that can persist compiled artifacts.
///
/// # Implementing a custom backend
///
/// ```rust,no_run
/// use safe_template::{Storage, Result};
///
/// struct MyStorage;
///
/// impl Storage for MyStorage {
///     async fn put(&self, key: &str, content: &[u8], content_type: &str) -> Result<()> {
///         // publish content somewhere ...
///         Ok(())
///     }
/// }
/// ```
pub trait Storage: Send + Sync {
    /// Persist `content` under `key` with the MIME `content_type`.
    fn put(
        &self,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}
