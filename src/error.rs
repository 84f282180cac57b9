//! Error types for the `safe_template` crate.
//!
//! Problems with individual nodes or attribute values are not errors: they are
//! reported as [`Diagnostic`](crate::Diagnostic)s and the offending construct is
//! dropped. The variants here cover failures of the surrounding machinery.

/// All errors that can occur outside of per-node sanitization.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A storage backend failed to persist a compiled artifact.
    #[error("Storage write failed: {0}")]
    StorageWrite(Box<dyn std::error::Error + Send + Sync>),

    /// A whitelist value criterion is not a valid regular expression.
    #[error("Invalid value criterion for {attribute}: {source}")]
    InvalidCriterion {
        attribute: String,
        #[source]
        source: regex::Error,
    },

    /// The builder configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),
}

/// A type alias for `Result<T, TemplateError>`.
pub type Result<T> = std::result::Result<T, TemplateError>;
