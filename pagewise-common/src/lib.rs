//! Common types and utilities shared across Pagewise crates.
//!
//! This crate holds the shared error type and the observability helpers used
//! by every other crate in the workspace. It is intentionally lightweight so
//! that all crates can depend on it without introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`PagewiseError`] and [`Result`]: Shared error handling for setup paths
//!
//! # Examples
//!
//! ```rust
//! use pagewise_common::PagewiseError;
//!
//! let err = PagewiseError::Config("missing model".into());
//! assert_eq!(err.to_string(), "Configuration error: missing model");
//! ```

pub mod observability;

/// Error types raised while wiring the application together.
///
/// Per-request failures (page fetch, completion calls) have their own error
/// enums in the crates that produce them; this type covers setup.
#[derive(thiserror::Error, Debug)]
pub enum PagewiseError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator client (HTTP, LLM provider) could not be constructed.
    #[error("Client setup error: {0}")]
    Client(String),

    /// Anything bubbled up from lower layers without a dedicated variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`PagewiseError`].
pub type Result<T> = std::result::Result<T, PagewiseError>;
