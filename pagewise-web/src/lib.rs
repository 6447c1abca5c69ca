//! Page acquisition and content structuring.
//!
//! - Page fetcher trait and reqwest-backed implementation (`fetch`)
//! - Markup to [`StructuredDocument`] extraction (`extract`)
//! - [`StructuredDocument`] to prompt context rendering (`render`)
//!
//! The pipeline is `fetch -> extract -> render`; each stage is usable on its own.
//!
//! ```
//! let doc = pagewise_web::parse("<title> Docs </title><h1>A</h1><p>one</p>");
//! assert_eq!(
//!     pagewise_web::render(&doc),
//!     "Title: Docs\n\nSection - A:\none\n\nAdditional Content:\n"
//! );
//! ```

pub mod extract;
pub mod fetch;
pub mod render;

pub use extract::{parse, parse_bytes, ParseError, Section, StructuredDocument};
pub use fetch::{parse_url, FetchError, FetchedPage, HttpPageFetcher, PageFetcher};
pub use render::render;
