//! Flatten a [`StructuredDocument`] into the plain-text context handed to the model.
//!
//! Layout:
//!
//! ```text
//! Title: <title>
//!
//! Section - <heading>:
//! <paragraphs joined by a single space>
//!
//! Additional Content:
//! <leftover paragraphs joined by a single space>
//! ```
//!
//! Nothing is escaped or truncated.

use std::fmt;

use crate::extract::StructuredDocument;

/// Render the document as prompt context. Deterministic for a given document.
pub fn render(doc: &StructuredDocument) -> String {
    doc.to_string()
}

impl fmt::Display for StructuredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Title: {}\n\n", self.title())?;
        for section in self.sections() {
            write!(
                f,
                "Section - {}:\n{}\n\n",
                section.heading,
                section.paragraphs.join(" ")
            )?;
        }
        write!(
            f,
            "Additional Content:\n{}",
            self.leftover_paragraphs().join(" ")
        )
    }
}
