//! Markup to [`StructuredDocument`] extraction.
//!
//! Built on `scraper` (html5ever), which recovers from any malformed input,
//! so [`parse`] never fails. Scripting is off while parsing, so `<noscript>`
//! content is markup like any other rather than raw text. [`parse_bytes`] is the fallible entry point for
//! fetched bodies that may not be text at all.
//!
//! Grouping rules:
//! - `h1`..`h6` are treated identically; there is no outline hierarchy.
//! - A heading owns the `p` elements among its *following element siblings*,
//!   up to the next heading sibling. Other siblings are skipped.
//! - Every other `p` in the document is a leftover, unless its trimmed text
//!   equals a paragraph already owned by some heading. Matching is on text,
//!   not element identity, so a repeated paragraph elsewhere on the page is
//!   dropped from the leftovers.

use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use thiserror::Error;

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
const PARAGRAPH_TAG: &str = "p";
const TITLE_TAG: &str = "title";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("document is not UTF-8 text (invalid byte at offset {valid_up_to})")]
    NotText { valid_up_to: usize },
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

/// One heading and the paragraphs attributed to it, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub heading: String,
    pub paragraphs: Vec<String>,
}

impl Section {
    pub fn new(heading: impl Into<String>, paragraphs: Vec<String>) -> Self {
        Self {
            heading: heading.into(),
            paragraphs,
        }
    }
}

/// Title, heading sections, and leftover paragraphs of one page.
///
/// Built once per page and never mutated; a new page produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuredDocument {
    title: String,
    sections: Vec<Section>,
    leftover_paragraphs: Vec<String>,
}

impl StructuredDocument {
    pub fn new(
        title: impl Into<String>,
        sections: Vec<Section>,
        leftover_paragraphs: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            sections,
            leftover_paragraphs,
        }
    }

    /// Trimmed `<title>` text, empty when the page has none.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Heading sections in document order. Duplicate heading text is kept
    /// as separate entries.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn leftover_paragraphs(&self) -> &[String] {
        &self.leftover_paragraphs
    }

    /// Total paragraphs across sections and leftovers.
    pub fn paragraph_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.paragraphs.len())
            .sum::<usize>()
            + self.leftover_paragraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.sections.is_empty() && self.leftover_paragraphs.is_empty()
    }
}

/// Extract a [`StructuredDocument`] from markup.
///
/// ```
/// use pagewise_web::{parse, Section};
///
/// let doc = parse("<p>orphan</p><h1>H</h1><p>child</p>");
/// assert_eq!(doc.sections(), &[Section::new("H", vec!["child".into()])]);
/// assert_eq!(doc.leftover_paragraphs(), &["orphan".to_string()]);
/// ```
pub fn parse(markup: &str) -> StructuredDocument {
    let html = parse_without_scripting(markup);
    if !html.errors.is_empty() {
        tracing::debug!(recovered = html.errors.len(), "extract.markup_recovered");
    }

    let mut title = None;
    let mut sections = Vec::new();
    let mut paragraphs = Vec::new();

    for el in elements(&html) {
        let name = el.value().name();
        if name == TITLE_TAG {
            if title.is_none() {
                title = Some(element_text(el));
            }
        } else if is_heading(name) {
            sections.push(Section {
                heading: element_text(el),
                paragraphs: paragraphs_following(el),
            });
        } else if name == PARAGRAPH_TAG {
            paragraphs.push(element_text(el));
        }
    }

    let owned: HashSet<&str> = sections
        .iter()
        .flat_map(|s| s.paragraphs.iter().map(String::as_str))
        .collect();
    let leftover_paragraphs: Vec<String> = paragraphs
        .into_iter()
        .filter(|text| !owned.contains(text.as_str()))
        .collect();

    let doc = StructuredDocument {
        title: title.unwrap_or_default(),
        sections,
        leftover_paragraphs,
    };
    tracing::debug!(
        title = %doc.title,
        sections = doc.sections.len(),
        leftovers = doc.leftover_paragraphs.len(),
        "extract.done"
    );
    doc
}

/// Extract from a raw body. Fails only when the bytes are not UTF-8 text;
/// a leading byte-order mark is ignored.
pub fn parse_bytes(body: &[u8]) -> Result<StructuredDocument, ParseError> {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    let markup = std::str::from_utf8(body).map_err(|e| ParseError::NotText {
        valid_up_to: e.valid_up_to(),
    })?;
    Ok(parse(markup))
}

fn parse_without_scripting(markup: &str) -> Html {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            scripting_enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    html5ever::parse_document(Html::new_document(), opts).one(markup)
}

/// Every element in document order, starting at `<html>`.
fn elements(html: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    html.root_element().descendants().filter_map(ElementRef::wrap)
}

fn is_heading(name: &str) -> bool {
    HEADING_TAGS.contains(&name)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn paragraphs_following(heading: ElementRef<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for sibling in heading.next_siblings().filter_map(ElementRef::wrap) {
        let name = sibling.value().name();
        if is_heading(name) {
            break;
        }
        if name == PARAGRAPH_TAG {
            out.push(element_text(sibling));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paras(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn groups_paragraphs_until_next_heading() {
        let doc = parse("<h1>A</h1><p>one</p><h2>B</h2><p>two</p><p>three</p>");
        assert_eq!(doc.title(), "");
        assert_eq!(
            doc.sections(),
            &[
                Section::new("A", paras(&["one"])),
                Section::new("B", paras(&["two", "three"])),
            ]
        );
        assert!(doc.leftover_paragraphs().is_empty());
    }

    #[test]
    fn paragraph_before_any_heading_is_leftover() {
        let doc = parse("<p>orphan</p><h1>H</h1><p>child</p>");
        assert_eq!(doc.sections(), &[Section::new("H", paras(&["child"]))]);
        assert_eq!(doc.leftover_paragraphs(), paras(&["orphan"]).as_slice());
    }

    #[test]
    fn empty_markup_degrades_to_empty_document() {
        for markup in ["", "<html><body></body></html>", "<div><span>x</span></div>"] {
            let doc = parse(markup);
            assert!(doc.is_empty(), "expected empty document for {markup:?}");
        }
    }

    #[test]
    fn title_is_first_title_element_trimmed() {
        let doc = parse("<html><head><title>\n  Rust Book \n</title></head><body></body></html>");
        assert_eq!(doc.title(), "Rust Book");
    }

    #[test]
    fn non_paragraph_siblings_are_skipped_without_stopping() {
        let doc = parse(
            "<h3>C</h3><div>skip</div><p>kept</p><ul><li>x</li></ul><p>also</p><h1>D</h1>",
        );
        assert_eq!(
            doc.sections(),
            &[
                Section::new("C", paras(&["kept", "also"])),
                Section::new("D", vec![]),
            ]
        );
    }

    #[test]
    fn only_same_depth_siblings_are_attributed() {
        let doc = parse("<div><h2>Inner</h2><p>a</p></div><p>b</p>");
        assert_eq!(doc.sections(), &[Section::new("Inner", paras(&["a"]))]);
        assert_eq!(doc.leftover_paragraphs(), paras(&["b"]).as_slice());
    }

    #[test]
    fn heading_levels_are_flat() {
        let doc = parse("<h1>Top</h1><p>t</p><h6>Deep</h6><p>d</p><h2>Mid</h2>");
        let headings: Vec<&str> = doc.sections().iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, ["Top", "Deep", "Mid"]);
        assert_eq!(doc.sections()[0].paragraphs, paras(&["t"]));
        assert!(doc.sections()[2].paragraphs.is_empty());
    }

    #[test]
    fn duplicate_headings_are_kept_separately() {
        let doc = parse("<h2>FAQ</h2><p>q1</p><h2>FAQ</h2><p>q2</p>");
        assert_eq!(
            doc.sections(),
            &[
                Section::new("FAQ", paras(&["q1"])),
                Section::new("FAQ", paras(&["q2"])),
            ]
        );
        assert!(doc.leftover_paragraphs().is_empty());
    }

    #[test]
    fn repeated_text_is_excluded_from_leftovers() {
        let doc = parse("<h1>A</h1><p>same</p><h1>B</h1><div><p>same</p><p>unique</p></div>");
        assert_eq!(doc.sections()[0].paragraphs, paras(&["same"]));
        assert!(doc.sections()[1].paragraphs.is_empty());
        assert_eq!(doc.leftover_paragraphs(), paras(&["unique"]).as_slice());
    }

    #[test]
    fn noscript_paragraphs_are_kept_as_leftovers() {
        let doc = parse("<h1>H</h1><noscript><p>nojs</p></noscript><p>a</p>");
        assert_eq!(doc.sections(), &[Section::new("H", paras(&["a"]))]);
        assert_eq!(doc.leftover_paragraphs(), paras(&["nojs"]).as_slice());

        let in_head = parse("<head><noscript><p>enable js</p></noscript></head><body></body>");
        assert_eq!(in_head.leftover_paragraphs(), paras(&["enable js"]).as_slice());
    }

    #[test]
    fn many_sections_partition_every_paragraph() {
        let mut markup = String::new();
        for i in 0..5_000 {
            markup.push_str(&format!("<h2>h{i}</h2><p>owned {i}</p><div><p>loose {i}</p></div>"));
        }
        let doc = parse(&markup);
        assert_eq!(doc.sections().len(), 5_000);
        assert_eq!(doc.leftover_paragraphs().len(), 5_000);
        assert_eq!(doc.paragraph_count(), 10_000);
        assert_eq!(doc.leftover_paragraphs()[4_999], "loose 4999");
    }

    #[test]
    fn text_is_trimmed_but_inner_whitespace_kept() {
        let doc = parse("<h1>  Spaced\tHeading </h1><p>\n   spaced   out \n</p>");
        assert_eq!(doc.sections()[0].heading, "Spaced\tHeading");
        assert_eq!(doc.sections()[0].paragraphs, paras(&["spaced   out"]));
    }

    #[test]
    fn nested_markup_and_entities_flatten_to_text() {
        let doc = parse("<h1>Fish &amp; <em>Chips</em></h1><p>Open <b>daily</b> &lt;9am&gt;</p>");
        assert_eq!(doc.sections()[0].heading, "Fish & Chips");
        assert_eq!(doc.sections()[0].paragraphs, paras(&["Open daily <9am>"]));
    }

    #[test]
    fn malformed_markup_does_not_fail() {
        let doc = parse("<h1>Unclosed <p>text");
        assert_eq!(doc.title(), "");
        assert_eq!(doc.sections().len(), 1);
        assert_eq!(doc.leftover_paragraphs(), paras(&["text"]).as_slice());
    }

    #[test]
    fn distinct_paragraphs_are_partitioned_exactly_once() {
        let markup = r#"
            <html><head><title>Partition</title></head><body>
              <p>intro</p>
              <section>
                <h2>First</h2><p>f1</p><aside><p>nested</p></aside><p>f2</p>
                <h3>Second</h3><p>s1</p>
              </section>
              <p>outro</p>
              <h1>Third</h1><div>no paragraphs</div>
            </body></html>
        "#;
        let doc = parse(markup);

        let mut seen: Vec<&str> = doc
            .sections()
            .iter()
            .flat_map(|s| s.paragraphs.iter())
            .chain(doc.leftover_paragraphs().iter())
            .map(String::as_str)
            .collect();
        seen.sort_unstable();

        let mut expected = vec!["intro", "f1", "nested", "f2", "s1", "outro"];
        expected.sort_unstable();

        assert_eq!(seen, expected);
        assert_eq!(doc.paragraph_count(), 6);
        assert_eq!(doc.leftover_paragraphs(), paras(&["intro", "nested", "outro"]).as_slice());
    }

    #[test]
    fn parse_bytes_rejects_non_text() {
        let err = parse_bytes(&[0x3c, 0x70, 0x3e, 0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err, ParseError::NotText { valid_up_to: 3 });
    }

    #[test]
    fn parse_bytes_ignores_bom() {
        let mut body = UTF8_BOM.to_vec();
        body.extend_from_slice(b"<title>BOM</title>");
        assert_eq!(parse_bytes(&body).unwrap().title(), "BOM");
    }
}
