//! Markdown → HTML conversion (stage A of the PDF pipeline and the input
//! side of the preview).

use std::time::Instant;

use log::debug;
use pulldown_cmark::{html, Options, Parser};

/// Convert Markdown to an HTML fragment.
///
/// Tables, footnotes, strikethrough and task lists are enabled. Raw HTML
/// (including `<break/>` markers) passes through untouched.
pub fn markdown_to_html(markdown: &str) -> String {
    let start = Instant::now();
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    let parser = Parser::new_ext(markdown, options);

    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    debug!(
        "markdown_to_html: {} bytes -> {} bytes in {:.1}ms",
        markdown.len(),
        output.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    output
}
