//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! We support the subset produced by Markdown conversion plus common resume
//! markup:
//! - Structural: div-like containers, p, h1-h6, ul, ol, li, dl, blockquote,
//!   pre, hr, table, img
//! - Inline: span, a, strong/b, em/i, code and friends
//! - Raw text: style, script, title
//! - `<break>` (or any `.page-break` element) as a manual page break marker
//!
//! Every node records the byte span it was parsed from so that callers can
//! slice the exact outer markup back out of the source. Whitespace between
//! tags is kept as text so inline runs keep their word breaks.

use std::collections::HashMap;
use std::ops::Range;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// Behavioural tag category. The lower-cased source name is kept on the
/// element for selector matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// div and the sectioning elements (section, header, article, …).
    Div,
    P,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Ul,
    Ol,
    Li,
    Dl,
    Dt,
    Dd,
    Blockquote,
    Pre,
    Hr,
    Table,
    /// thead / tbody / tfoot
    TableSection,
    Tr,
    Td,
    Th,
    Span,
    Strong,
    Em,
    Code,
    A,
    Br,
    Img,
    Body,
    Html,
    Head,
    Style,
    Script,
    Title,
    /// meta / link / base
    Meta,
    /// Manual page break marker.
    Break,
    /// Catch-all for unknown tags – they are kept and treated as divs.
    Unknown(String),
}

impl Tag {
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "div" | "section" | "header" | "footer" | "article" | "main" | "nav" | "aside"
            | "figure" | "figcaption" | "address" | "details" | "summary" | "center" | "form"
            | "fieldset" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "h4" => Tag::H4,
            "h5" => Tag::H5,
            "h6" => Tag::H6,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "dl" => Tag::Dl,
            "dt" => Tag::Dt,
            "dd" => Tag::Dd,
            "blockquote" => Tag::Blockquote,
            "pre" => Tag::Pre,
            "hr" => Tag::Hr,
            "table" => Tag::Table,
            "thead" | "tbody" | "tfoot" => Tag::TableSection,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" | "small" | "sup" | "sub" | "u" | "s" | "del" | "ins" | "mark" | "abbr"
            | "label" | "time" | "q" | "input" => Tag::Span,
            "strong" | "b" => Tag::Strong,
            "em" | "i" | "cite" => Tag::Em,
            "code" | "kbd" | "samp" | "tt" => Tag::Code,
            "a" => Tag::A,
            "br" => Tag::Br,
            "img" => Tag::Img,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "title" => Tag::Title,
            "meta" | "link" | "base" => Tag::Meta,
            "break" => Tag::Break,
            _ => Tag::Unknown(s.to_string()),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span | Tag::Strong | Tag::Em | Tag::Code | Tag::A | Tag::Br | Tag::Img
        )
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }

    pub fn is_table_part(&self) -> bool {
        matches!(
            self,
            Tag::Table | Tag::TableSection | Tag::Tr | Tag::Td | Tag::Th
        )
    }

    pub fn is_heading(&self) -> bool {
        matches!(
            self,
            Tag::H1 | Tag::H2 | Tag::H3 | Tag::H4 | Tag::H5 | Tag::H6
        )
    }

    /// Elements that never have children or a closing tag.
    fn is_void(&self, name: &str) -> bool {
        matches!(self, Tag::Img | Tag::Br | Tag::Hr | Tag::Meta | Tag::Break)
            || matches!(name, "input" | "col" | "source" | "wbr" | "area")
    }

    /// Elements whose content is raw text up to the matching end tag.
    fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(TextNode),
}

impl DomNode {
    /// Byte range of the node's outer markup in the parsed source.
    pub fn span(&self) -> Range<usize> {
        match self {
            DomNode::Element(e) => e.span.clone(),
            DomNode::Text(t) => t.span.clone(),
        }
    }

    /// Whether this node is a manual page-break marker.
    pub fn is_page_break(&self) -> bool {
        match self {
            DomNode::Element(e) => {
                e.tag == Tag::Break || e.classes().iter().any(|c| *c == "page-break")
            }
            DomNode::Text(_) => false,
        }
    }

    /// Whether this is a text node holding only whitespace.
    pub fn is_whitespace(&self) -> bool {
        matches!(self, DomNode::Text(t) if t.text.trim().is_empty())
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self) -> String {
        match self {
            DomNode::Text(t) => t.text.clone(),
            DomNode::Element(e) => e.children.iter().map(DomNode::text_content).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextNode {
    pub text: String,
    pub span: Range<usize>,
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    /// Lower-cased tag name as written in the source.
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
    pub span: Range<usize>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        let name = match &tag {
            Tag::Unknown(n) => n.to_ascii_lowercase(),
            other => format!("{other:?}").to_ascii_lowercase(),
        };
        Self {
            tag,
            name,
            attributes: HashMap::new(),
            children: Vec::new(),
            span: 0..0,
        }
    }

    /// A synthetic container (not present in any source) with the given class.
    pub fn synthetic_div(class: &str, children: Vec<DomNode>) -> Self {
        let mut e = Self::new(Tag::Div);
        e.attributes.insert("class".to_string(), class.to_string());
        e.children = children;
        e
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| *c == class)
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").map(|s| s.as_str())
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over a byte cursor
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of DOM nodes.
///
/// We use a hand-written parser that handles the controlled subset. Stray
/// closing tags are skipped, and a closing tag that belongs to an ancestor
/// implicitly closes the elements opened inside it.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut cursor = Cursor {
        src: html,
        at: 0,
        open: Vec::new(),
    };
    cursor.nodes()
}

/// Byte cursor over the source. Every delimiter the parser stops on is
/// ASCII, so `at` always sits on a char boundary.
struct Cursor<'a> {
    src: &'a str,
    at: usize,
    /// Names of the currently open elements, outermost first.
    open: Vec<String>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':')
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.at..]
    }

    fn done(&self) -> bool {
        self.at >= self.src.len()
    }

    fn at_str(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    /// Consume `s` if the input continues with it.
    fn eat(&mut self, s: &str) -> bool {
        let hit = self.at_str(s);
        if hit {
            self.at += s.len();
        }
        hit
    }

    /// Consume the longest prefix whose chars satisfy `keep`.
    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.at += len;
        &rest[..len]
    }

    /// Jump just past the next occurrence of `needle`, or to the end.
    fn skip_past(&mut self, needle: &str) {
        self.at = match self.rest().find(needle) {
            Some(i) => self.at + i + needle.len(),
            None => self.src.len(),
        };
    }

    fn nodes(&mut self) -> Vec<DomNode> {
        let mut out = Vec::new();
        while !self.done() {
            if self.at_str("</") {
                let name = self.closing_name();
                if self.open.contains(&name) {
                    break;
                }
                // Stray closing tag.
                self.skip_past(">");
                continue;
            }
            if self.eat("<!--") {
                self.skip_past("-->");
            } else if self.at_str("<!") || self.at_str("<?") {
                self.skip_past(">");
            } else if self.opens_element() {
                out.push(self.element());
            } else {
                out.push(self.text());
            }
        }
        out
    }

    fn opens_element(&self) -> bool {
        let mut chars = self.rest().chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn closing_name(&self) -> String {
        self.rest()[2..]
            .chars()
            .take_while(|&c| is_name_char(c) && c != ':')
            .collect::<String>()
            .to_ascii_lowercase()
    }

    fn text(&mut self) -> DomNode {
        let start = self.at;
        // A '<' that does not open a tag is literal text.
        let from = if self.at_str("<") { 1 } else { 0 };
        self.at = match self.rest()[from..].find('<') {
            Some(i) => self.at + from + i,
            None => self.src.len(),
        };
        DomNode::Text(TextNode {
            text: decode_entities(&self.src[start..self.at]),
            span: start..self.at,
        })
    }

    fn element(&mut self) -> DomNode {
        let start = self.at;
        self.eat("<");
        let raw_name = self.take_while(is_name_char);
        let tag = Tag::from_str(raw_name);
        let mut elem = ElementNode::new(tag.clone());
        elem.name = raw_name.to_ascii_lowercase();

        let self_closed = self.attributes(&mut elem);
        if self_closed || tag.is_void(&elem.name) {
            elem.span = start..self.at;
            return DomNode::Element(elem);
        }

        if tag.is_raw_text() {
            let close = format!("</{}", elem.name);
            let body_start = self.at;
            let body_end = self
                .rest()
                .to_ascii_lowercase()
                .find(&close)
                .map_or(self.src.len(), |i| body_start + i);
            if body_end > body_start {
                elem.children.push(DomNode::Text(TextNode {
                    text: self.src[body_start..body_end].to_string(),
                    span: body_start..body_end,
                }));
            }
            self.at = body_end;
            self.skip_past(">");
            elem.span = start..self.at;
            return DomNode::Element(elem);
        }

        self.open.push(elem.name.clone());
        elem.children = self.nodes();
        self.open.pop();

        // Only our own closing tag is consumed; an ancestor's stays put.
        if self.at_str("</") && self.closing_name() == elem.name {
            self.skip_past(">");
        }
        elem.span = start..self.at;
        DomNode::Element(elem)
    }

    /// Read attributes up to the end of the start tag. Returns true when the
    /// tag was written self-closing (`/>`).
    fn attributes(&mut self, elem: &mut ElementNode) -> bool {
        loop {
            self.take_while(char::is_whitespace);
            if self.done() {
                return false;
            }
            if self.eat("/>") {
                return true;
            }
            if self.eat(">") {
                return false;
            }
            let key = self.take_while(is_name_char);
            if key.is_empty() {
                // Not a name character; drop it.
                let skip = self.rest().chars().next().map_or(1, char::len_utf8);
                self.at += skip;
                continue;
            }
            self.take_while(char::is_whitespace);
            let value = if self.eat("=") {
                self.take_while(char::is_whitespace);
                self.attribute_value()
            } else {
                String::new()
            };
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }
    }

    fn attribute_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.rest().starts_with(quote) {
                self.at += 1;
                let raw = self.take_while(|c| c != quote);
                self.eat(&quote.to_string());
                return decode_entities(raw);
            }
        }
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| c.is_whitespace() || c == '>' || rest[i..].starts_with("/>"))
            .map_or(rest.len(), |(i, _)| i);
        self.at += len;
        decode_entities(&rest[..len])
    }
}

/// Decode the named entities Markdown output uses plus numeric references.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        // Entity names are short; only look a few chars ahead for ';'.
        let Some((semi, _)) = tail.char_indices().take(12).find(|&(_, c)| c == ';') else {
            out.push('&');
            rest = &tail[1..];
            continue;
        };
        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{00A0}'),
            "ndash" => Some('\u{2013}'),
            "mdash" => Some('\u{2014}'),
            "bull" => Some('\u{2022}'),
            "middot" => Some('\u{00B7}'),
            "hellip" => Some('\u{2026}'),
            "copy" => Some('\u{00A9}'),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            // Recurse into <html>
            if e.tag == Tag::Html {
                let inner = body_children(&e.children);
                if !inner.is_empty() {
                    return inner;
                }
            }
        }
    }
    nodes.to_vec()
}

/// Concatenate the contents of every `<style>` element in the tree.
pub fn collect_style_text(nodes: &[DomNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Style {
                for child in &e.children {
                    out.push_str(&child.text_content());
                    out.push('\n');
                }
            } else {
                out.push_str(&collect_style_text(&e.children));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_div() {
        let html = r#"<div class="flex p-4"><p>Hello</p></div>"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Div);
            assert_eq!(e.classes(), vec!["flex", "p-4"]);
            assert_eq!(e.children.len(), 1);
        } else {
            panic!("Expected element");
        }
    }

    #[test]
    fn spans_slice_outer_markup() {
        let html = "<h1>Jane Doe</h1>\n<p>Engineer &amp; writer</p>";
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 3);
        assert!(nodes[1].is_whitespace());
        assert_eq!(&html[nodes[0].span()], "<h1>Jane Doe</h1>");
        assert_eq!(&html[nodes[2].span()], "<p>Engineer &amp; writer</p>");
        assert_eq!(nodes[2].text_content(), "Engineer & writer");
    }

    #[test]
    fn break_marker_is_void() {
        let nodes = parse_html("<p>A</p><break><p>B</p>");
        assert_eq!(nodes.len(), 3);
        assert!(nodes[1].is_page_break());
        let nodes = parse_html(r#"<div class="page-break"></div>"#);
        assert!(nodes[0].is_page_break());
    }

    #[test]
    fn style_contents_are_raw_text() {
        let html = "<html><head><style>p > a { color: red }</style></head><body><p>x</p></body></html>";
        let nodes = parse_html(html);
        assert_eq!(collect_style_text(&nodes).trim(), "p > a { color: red }");
        assert_eq!(body_children(&nodes).len(), 1);
    }

    #[test]
    fn stray_closing_tags_are_skipped() {
        let nodes = parse_html("</div><p>one</p></span><p>two</p>");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn ancestor_closing_tag_closes_children() {
        let nodes = parse_html("<ul><li>one<li>two</ul><p>after</p>");
        assert_eq!(nodes.len(), 2);
        if let DomNode::Element(ul) = &nodes[0] {
            assert_eq!(ul.tag, Tag::Ul);
        } else {
            panic!("Expected ul");
        }
    }

    #[test]
    fn parse_self_closing_img() {
        let html = r#"<img src="logo.png" />"#;
        let nodes = parse_html(html);
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::Img);
            assert_eq!(e.src(), Some("logo.png"));
        } else {
            panic!("Expected img element");
        }
    }

    #[test]
    fn numeric_entities() {
        assert_eq!(decode_entities("&#8212; &#x2022; &bogus;"), "\u{2014} \u{2022} &bogus;");
    }

    #[test]
    fn ampersand_before_multibyte_text_is_literal() {
        assert_eq!(decode_entities("R&äääääää"), "R&äääääää");
        assert_eq!(decode_entities("R&D — Zürich &amp; Köln"), "R&D — Zürich & Köln");
        let nodes = parse_html("<p>R&äääääää</p>");
        let DomNode::Element(p) = &nodes[0] else {
            panic!("expected <p>");
        };
        assert!(matches!(&p.children[0], DomNode::Text(t) if t.text == "R&äääääää"));
    }
}
