//! CSS scoping – namespaces user CSS under a per-preview class, derives the
//! custom properties the preview and print styles read, and renders the
//! standalone print document the PDF pipeline captures.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::css::{self, CssItem};
use crate::dom::{self, DomNode};
use crate::pagination::PageRecord;
use crate::style_config::StyleConfig;

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

/// Typography shared by the preview and the print document. Written
/// unscoped and passed through [`scope_css`] like user CSS.
const BASE_CSS: &str = r#"
:root {
  font-family: var(--font-family);
  font-size: var(--font-size);
  line-height: var(--line-height);
  color: #1f2937;
}
h1 { font-size: 2em; font-weight: bold; margin: 0 0 0.4em 0; }
h2 { font-size: 1.4em; font-weight: bold; margin: 0.9em 0 0.4em 0; }
h3 { font-size: 1.15em; font-weight: bold; margin: 0.8em 0 0.3em 0; }
h4, h5, h6 { font-size: 1em; font-weight: bold; margin: 0.6em 0 0.3em 0; }
p { margin: 0 0 0.6em 0; }
ul, ol { margin: 0 0 0.6em 0; padding-left: 1.4em; }
li { margin: 0 0 0.2em 0; }
blockquote { margin: 0 0 0.6em 0; padding-left: 0.8em; border-left: 3px solid #d1d5db; color: #4b5563; }
pre { margin: 0 0 0.6em 0; padding: 0.6em; background: #f3f4f6; font-family: monospace; font-size: 0.9em; }
code { font-family: monospace; font-size: 0.9em; }
hr { margin: 0.8em 0; border-top: 1px solid #d1d5db; }
table { margin: 0 0 0.6em 0; width: 100%; }
th, td { padding: 2px 6px; border-bottom: 1px solid #e5e7eb; }
th { font-weight: bold; }
img { max-width: 100%; }
break, .page-break { display: block; height: 0; margin: 0; break-after: page; }
"#;

/// Font families every target can render without a download.
const WEB_SAFE_FONTS: &[&str] = &[
    "helvetica",
    "arial",
    "times",
    "times new roman",
    "georgia",
    "courier",
    "courier new",
    "verdana",
    "tahoma",
    "trebuchet ms",
    "garamond",
    "system-ui",
    "sans-serif",
    "serif",
    "monospace",
];

// ---------------------------------------------------------------------------
// Scoped style context
// ---------------------------------------------------------------------------

/// Everything one preview instance needs to style its content: the unique
/// scope class, derived custom properties and the namespaced style sheet.
#[derive(Debug, Clone)]
pub struct ScopedStyleContext {
    pub scope_class: String,
    pub custom_properties: BTreeMap<String, String>,
    pub scoped_css: String,
    pub styles: StyleConfig,
}

impl ScopedStyleContext {
    /// Create a context with a fresh, process-unique scope class.
    pub fn create(styles: &StyleConfig, custom_css: &str) -> Self {
        let n = NEXT_SCOPE.fetch_add(1, Ordering::Relaxed);
        Self::with_scope_class(format!("pp-scope-{n}"), styles, custom_css)
    }

    /// Create a context for an explicit scope class.
    pub fn with_scope_class(scope_class: String, styles: &StyleConfig, custom_css: &str) -> Self {
        let custom_properties = custom_properties(styles);

        let mut scoped = String::new();
        let _ = writeln!(scoped, ".{scope_class} {{");
        for (name, value) in &custom_properties {
            let _ = writeln!(scoped, "  {name}: {value};");
        }
        scoped.push_str("}\n");
        scoped.push_str(&scope_css(BASE_CSS, &scope_class));
        scoped.push_str(&scope_css(custom_css, &scope_class));

        debug!(
            "created scope {scope_class} ({} bytes of CSS)",
            scoped.len()
        );
        Self {
            scope_class,
            custom_properties,
            scoped_css: scoped,
            styles: styles.clone(),
        }
    }
}

/// Custom properties exposed to user CSS.
pub fn custom_properties(styles: &StyleConfig) -> BTreeMap<String, String> {
    let (w_mm, h_mm) = styles.paper_size.dimensions_mm();
    let content_width = styles.paper_size.width_px() - 2.0 * styles.margin_h;
    let mut props = BTreeMap::new();
    props.insert("--paper-width".to_string(), format!("{}mm", fmt_num(w_mm)));
    props.insert("--paper-height".to_string(), format!("{}mm", fmt_num(h_mm)));
    props.insert("--margin-h".to_string(), format!("{}px", fmt_num(styles.margin_h)));
    props.insert("--margin-v".to_string(), format!("{}px", fmt_num(styles.margin_v)));
    props.insert("--font-family".to_string(), font_stack(&styles.font_family));
    props.insert("--font-size".to_string(), format!("{}px", fmt_num(styles.font_size)));
    props.insert("--line-height".to_string(), fmt_num(styles.line_height));
    props.insert(
        "--content-width".to_string(),
        format!("{}px", fmt_num(content_width.max(0.0))),
    );
    props
}

fn font_stack(family: &str) -> String {
    let family = family.trim();
    if family.is_empty() {
        return "Helvetica, Arial, sans-serif".to_string();
    }
    if family.contains(' ') && !family.starts_with(['"', '\'']) {
        format!("\"{family}\", Helvetica, Arial, sans-serif")
    } else {
        format!("{family}, Helvetica, Arial, sans-serif")
    }
}

/// Format a number without a trailing `.0`.
fn fmt_num(v: f32) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

pub fn is_web_safe_font(family: &str) -> bool {
    let f = family.trim().trim_matches(['"', '\'']).to_ascii_lowercase();
    f.is_empty() || WEB_SAFE_FONTS.contains(&f.as_str())
}

// ---------------------------------------------------------------------------
// Selector rewriting
// ---------------------------------------------------------------------------

/// Prefix every selector in `css_text` with `.scope`.
///
/// `html`, `body` and `:root` map onto the scope element itself. Grouping
/// at-rules are descended into; everything else is emitted verbatim.
pub fn scope_css(css_text: &str, scope: &str) -> String {
    let mut out = String::new();
    for item in css::parse_items(css_text) {
        write_scoped_item(&mut out, &item, scope);
    }
    out
}

fn write_scoped_item(out: &mut String, item: &CssItem, scope: &str) {
    match item {
        CssItem::Rule { prelude, body } => match css::split_selector_list(prelude) {
            Some(members) => {
                let scoped: Vec<String> =
                    members.iter().map(|m| scope_selector(m, scope)).collect();
                let _ = writeln!(out, "{} {{{}}}", scoped.join(", "), body);
            }
            None => {
                warn!("leaving rule with malformed selector unscoped: {prelude:?}");
                let _ = writeln!(out, "{prelude} {{{body}}}");
            }
        },
        CssItem::AtRule {
            name,
            prelude,
            body: Some(body),
        } if matches!(
            name.as_str(),
            "media" | "supports" | "container" | "layer" | "document"
        ) =>
        {
            let _ = writeln!(out, "@{name} {prelude} {{");
            for inner in css::parse_items(body) {
                write_scoped_item(out, &inner, scope);
            }
            out.push_str("}\n");
        }
        CssItem::AtRule {
            name,
            prelude,
            body: Some(body),
        } => {
            let _ = writeln!(out, "@{name} {prelude} {{{body}}}");
        }
        CssItem::AtRule {
            name,
            prelude,
            body: None,
        } => {
            let _ = writeln!(out, "@{name} {prelude};");
        }
        CssItem::Raw(text) => {
            warn!("keeping unparseable CSS verbatim: {text:?}");
            out.push_str(text);
            out.push('\n');
        }
    }
}

/// Scope one member of a selector list.
pub fn scope_selector(selector: &str, scope: &str) -> String {
    let scope_sel = format!(".{scope}");
    let selector = selector.trim();
    if selector == scope_sel
        || selector.starts_with(&format!("{scope_sel} "))
        || selector.starts_with(&format!("{scope_sel}."))
    {
        return selector.to_string();
    }

    // Collapse a leading run of root compounds (`html body p`) onto the
    // scope element, keeping any classes they carry.
    let tokens = split_compounds(selector);
    let mut suffix = String::new();
    let mut consumed = 0;
    for token in &tokens {
        match root_suffix(token) {
            Some(rest) => {
                suffix.push_str(rest);
                consumed += 1;
            }
            None => break,
        }
    }
    if consumed == 0 {
        return format!("{scope_sel} {selector}");
    }
    let rest: Vec<&str> = tokens[consumed..].iter().map(|s| s.as_str()).collect();
    if rest.is_empty() {
        format!("{scope_sel}{suffix}")
    } else {
        format!("{scope_sel}{suffix} {}", rest.join(" "))
    }
}

/// If `token` is `html`, `body` or `:root` (optionally followed by more
/// simple selectors), return what follows the root part.
fn root_suffix(token: &str) -> Option<&str> {
    for root in [":root", "html", "body"] {
        if let Some(rest) = token.strip_prefix(root) {
            let boundary = rest.is_empty() || rest.starts_with(['.', '#', ':', '[']);
            if boundary {
                return Some(rest);
            }
        }
    }
    None
}

/// Split a complex selector into compounds and combinators, outside of
/// brackets and parentheses.
fn split_compounds(selector: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for c in selector.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(c);
            }
            c if depth == 0 && c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '>' | '+' | '~' if depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

// ---------------------------------------------------------------------------
// Style registry
// ---------------------------------------------------------------------------

/// Shared registry of injected style sheets keyed by scope class.
///
/// Cloning yields another handle onto the same registry.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    sheets: Arc<Mutex<HashMap<String, String>>>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject (or replace) the context's sheet. Returns `false` when the
    /// identical sheet is already present.
    pub fn inject(&self, ctx: &ScopedStyleContext) -> bool {
        let mut sheets = self.sheets.lock().unwrap_or_else(|e| e.into_inner());
        if sheets.get(&ctx.scope_class) == Some(&ctx.scoped_css) {
            return false;
        }
        sheets.insert(ctx.scope_class.clone(), ctx.scoped_css.clone());
        debug!("injected style sheet for {}", ctx.scope_class);
        true
    }

    /// Remove the context's sheet. Returns `false` if nothing was injected.
    pub fn dispose(&self, ctx: &ScopedStyleContext) -> bool {
        let mut sheets = self.sheets.lock().unwrap_or_else(|e| e.into_inner());
        let removed = sheets.remove(&ctx.scope_class).is_some();
        if removed {
            debug!("disposed style sheet for {}", ctx.scope_class);
        }
        removed
    }

    pub fn get(&self, scope_class: &str) -> Option<String> {
        let sheets = self.sheets.lock().unwrap_or_else(|e| e.into_inner());
        sheets.get(scope_class).cloned()
    }

    /// Whether the sheet for `scope_class` is present and declares the
    /// scope's custom properties.
    pub fn is_applied(&self, scope_class: &str) -> bool {
        let sheets = self.sheets.lock().unwrap_or_else(|e| e.into_inner());
        sheets.get(scope_class).is_some_and(|css| {
            css.contains(&format!(".{scope_class} {{")) && css.contains("--paper-width")
        })
    }

    pub fn len(&self) -> usize {
        self.sheets.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Print document
// ---------------------------------------------------------------------------

/// Render a standalone print document for `html`.
///
/// When `html` is already a sequence of `.page` containers each one becomes a
/// printed page; otherwise the whole fragment is wrapped in one container.
pub fn render_print_document(ctx: &ScopedStyleContext, html: &str) -> String {
    let nodes = dom::parse_html(html);
    let top: Vec<&DomNode> = nodes
        .iter()
        .filter(|n| match n {
            DomNode::Text(t) => !t.text.trim().is_empty(),
            DomNode::Element(_) => true,
        })
        .collect();
    let already_paged = !top.is_empty()
        && top
            .iter()
            .all(|n| matches!(n, DomNode::Element(e) if e.has_class("page")));

    if !already_paged {
        return render_pages(ctx, &[html]);
    }
    let bodies: Vec<&str> = top
        .iter()
        .map(|n| match n {
            DomNode::Element(e) => match (e.children.first(), e.children.last()) {
                (Some(first), Some(last)) => &html[first.span().start..last.span().end],
                _ => "",
            },
            DomNode::Text(_) => "",
        })
        .collect();
    render_pages(ctx, &bodies)
}

/// Render a print document with one container per page record.
pub fn render_print_document_for_pages(ctx: &ScopedStyleContext, pages: &[PageRecord]) -> String {
    let bodies: Vec<&str> = pages.iter().map(|p| p.content.as_str()).collect();
    if bodies.is_empty() {
        return render_pages(ctx, &[""]);
    }
    render_pages(ctx, &bodies)
}

fn render_pages(ctx: &ScopedStyleContext, bodies: &[&str]) -> String {
    let styles = &ctx.styles;
    let (w_mm, h_mm) = styles.paper_size.dimensions_mm();

    let mut doc = String::new();
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    if !is_web_safe_font(&styles.font_family) {
        let family = styles.font_family.trim().replace(' ', "+");
        let _ = writeln!(
            doc,
            "<link rel=\"stylesheet\" href=\"https://fonts.googleapis.com/css2?family={family}:wght@400;700&display=swap\">"
        );
    }
    doc.push_str("<style>\n");
    let _ = writeln!(
        doc,
        "@page {{ size: {}; margin: 0; }}",
        styles.paper_size.css_name()
    );
    doc.push_str("html, body { margin: 0; padding: 0; background: #ffffff; }\n");
    let _ = writeln!(
        doc,
        ".page {{ box-sizing: border-box; width: {w}mm; min-height: {h}mm; padding: {mv}px {mh}px; background: #ffffff; }}",
        w = fmt_num(w_mm),
        h = fmt_num(h_mm),
        mv = fmt_num(styles.margin_v),
        mh = fmt_num(styles.margin_h),
    );
    doc.push_str(".page:not(:last-child) { break-after: page; page-break-after: always; }\n");
    doc.push_str(&ctx.scoped_css);
    doc.push_str("</style>\n</head>\n<body>\n");
    let _ = writeln!(doc, "<div class=\"{}\">", ctx.scope_class);
    for (i, body) in bodies.iter().enumerate() {
        if i + 1 < bodies.len() {
            doc.push_str("<div class=\"page\" style=\"break-after: page\">");
        } else {
            doc.push_str("<div class=\"page\">");
        }
        doc.push_str(body);
        doc.push_str("</div>\n");
    }
    doc.push_str("</div>\n</body>\n</html>\n");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style_config::PaperSize;

    fn ctx(css: &str) -> ScopedStyleContext {
        ScopedStyleContext::with_scope_class("pp-test".into(), &StyleConfig::default(), css)
    }

    #[test]
    fn scope_classes_are_unique() {
        let a = ScopedStyleContext::create(&StyleConfig::default(), "");
        let b = ScopedStyleContext::create(&StyleConfig::default(), "");
        assert_ne!(a.scope_class, b.scope_class);
        assert!(a.scope_class.starts_with("pp-scope-"));
    }

    #[test]
    fn selectors_are_prefixed() {
        assert_eq!(scope_selector("h1", "s"), ".s h1");
        assert_eq!(scope_selector("ul > li", "s"), ".s ul > li");
        assert_eq!(scope_selector("body", "s"), ".s");
        assert_eq!(scope_selector("html body p", "s"), ".s p");
        assert_eq!(scope_selector(":root.dark", "s"), ".s.dark");
        assert_eq!(scope_selector(".s h2", "s"), ".s h2");
        assert_eq!(scope_selector("bodyguard", "s"), ".s bodyguard");
    }

    #[test]
    fn scope_css_handles_at_rules() {
        let out = scope_css(
            "@media print { h1, h2 { color: red } }\n@keyframes spin { from { opacity: 0 } }\n@import url(x.css);",
            "s",
        );
        assert!(out.contains("@media print {"));
        assert!(out.contains(".s h1, .s h2 { color: red }"));
        assert!(out.contains("@keyframes spin { from { opacity: 0 } }"));
        assert!(out.contains("@import url(x.css);"));
    }

    #[test]
    fn malformed_rules_are_left_unscoped() {
        let out = scope_css("h1, , h2 { color: red } p { margin: 0 }", "s");
        assert!(out.contains("h1, , h2 { color: red }"));
        assert!(out.contains(".s p { margin: 0 }"));
    }

    #[test]
    fn custom_properties_follow_styles() {
        let styles = StyleConfig {
            paper_size: PaperSize::Letter,
            margin_h: 36.0,
            ..StyleConfig::default()
        };
        let props = custom_properties(&styles);
        assert_eq!(props["--paper-width"], "215.9mm");
        assert_eq!(props["--margin-h"], "36px");
        assert_eq!(props["--line-height"], "1.5");
    }

    #[test]
    fn registry_inject_and_dispose() {
        let registry = StyleRegistry::new();
        let c = ctx("h1 { color: red }");
        assert!(!registry.is_applied(&c.scope_class));
        assert!(registry.inject(&c));
        assert!(!registry.inject(&c));
        assert!(registry.is_applied(&c.scope_class));
        assert!(registry.dispose(&c));
        assert!(!registry.dispose(&c));
        assert!(registry.is_empty());
    }

    #[test]
    fn print_document_breaks_between_pages() {
        let c = ctx("");
        let doc = render_print_document(
            &c,
            r#"<div class="page"><p>one</p></div><div class="page"><p>two</p></div>"#,
        );
        assert!(doc.contains("@page { size: A4; margin: 0; }"));
        assert_eq!(doc.matches("style=\"break-after: page\"").count(), 1);
        assert!(doc.contains("<div class=\"page\" style=\"break-after: page\"><p>one</p></div>"));
        assert!(doc.contains("<div class=\"page\"><p>two</p></div>"));
    }

    #[test]
    fn plain_fragment_is_wrapped_once() {
        let doc = render_print_document(&ctx(""), "<h1>Hi</h1>");
        assert_eq!(doc.matches("class=\"page\"").count(), 1);
        assert!(!doc.contains("fonts.googleapis.com"));
    }

    #[test]
    fn non_web_safe_font_gets_a_link() {
        let styles = StyleConfig {
            font_family: "Open Sans".into(),
            ..StyleConfig::default()
        };
        let c = ScopedStyleContext::with_scope_class("s".into(), &styles, "");
        let doc = render_print_document(&c, "");
        assert!(doc.contains("family=Open+Sans"));
    }
}
