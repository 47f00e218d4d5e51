//! CSS parsing – splits a style sheet into rules and at-rules, parses
//! declaration blocks, and understands the selector subset the cascade in
//! [`crate::style`] can match.
//!
//! The parser never fails: unbalanced or stray text is surfaced as
//! [`CssItem::Raw`] so callers can pass it through untouched.

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Top-level items
// ---------------------------------------------------------------------------

/// One top-level item of a style sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CssItem {
    /// `prelude { body }` where the prelude is a selector list.
    Rule { prelude: String, body: String },
    /// `@name prelude { body }` or `@name prelude;`.
    AtRule {
        name: String,
        prelude: String,
        body: Option<String>,
    },
    /// Text that could not be parsed into a rule; kept verbatim.
    Raw(String),
}

/// Split a style sheet into top-level items. Comments are dropped.
pub fn parse_items(css: &str) -> Vec<CssItem> {
    let src = strip_comments(css);
    let bytes = src.as_bytes();
    let mut items = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        let start = pos;
        let Some((stop, stop_byte)) = scan_until(&src, pos, &[b'{', b';']) else {
            let rest = src[start..].trim();
            if !rest.is_empty() {
                items.push(CssItem::Raw(rest.to_string()));
            }
            break;
        };
        let prelude = src[start..stop].trim().to_string();

        if stop_byte == b';' {
            pos = stop + 1;
            match split_at_rule(&prelude) {
                Some((name, rest)) => items.push(CssItem::AtRule {
                    name,
                    prelude: rest,
                    body: None,
                }),
                None => items.push(CssItem::Raw(format!("{prelude};"))),
            }
            continue;
        }

        let Some(close) = matching_brace(&src, stop) else {
            items.push(CssItem::Raw(src[start..].trim().to_string()));
            break;
        };
        let body = src[stop + 1..close].to_string();
        pos = close + 1;

        match split_at_rule(&prelude) {
            Some((name, rest)) => items.push(CssItem::AtRule {
                name,
                prelude: rest,
                body: Some(body),
            }),
            None => items.push(CssItem::Rule { prelude, body }),
        }
    }
    items
}

fn split_at_rule(prelude: &str) -> Option<(String, String)> {
    let rest = prelude.strip_prefix('@')?;
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '(' || c == '"' || c == '\'')
        .unwrap_or(rest.len());
    Some((
        rest[..end].to_ascii_lowercase(),
        rest[end..].trim().to_string(),
    ))
}

/// Remove `/* … */` comments that are not inside strings. An unterminated
/// comment swallows the rest of the input.
pub fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(n) = chars.next() {
                    out.push(n);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
            continue;
        }
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = '\0';
            for n in chars.by_ref() {
                if prev == '*' && n == '/' {
                    break;
                }
                prev = n;
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Find the first byte in `stops` at nesting depth zero (outside strings,
/// parentheses and brackets), starting at `from`.
fn scan_until(src: &str, from: usize, stops: &[u8]) -> Option<(usize, u8)> {
    let bytes = src.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            _ if depth <= 0 && stops.contains(&b) => return Some((i, b)),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Given the index of an opening `{`, return the index of its matching `}`.
fn matching_brace(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

// ---------------------------------------------------------------------------
// Selector lists
// ---------------------------------------------------------------------------

/// Split a selector list on top-level commas.
///
/// Returns `None` when the list is malformed: an empty member or unbalanced
/// brackets, parentheses or quotes.
pub fn split_selector_list(prelude: &str) -> Option<Vec<String>> {
    let mut members = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for c in prelude.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
                current.push(c);
            }
            ',' if depth == 0 => {
                let member = current.trim();
                if member.is_empty() {
                    return None;
                }
                members.push(member.to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if depth != 0 || quote.is_some() {
        return None;
    }
    let last = current.trim();
    if last.is_empty() {
        return None;
    }
    members.push(last.to_string());
    Some(members)
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Lower-cased property name (custom properties keep their case).
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Parse a declaration block body (`a: b; c: d !important`).
pub fn parse_declarations(body: &str) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    loop {
        let (end, last) = match scan_until(body, pos, &[b';']) {
            Some((i, _)) => (i, false),
            None => (body.len(), true),
        };
        if let Some(decl) = parse_declaration(&body[pos..end]) {
            out.push(decl);
        }
        if last {
            break;
        }
        pos = end + 1;
    }
    out
}

fn parse_declaration(text: &str) -> Option<Declaration> {
    let (name, value) = text.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    let mut value = value.trim();
    let mut important = false;
    if let Some(idx) = value.to_ascii_lowercase().rfind("!important") {
        important = true;
        value = value[..idx].trim_end();
    }
    let name = if name.starts_with("--") {
        name.to_string()
    } else {
        name.to_ascii_lowercase()
    };
    Some(Declaration {
        name,
        value: value.to_string(),
        important,
    })
}

/// Substitute `var(--name, fallback)` references using `vars`.
///
/// Unknown variables without a fallback resolve to the empty string, which
/// the property parsers then ignore.
pub fn resolve_vars(value: &str, vars: &BTreeMap<String, String>) -> String {
    resolve_vars_depth(value, vars, 0)
}

fn resolve_vars_depth(value: &str, vars: &BTreeMap<String, String>, depth: usize) -> String {
    if depth > 8 || !value.contains("var(") {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(idx) = rest.find("var(") {
        out.push_str(&rest[..idx]);
        let inner_start = idx + 4;
        let Some(close) = matching_paren(rest, inner_start) else {
            out.push_str(&rest[idx..]);
            return out;
        };
        let inner = &rest[inner_start..close];
        let (name, fallback) = match split_top_level_comma(inner) {
            Some((n, f)) => (n.trim(), Some(f.trim())),
            None => (inner.trim(), None),
        };
        let replacement = match (vars.get(name), fallback) {
            (Some(v), _) => resolve_vars_depth(v, vars, depth + 1),
            (None, Some(f)) => resolve_vars_depth(f, vars, depth + 1),
            (None, None) => String::new(),
        };
        out.push_str(&replacement);
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn matching_paren(s: &str, from: usize) -> Option<usize> {
    let mut depth = 1i32;
    for (i, c) in s[from..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level_comma(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => return Some((&s[..i], &s[i + 1..])),
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Selectors (matching subset)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// A compound selector: `tag#id.class.class` (or `*`, or `:root`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub root: bool,
}

/// A complex selector, leftmost compound first. `parts[i].1` is the
/// combinator linking `parts[i]` to `parts[i - 1]` (ignored for `i == 0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub parts: Vec<(Compound, Combinator)>,
}

impl Selector {
    /// Parse a single selector. Returns `None` for anything outside the
    /// supported subset (sibling combinators, attribute selectors, pseudo
    /// classes other than `:root`, pseudo elements).
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts: Vec<(Compound, Combinator)> = Vec::new();
        let mut pending = Combinator::Descendant;
        let mut chars = text.trim().chars().peekable();

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }
            if c == '>' {
                chars.next();
                pending = Combinator::Child;
                continue;
            }
            if matches!(c, '+' | '~' | '[' | ',' | '&') {
                return None;
            }
            let mut token = String::new();
            while let Some(&n) = chars.peek() {
                if n.is_whitespace() || n == '>' || n == '+' || n == '~' {
                    break;
                }
                token.push(n);
                chars.next();
            }
            let compound = parse_compound(&token)?;
            if parts.is_empty() && pending == Combinator::Child {
                // A leading `>` has no left-hand side; treat as descendant.
                pending = Combinator::Descendant;
            }
            parts.push((compound, pending));
            pending = Combinator::Descendant;
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    /// `(ids, classes, tags)` in CSS specificity order.
    pub fn specificity(&self) -> (u32, u32, u32) {
        let mut spec = (0, 0, 0);
        for (c, _) in &self.parts {
            if c.id.is_some() {
                spec.0 += 1;
            }
            spec.1 += c.classes.len() as u32 + u32::from(c.root);
            if c.tag.is_some() {
                spec.2 += 1;
            }
        }
        spec
    }
}

fn parse_compound(token: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut rest = token;

    let tag_end = rest.find(['.', '#', ':']).unwrap_or(rest.len());
    let tag = &rest[..tag_end];
    if !tag.is_empty() && tag != "*" {
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return None;
        }
        compound.tag = Some(tag.to_ascii_lowercase());
    }
    rest = &rest[tag_end..];

    while !rest.is_empty() {
        let marker = rest.as_bytes()[0];
        let body = &rest[1..];
        let end = body.find(['.', '#', ':']).unwrap_or(body.len());
        let name = &body[..end];
        if name.is_empty() && marker != b':' {
            return None;
        }
        match marker {
            b'.' => compound.classes.push(name.to_string()),
            b'#' => compound.id = Some(name.to_string()),
            b':' if name == "root" => compound.root = true,
            _ => return None,
        }
        rest = &body[end..];
    }
    Some(compound)
}

// ---------------------------------------------------------------------------
// Flattened style sheet for the cascade
// ---------------------------------------------------------------------------

/// Which media the cascade is evaluating for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Media {
    Screen,
    Print,
}

#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
    /// Source order, used as the last cascade tie-breaker.
    pub order: usize,
}

/// A style sheet flattened into matchable rules plus the custom properties it
/// declares.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<StyleRule>,
    pub vars: BTreeMap<String, String>,
}

impl Stylesheet {
    pub fn parse(css: &str, media: Media) -> Self {
        let mut sheet = Stylesheet::default();
        sheet.extend(css, media);
        sheet
    }

    /// Append the rules of another sheet (later rules win ties).
    pub fn extend(&mut self, css: &str, media: Media) {
        let items = parse_items(css);
        self.collect(&items, media);
    }

    fn collect(&mut self, items: &[CssItem], media: Media) {
        for item in items {
            match item {
                CssItem::Rule { prelude, body } => {
                    let declarations = parse_declarations(body);
                    for decl in declarations.iter().filter(|d| d.name.starts_with("--")) {
                        self.vars.insert(decl.name.clone(), decl.value.clone());
                    }
                    let Some(members) = split_selector_list(prelude) else {
                        continue;
                    };
                    for member in members {
                        if let Some(selector) = Selector::parse(&member) {
                            let order = self.rules.len();
                            self.rules.push(StyleRule {
                                selector,
                                declarations: declarations.clone(),
                                order,
                            });
                        }
                    }
                }
                CssItem::AtRule {
                    name,
                    prelude,
                    body: Some(body),
                } => {
                    let applies = match name.as_str() {
                        "media" => media_matches(prelude, media),
                        "supports" | "layer" | "container" | "document" => true,
                        _ => false,
                    };
                    if applies {
                        let inner = parse_items(body);
                        self.collect(&inner, media);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Coarse media-query evaluation: only the media type is considered; feature
/// queries are assumed to match.
pub fn media_matches(prelude: &str, media: Media) -> bool {
    let q = prelude.to_ascii_lowercase();
    let (negate, q) = match q.trim().strip_prefix("not ") {
        Some(rest) => (true, rest.to_string()),
        None => (false, q),
    };
    let print = q.contains("print");
    let screen = q.contains("screen");
    let matched = match (print, screen) {
        (true, false) => media == Media::Print,
        (false, true) => media == Media::Screen,
        _ => true,
    };
    matched != negate
}
