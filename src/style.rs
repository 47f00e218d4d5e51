//! Style resolver – runs the cascade of a parsed [`Stylesheet`] plus inline
//! `style` attributes over the DOM and produces a flat [`ComputedStyle`] per
//! element, consumed by the layout engine.

use std::collections::HashMap;

use crate::css::{self, Combinator, Compound, Declaration, Selector, Stylesheet};
use crate::dom::{DomNode, ElementNode, Tag};

/// Root font size used for `rem` units.
const ROOT_FONT_SIZE: f32 = 16.0;

/// Fully resolved style for a single element.
#[derive(Debug, Clone)]
pub struct ComputedStyle {
    // Display / layout
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub flex_wrap: FlexWrap,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,

    // Grid
    pub grid_template_columns: Vec<GridTrack>,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,
    pub min_width: Dimension,
    pub max_width: Dimension,
    pub min_height: Dimension,

    // Spacing (px)
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub padding_top: f32,
    pub padding_right: f32,
    pub padding_bottom: f32,
    pub padding_left: f32,

    // Border
    pub border_top: Border,
    pub border_right: Border,
    pub border_bottom: Border,
    pub border_left: Border,

    // Typography
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_family: String,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,
    pub font_style: FontStyle,
    pub white_space_pre: bool,
    pub list_style_none: bool,

    // Background
    pub background_color: Color,

    // Page break
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            flex_wrap: FlexWrap::NoWrap,
            flex_grow: 0.0,
            flex_shrink: 1.0,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            grid_template_columns: Vec::new(),
            width: Dimension::Auto,
            height: Dimension::Auto,
            min_width: Dimension::Auto,
            max_width: Dimension::Auto,
            min_height: Dimension::Auto,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            padding_top: 0.0,
            padding_right: 0.0,
            padding_bottom: 0.0,
            padding_left: 0.0,
            border_top: Border::NONE,
            border_right: Border::NONE,
            border_bottom: Border::NONE,
            border_left: Border::NONE,
            font_size: ROOT_FONT_SIZE,
            font_weight: FontWeight::Normal,
            font_family: "Helvetica".to_string(),
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            text_decoration: TextDecoration::None,
            font_style: FontStyle::Normal,
            white_space_pre: false,
            list_style_none: false,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    /// Sum of top and bottom margins.
    pub fn vertical_margin(&self) -> f32 {
        self.margin_top + self.margin_bottom
    }

    fn set_all_borders(&mut self, border: Border) {
        self.border_top = border;
        self.border_right = border;
        self.border_bottom = border;
        self.border_left = border;
    }
}

// ---------------------------------------------------------------------------
// Supporting enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Grid,
    Inline,
    InlineBlock,
    ListItem,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexWrap {
    NoWrap,
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
    LineThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridTrack {
    Px(f32),
    Fr(f32),
    Auto,
}

/// One side of an element's border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Border {
    pub width: f32,
    pub color: Color,
}

impl Border {
    pub const NONE: Self = Self {
        width: 0.0,
        color: Color::BLACK,
    };

    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && !self.color.is_transparent()
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Self = Self {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.r), c(self.g), c(self.b), c(self.a)]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            3 | 4 => {
                let d = |i: usize| channel(&hex[i..i + 1].repeat(2));
                let a = if hex.len() == 4 { d(3)? } else { 1.0 };
                Some(Self {
                    r: d(0)?,
                    g: d(1)?,
                    b: d(2)?,
                    a,
                })
            }
            6 | 8 => {
                let d = |i: usize| channel(&hex[i..i + 2]);
                let a = if hex.len() == 8 { d(6)? } else { 1.0 };
                Some(Self {
                    r: d(0)?,
                    g: d(2)?,
                    b: d(4)?,
                    a,
                })
            }
            _ => None,
        }
    }

    /// Parse a CSS colour: hex, `rgb()`/`rgba()`, or a common named colour.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.starts_with('#') {
            return Self::from_hex(&v);
        }
        if let Some(args) = v
            .strip_prefix("rgba(")
            .or_else(|| v.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = args
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() < 3 {
                return None;
            }
            let channel = |p: &str| -> Option<f32> {
                match p.strip_suffix('%') {
                    Some(pct) => pct.parse::<f32>().ok().map(|x| x / 100.0),
                    None => p.parse::<f32>().ok().map(|x| x / 255.0),
                }
            };
            let alpha = match parts.get(3) {
                Some(p) => match p.strip_suffix('%') {
                    Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                    None => p.parse::<f32>().ok()?,
                },
                None => 1.0,
            };
            return Some(Self {
                r: channel(parts[0])?,
                g: channel(parts[1])?,
                b: channel(parts[2])?,
                a: alpha,
            });
        }
        let named = match v.as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "transparent" => Self::TRANSPARENT,
            "red" => Self::rgb8(255, 0, 0),
            "green" => Self::rgb8(0, 128, 0),
            "blue" => Self::rgb8(0, 0, 255),
            "navy" => Self::rgb8(0, 0, 128),
            "teal" => Self::rgb8(0, 128, 128),
            "maroon" => Self::rgb8(128, 0, 0),
            "purple" => Self::rgb8(128, 0, 128),
            "orange" => Self::rgb8(255, 165, 0),
            "gray" | "grey" => Self::rgb8(128, 128, 128),
            "silver" => Self::rgb8(192, 192, 192),
            "lightgray" | "lightgrey" => Self::rgb8(211, 211, 211),
            "darkgray" | "darkgrey" => Self::rgb8(169, 169, 169),
            "dimgray" | "dimgrey" => Self::rgb8(105, 105, 105),
            "whitesmoke" => Self::rgb8(245, 245, 245),
            "steelblue" => Self::rgb8(70, 130, 180),
            "slategray" | "slategrey" => Self::rgb8(112, 128, 144),
            _ => return None,
        };
        Some(named)
    }
}

// ---------------------------------------------------------------------------
// Cascade
// ---------------------------------------------------------------------------

/// Resolves computed styles for elements against one style sheet.
pub struct StyleResolver<'a> {
    sheet: &'a Stylesheet,
}

impl<'a> StyleResolver<'a> {
    pub fn new(sheet: &'a Stylesheet) -> Self {
        Self { sheet }
    }

    /// Resolve the style for an element, inheriting text properties from its
    /// parent. `ancestors` lists the enclosing elements, outermost first.
    pub fn resolve(
        &self,
        element: &ElementNode,
        ancestors: &[&ElementNode],
        parent: Option<&ComputedStyle>,
    ) -> ComputedStyle {
        let parent_font_size = parent.map(|p| p.font_size).unwrap_or(ROOT_FONT_SIZE);
        let mut style = inherited_style(parent);
        apply_tag_defaults(&mut style, &element.tag);

        let declarations = self.matched_declarations(element, ancestors);

        // font-size first: em lengths elsewhere depend on it.
        for decl in declarations.iter().filter(|d| d.name == "font-size") {
            let value = css::resolve_vars(&decl.value, &self.sheet.vars);
            if let Some(px) = parse_font_size(&value, parent_font_size) {
                style.font_size = px;
            }
        }
        for decl in declarations.iter().filter(|d| d.name != "font-size") {
            if decl.name.starts_with("--") {
                continue;
            }
            let value = css::resolve_vars(&decl.value, &self.sheet.vars);
            apply_css_property(&mut style, &decl.name, &value);
        }

        style
    }

    /// Declarations that apply to `element` in cascade order (lowest
    /// precedence first).
    fn matched_declarations(
        &self,
        element: &ElementNode,
        ancestors: &[&ElementNode],
    ) -> Vec<Declaration> {
        // (important, inline, specificity, order, index)
        let mut entries: Vec<((bool, bool, (u32, u32, u32), usize, usize), &Declaration)> =
            Vec::new();
        for rule in &self.sheet.rules {
            if !selector_matches(&rule.selector, element, ancestors) {
                continue;
            }
            let spec = rule.selector.specificity();
            for (i, decl) in rule.declarations.iter().enumerate() {
                entries.push(((decl.important, false, spec, rule.order, i), decl));
            }
        }
        let inline = element
            .inline_style()
            .map(css::parse_declarations)
            .unwrap_or_default();
        for (i, decl) in inline.iter().enumerate() {
            entries.push(((decl.important, true, (0, 0, 0), usize::MAX, i), decl));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, d)| d.clone()).collect()
    }

    /// Build a styled tree from a DOM tree, resolving styles top-down.
    pub fn build_styled_tree(
        &self,
        nodes: &[DomNode],
        parent_style: Option<&ComputedStyle>,
    ) -> Vec<StyledNode> {
        let mut ancestors = Vec::new();
        self.build_level(nodes, parent_style, &mut ancestors)
    }

    fn build_level<'n>(
        &self,
        nodes: &'n [DomNode],
        parent_style: Option<&ComputedStyle>,
        ancestors: &mut Vec<&'n ElementNode>,
    ) -> Vec<StyledNode> {
        // Whitespace between inline siblings separates words; between blocks
        // it is insignificant.
        let inline_context = parent_style.is_some_and(|p| p.white_space_pre)
            || nodes.iter().any(|n| match n {
                DomNode::Text(t) => !t.text.trim().is_empty(),
                DomNode::Element(e) => e.tag.is_inline(),
            });

        let mut result = Vec::new();
        for node in nodes {
            match node {
                DomNode::Element(e) => {
                    let style = self.resolve(e, ancestors, parent_style);
                    ancestors.push(e);
                    let children = self.build_level(&e.children, Some(&style), ancestors);
                    ancestors.pop();
                    result.push(StyledNode::Element {
                        tag: e.tag.clone(),
                        style,
                        children,
                        attrs: e.attributes.clone(),
                    });
                }
                DomNode::Text(text) => {
                    if text.text.trim().is_empty() && !inline_context {
                        continue;
                    }
                    let mut style = parent_style.cloned().unwrap_or_default();
                    // Text nodes render inline — clear all box-model properties
                    // that must not be inherited (border, background, spacing).
                    style.display = Display::Inline;
                    style.set_all_borders(Border::NONE);
                    style.background_color = Color::TRANSPARENT;
                    style.margin_top = 0.0;
                    style.margin_right = 0.0;
                    style.margin_bottom = 0.0;
                    style.margin_left = 0.0;
                    style.padding_top = 0.0;
                    style.padding_right = 0.0;
                    style.padding_bottom = 0.0;
                    style.padding_left = 0.0;
                    style.width = Dimension::Auto;
                    style.height = Dimension::Auto;
                    style.min_height = Dimension::Auto;
                    style.page_break_before = false;
                    style.page_break_after = false;
                    result.push(StyledNode::Text {
                        text: text.text.clone(),
                        style,
                    });
                }
            }
        }
        result
    }
}

/// Build a styled tree with no author style sheet (tag defaults and inline
/// styles only).
pub fn build_styled_tree(nodes: &[DomNode], parent_style: Option<&ComputedStyle>) -> Vec<StyledNode> {
    let empty = Stylesheet::default();
    StyleResolver::new(&empty).build_styled_tree(nodes, parent_style)
}

/// Whether `selector` matches `element` given its ancestors (outermost first).
pub fn selector_matches(selector: &Selector, element: &ElementNode, ancestors: &[&ElementNode]) -> bool {
    let Some((last, _)) = selector.parts.last() else {
        return false;
    };
    compound_matches(last, element, ancestors.is_empty())
        && match_ancestors(selector, selector.parts.len() - 1, ancestors)
}

fn match_ancestors(selector: &Selector, idx: usize, ancestors: &[&ElementNode]) -> bool {
    if idx == 0 {
        return true;
    }
    let target = &selector.parts[idx - 1].0;
    match selector.parts[idx].1 {
        Combinator::Child => match ancestors.split_last() {
            Some((parent, rest)) => {
                compound_matches(target, parent, rest.is_empty())
                    && match_ancestors(selector, idx - 1, rest)
            }
            None => false,
        },
        Combinator::Descendant => (0..ancestors.len()).rev().any(|i| {
            compound_matches(target, ancestors[i], i == 0)
                && match_ancestors(selector, idx - 1, &ancestors[..i])
        }),
    }
}

fn compound_matches(compound: &Compound, element: &ElementNode, is_root: bool) -> bool {
    if compound.root && !is_root {
        return false;
    }
    if let Some(tag) = &compound.tag {
        if *tag != element.name {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if element.id() != Some(id.as_str()) {
            return false;
        }
    }
    let classes = element.classes();
    compound
        .classes
        .iter()
        .all(|c| classes.iter().any(|have| have == c))
}

/// A fresh style carrying the inherited text properties of `parent`.
fn inherited_style(parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut s = ComputedStyle::default();
    if let Some(p) = parent {
        s.font_size = p.font_size;
        s.font_weight = p.font_weight;
        s.font_family = p.font_family.clone();
        s.color = p.color;
        s.text_align = p.text_align;
        s.line_height = p.line_height;
        s.font_style = p.font_style;
        s.white_space_pre = p.white_space_pre;
        s.list_style_none = p.list_style_none;
    }
    s
}

/// User-agent defaults based on tag semantics, applied over the inherited
/// properties.
fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    let parent_font_size = s.font_size;
    let em = |v: f32, size: f32| v * size;
    match tag {
        Tag::H1 | Tag::H2 | Tag::H3 | Tag::H4 | Tag::H5 | Tag::H6 => {
            let (scale, margin) = match tag {
                Tag::H1 => (2.0, 0.67),
                Tag::H2 => (1.5, 0.83),
                Tag::H3 => (1.17, 1.0),
                Tag::H4 => (1.0, 1.33),
                Tag::H5 => (0.83, 1.67),
                _ => (0.67, 2.33),
            };
            s.font_size = parent_font_size * scale;
            s.font_weight = FontWeight::Bold;
            s.margin_top = em(margin, s.font_size);
            s.margin_bottom = em(margin, s.font_size);
        }
        Tag::P | Tag::Dl => {
            s.margin_top = em(1.0, parent_font_size);
            s.margin_bottom = em(1.0, parent_font_size);
        }
        Tag::Ul | Tag::Ol => {
            s.margin_top = em(1.0, parent_font_size);
            s.margin_bottom = em(1.0, parent_font_size);
            s.padding_left = 40.0;
        }
        Tag::Li => {
            s.display = Display::ListItem;
        }
        Tag::Dd => {
            s.margin_left = 40.0;
        }
        Tag::Blockquote => {
            s.margin_top = em(1.0, parent_font_size);
            s.margin_bottom = em(1.0, parent_font_size);
            s.margin_left = 40.0;
            s.margin_right = 40.0;
        }
        Tag::Pre => {
            s.white_space_pre = true;
            s.font_family = "Courier".to_string();
            s.margin_top = em(1.0, parent_font_size);
            s.margin_bottom = em(1.0, parent_font_size);
        }
        Tag::Hr => {
            s.margin_top = 8.0;
            s.margin_bottom = 8.0;
            s.border_top = Border {
                width: 1.0,
                color: Color::rgb8(128, 128, 128),
            };
        }
        Tag::Tr => {
            s.display = Display::TableRow;
        }
        Tag::Td | Tag::Th => {
            s.display = Display::TableCell;
            s.padding_top = 1.0;
            s.padding_right = 1.0;
            s.padding_bottom = 1.0;
            s.padding_left = 1.0;
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.text_align = TextAlign::Center;
            }
        }
        Tag::Span | Tag::A | Tag::Br => {
            s.display = Display::Inline;
            if *tag == Tag::A {
                s.text_decoration = TextDecoration::Underline;
            }
        }
        Tag::Strong => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::Em => {
            s.display = Display::Inline;
            s.font_style = FontStyle::Italic;
        }
        Tag::Code => {
            s.display = Display::Inline;
            s.font_family = "Courier".to_string();
        }
        Tag::Img => {
            s.display = Display::InlineBlock;
        }
        Tag::Head | Tag::Style | Tag::Script | Tag::Title | Tag::Meta => {
            s.display = Display::None;
        }
        Tag::Break => {
            s.height = Dimension::Px(0.0);
            s.page_break_after = true;
        }
        Tag::Div
        | Tag::Body
        | Tag::Html
        | Tag::Dt
        | Tag::Table
        | Tag::TableSection
        | Tag::Unknown(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Declaration application
// ---------------------------------------------------------------------------

/// Apply an inline `style` attribute on top of an existing style.
pub fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in css::parse_declarations(style_str) {
        if decl.name == "font-size" {
            if let Some(px) = parse_font_size(&decl.value, s.font_size) {
                s.font_size = px;
            }
        } else {
            apply_css_property(s, &decl.name, &decl.value);
        }
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    let val = val.trim();
    if val.is_empty() {
        return;
    }
    let lower = val.to_ascii_lowercase();
    let fs = s.font_size;
    match prop {
        "display" => {
            s.display = match lower.as_str() {
                "flex" | "inline-flex" => Display::Flex,
                "grid" | "inline-grid" => Display::Grid,
                "block" | "flow-root" => Display::Block,
                "inline" => Display::Inline,
                "inline-block" => Display::InlineBlock,
                "list-item" => Display::ListItem,
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = match lower.as_str() {
                "row" | "row-reverse" => FlexDirection::Row,
                "column" | "column-reverse" => FlexDirection::Column,
                _ => s.flex_direction,
            }
        }
        "flex-wrap" => {
            s.flex_wrap = match lower.as_str() {
                "wrap" | "wrap-reverse" => FlexWrap::Wrap,
                _ => FlexWrap::NoWrap,
            }
        }
        "flex" => match lower.as_str() {
            "none" => {
                s.flex_grow = 0.0;
                s.flex_shrink = 0.0;
            }
            "auto" => {
                s.flex_grow = 1.0;
                s.flex_shrink = 1.0;
            }
            _ => {
                let mut nums = lower.split_whitespace().filter_map(|p| p.parse::<f32>().ok());
                if let Some(grow) = nums.next() {
                    s.flex_grow = grow;
                    s.flex_shrink = nums.next().unwrap_or(1.0);
                }
            }
        },
        "flex-grow" => {
            if let Ok(v) = lower.parse() {
                s.flex_grow = v;
            }
        }
        "flex-shrink" => {
            if let Ok(v) = lower.parse() {
                s.flex_shrink = v;
            }
        }
        "justify-content" => {
            s.justify_content = match lower.as_str() {
                "flex-start" | "start" | "left" => JustifyContent::Start,
                "flex-end" | "end" | "right" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                "space-evenly" => JustifyContent::SpaceEvenly,
                _ => s.justify_content,
            }
        }
        "align-items" => {
            s.align_items = match lower.as_str() {
                "flex-start" | "start" | "baseline" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                "center" => AlignItems::Center,
                "stretch" | "normal" => AlignItems::Stretch,
                _ => s.align_items,
            }
        }
        "gap" | "column-gap" | "row-gap" | "grid-gap" => {
            if let Some(px) = lower.split_whitespace().next().and_then(|v| parse_length(v, fs)) {
                s.gap = px;
            }
        }
        "grid-template-columns" => {
            s.grid_template_columns = parse_grid_tracks(&lower, fs);
        }
        "font-weight" => {
            s.font_weight = match lower.as_str() {
                "bold" | "bolder" | "600" | "700" | "800" | "900" => FontWeight::Bold,
                _ => FontWeight::Normal,
            }
        }
        "font-style" => {
            s.font_style = match lower.as_str() {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "font-family" => {
            if let Some(first) = val.split(',').next() {
                let family = first.trim().trim_matches(['"', '\'']);
                if !family.is_empty() {
                    s.font_family = family.to_string();
                }
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "background" => {
            if lower == "none" {
                s.background_color = Color::TRANSPARENT;
            } else if let Some(c) = split_value(val).iter().find_map(|t| Color::parse(t)) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match lower.as_str() {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if lower.contains("underline") {
                TextDecoration::Underline
            } else if lower.contains("line-through") {
                TextDecoration::LineThrough
            } else {
                TextDecoration::None
            }
        }
        "white-space" => {
            s.white_space_pre = matches!(lower.as_str(), "pre" | "pre-wrap" | "pre-line" | "break-spaces");
        }
        "list-style" | "list-style-type" => {
            s.list_style_none = lower.split_whitespace().any(|t| t == "none");
        }
        "width" => s.width = parse_dimension(&lower, fs),
        "height" => s.height = parse_dimension(&lower, fs),
        "min-width" => s.min_width = parse_dimension(&lower, fs),
        "max-width" => {
            s.max_width = if lower == "none" {
                Dimension::Auto
            } else {
                parse_dimension(&lower, fs)
            }
        }
        "min-height" => s.min_height = parse_dimension(&lower, fs),
        "margin" => apply_shorthand_spacing(
            &lower,
            fs,
            &mut s.margin_top,
            &mut s.margin_right,
            &mut s.margin_bottom,
            &mut s.margin_left,
        ),
        "margin-top" => set_length(&mut s.margin_top, &lower, fs),
        "margin-right" => set_length(&mut s.margin_right, &lower, fs),
        "margin-bottom" => set_length(&mut s.margin_bottom, &lower, fs),
        "margin-left" => set_length(&mut s.margin_left, &lower, fs),
        "padding" => apply_shorthand_spacing(
            &lower,
            fs,
            &mut s.padding_top,
            &mut s.padding_right,
            &mut s.padding_bottom,
            &mut s.padding_left,
        ),
        "padding-top" => set_length(&mut s.padding_top, &lower, fs),
        "padding-right" => set_length(&mut s.padding_right, &lower, fs),
        "padding-bottom" => set_length(&mut s.padding_bottom, &lower, fs),
        "padding-left" => set_length(&mut s.padding_left, &lower, fs),
        "border" => {
            let border = parse_border(val, fs, Border::NONE);
            s.set_all_borders(border);
        }
        "border-top" => s.border_top = parse_border(val, fs, s.border_top),
        "border-right" => s.border_right = parse_border(val, fs, s.border_right),
        "border-bottom" => s.border_bottom = parse_border(val, fs, s.border_bottom),
        "border-left" => s.border_left = parse_border(val, fs, s.border_left),
        "border-width" => {
            let (mut t, mut r, mut b, mut l) = (
                s.border_top.width,
                s.border_right.width,
                s.border_bottom.width,
                s.border_left.width,
            );
            apply_shorthand_spacing(&lower, fs, &mut t, &mut r, &mut b, &mut l);
            s.border_top.width = t;
            s.border_right.width = r;
            s.border_bottom.width = b;
            s.border_left.width = l;
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_top.color = c;
                s.border_right.color = c;
                s.border_bottom.color = c;
                s.border_left.color = c;
            }
        }
        "border-style" => {
            if lower == "none" || lower == "hidden" {
                s.set_all_borders(Border::NONE);
            }
        }
        "line-height" => {
            if lower == "normal" {
                s.line_height = 1.2;
            } else if let Ok(v) = lower.parse::<f32>() {
                s.line_height = v;
            } else if let Some(pct) = lower.strip_suffix('%').and_then(|p| p.parse::<f32>().ok()) {
                s.line_height = pct / 100.0;
            } else if let Some(px) = parse_length(&lower, fs) {
                if fs > 0.0 {
                    s.line_height = px / fs;
                }
            }
        }
        "break-after" | "page-break-after" => {
            s.page_break_after = is_forced_break(&lower);
        }
        "break-before" | "page-break-before" => {
            s.page_break_before = is_forced_break(&lower);
        }
        "break-inside" | "page-break-inside" => {
            s.page_break_inside_avoid = lower.starts_with("avoid");
        }
        _ => {}
    }
}

fn is_forced_break(value: &str) -> bool {
    matches!(value, "page" | "always" | "left" | "right" | "recto" | "verso")
}

/// Split a value on whitespace outside parentheses.
fn split_value(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for c in value.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_border(value: &str, font_size: f32, current: Border) -> Border {
    let lower = value.trim().to_ascii_lowercase();
    if lower == "none" || lower == "0" {
        return Border::NONE;
    }
    let mut border = Border {
        width: if current.width > 0.0 { current.width } else { 3.0 },
        color: current.color,
    };
    for token in split_value(value) {
        let t = token.to_ascii_lowercase();
        match t.as_str() {
            "none" | "hidden" => return Border::NONE,
            "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset" => {}
            "thin" => border.width = 1.0,
            "medium" => border.width = 3.0,
            "thick" => border.width = 5.0,
            _ => {
                if let Some(px) = parse_length(&t, font_size) {
                    border.width = px;
                } else if let Some(c) = Color::parse(&t) {
                    border.color = c;
                }
            }
        }
    }
    border
}

fn parse_grid_tracks(value: &str, font_size: f32) -> Vec<GridTrack> {
    let mut tracks = Vec::new();
    for token in split_value(value) {
        if let Some(args) = token
            .strip_prefix("repeat(")
            .and_then(|r| r.strip_suffix(')'))
        {
            if let Some((count, track)) = args.split_once(',') {
                let n: usize = count.trim().parse().unwrap_or(1);
                let inner = parse_grid_tracks(track, font_size);
                for _ in 0..n {
                    tracks.extend(inner.iter().copied());
                }
            }
            continue;
        }
        if let Some(fr) = token.strip_suffix("fr").and_then(|v| v.parse::<f32>().ok()) {
            tracks.push(GridTrack::Fr(fr));
        } else if let Some(px) = parse_length(&token, font_size) {
            tracks.push(GridTrack::Px(px));
        } else {
            tracks.push(GridTrack::Auto);
        }
    }
    tracks
}

fn set_length(target: &mut f32, value: &str, font_size: f32) {
    if let Some(px) = parse_length(value, font_size) {
        *target = px;
    }
}

/// Parse a CSS length into px. `em` is relative to `font_size`; percentages
/// are not lengths here and yield `None`.
pub fn parse_length(value: &str, font_size: f32) -> Option<f32> {
    let v = value.trim();
    if v == "0" {
        return Some(0.0);
    }
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let (num, unit) = v.split_at(split);
    let n: f32 = num.parse().ok()?;
    let px = match unit {
        "px" => n,
        "pt" => n * 96.0 / 72.0,
        "pc" => n * 16.0,
        "em" => n * font_size,
        "rem" => n * ROOT_FONT_SIZE,
        "mm" => n * 96.0 / 25.4,
        "cm" => n * 96.0 / 2.54,
        "in" => n * 96.0,
        "" if n == 0.0 => 0.0,
        _ => return None,
    };
    Some(px)
}

fn parse_font_size(value: &str, parent_font_size: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    match v.as_str() {
        "xx-small" => return Some(9.0),
        "x-small" => return Some(10.0),
        "small" => return Some(13.0),
        "medium" => return Some(16.0),
        "large" => return Some(18.0),
        "x-large" => return Some(24.0),
        "xx-large" => return Some(32.0),
        "smaller" => return Some(parent_font_size / 1.2),
        "larger" => return Some(parent_font_size * 1.2),
        _ => {}
    }
    if let Some(pct) = v.strip_suffix('%').and_then(|p| p.parse::<f32>().ok()) {
        return Some(parent_font_size * pct / 100.0);
    }
    parse_length(&v, parent_font_size)
}

fn parse_dimension(s: &str, font_size: f32) -> Dimension {
    let s = s.trim();
    if s == "auto" {
        Dimension::Auto
    } else if let Some(pct) = s.strip_suffix('%') {
        pct.parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto)
    } else {
        parse_length(s, font_size)
            .map(Dimension::Px)
            .unwrap_or(Dimension::Auto)
    }
}

fn apply_shorthand_spacing(
    val: &str,
    font_size: f32,
    top: &mut f32,
    right: &mut f32,
    bottom: &mut f32,
    left: &mut f32,
) {
    // `auto` (centering margins) resolves to zero here.
    let parts: Vec<f32> = val
        .split_whitespace()
        .map(|p| parse_length(p, font_size).unwrap_or(0.0))
        .collect();
    match parts.len() {
        1 => {
            *top = parts[0];
            *right = parts[0];
            *bottom = parts[0];
            *left = parts[0];
        }
        2 => {
            *top = parts[0];
            *bottom = parts[0];
            *right = parts[1];
            *left = parts[1];
        }
        3 => {
            *top = parts[0];
            *right = parts[1];
            *left = parts[1];
            *bottom = parts[2];
        }
        4 => {
            *top = parts[0];
            *right = parts[1];
            *bottom = parts[2];
            *left = parts[3];
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (for images src, etc.)
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::Media;
    use crate::dom::parse_html;

    fn first_element(nodes: &[StyledNode]) -> &StyledNode {
        nodes
            .iter()
            .find(|n| matches!(n, StyledNode::Element { .. }))
            .expect("element")
    }

    #[test]
    fn inline_style_font_size() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "font-size: 24px; color: #ff0000");
        assert_eq!(s.font_size, 24.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn color_formats() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.g - 0.533).abs() < 0.01);
        let c = Color::parse("rgba(0, 0, 255, 0.5)").unwrap();
        assert!((c.b - 1.0).abs() < 0.01);
        assert!((c.a - 0.5).abs() < 0.01);
        assert_eq!(Color::parse("white"), Some(Color::WHITE));
        assert!(Color::parse("not-a-colour").is_none());
    }

    #[test]
    fn non_ascii_hex_colours_are_rejected() {
        assert!(Color::from_hex("#é1").is_none());
        assert!(Color::from_hex("#ééé").is_none());
        assert!(Color::parse("#zz0000").is_none());
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "color: #é1");
        assert_eq!(s.color, ComputedStyle::default().color);
    }

    #[test]
    fn lengths_in_common_units() {
        assert_eq!(parse_length("12px", 16.0), Some(12.0));
        assert_eq!(parse_length("1.5em", 10.0), Some(15.0));
        assert_eq!(parse_length("1in", 16.0), Some(96.0));
        assert!((parse_length("72pt", 16.0).unwrap() - 96.0).abs() < 0.01);
        assert!((parse_length("25.4mm", 16.0).unwrap() - 96.0).abs() < 0.01);
        assert_eq!(parse_length("50%", 16.0), None);
    }

    #[test]
    fn specificity_beats_order_and_inline_beats_rules() {
        let sheet = Stylesheet::parse(
            ".s p.lead { font-size: 20px } .s p { font-size: 12px; color: red }",
            Media::Screen,
        );
        let dom = parse_html(r#"<div class="s"><p class="lead" style="color: #00ff00">x</p></div>"#);
        let tree = StyleResolver::new(&sheet).build_styled_tree(&dom, None);
        let StyledNode::Element { children, .. } = first_element(&tree) else {
            unreachable!()
        };
        let p = first_element(children).style();
        assert_eq!(p.font_size, 20.0);
        assert!((p.color.g - 1.0).abs() < 0.01);
    }

    #[test]
    fn child_combinator_requires_direct_parent() {
        let sheet = Stylesheet::parse(".s > p { margin-top: 7px }", Media::Screen);
        let dom = parse_html(r#"<div class="s"><div><p>x</p></div><p>y</p></div>"#);
        let tree = StyleResolver::new(&sheet).build_styled_tree(&dom, None);
        let StyledNode::Element { children, .. } = first_element(&tree) else {
            unreachable!()
        };
        let StyledNode::Element { children: inner, .. } = &children[0] else {
            unreachable!()
        };
        assert_ne!(first_element(inner).style().margin_top, 7.0);
        assert_eq!(children[1].style().margin_top, 7.0);
    }

    #[test]
    fn custom_properties_and_em_units() {
        let sheet = Stylesheet::parse(
            ".s { --base: 10px; font-size: var(--base) } .s h2 { margin-bottom: 2em }",
            Media::Screen,
        );
        let dom = parse_html(r#"<div class="s"><h2>Skills</h2></div>"#);
        let tree = StyleResolver::new(&sheet).build_styled_tree(&dom, None);
        let StyledNode::Element { style, children, .. } = first_element(&tree) else {
            unreachable!()
        };
        assert_eq!(style.font_size, 10.0);
        let h2 = first_element(children).style();
        assert_eq!(h2.font_size, 15.0);
        assert_eq!(h2.margin_bottom, 30.0);
    }

    #[test]
    fn border_shorthands() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "border-bottom: 2px solid #ff0000; border-left: none");
        assert_eq!(s.border_bottom.width, 2.0);
        assert!(s.border_bottom.is_visible());
        assert!(!s.border_left.is_visible());
        assert!(!s.border_top.is_visible());
    }

    #[test]
    fn page_break_properties() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "break-after: page; page-break-inside: avoid");
        assert!(s.page_break_after);
        assert!(s.page_break_inside_avoid);
    }

    #[test]
    fn whitespace_between_inline_elements_is_kept() {
        let dom = parse_html("<p><strong>A</strong> <em>B</em></p>");
        let tree = build_styled_tree(&dom, None);
        let StyledNode::Element { children, .. } = first_element(&tree) else {
            unreachable!()
        };
        assert_eq!(children.len(), 3);
        let dom = parse_html("<ul>\n<li>A</li>\n</ul>");
        let tree = build_styled_tree(&dom, None);
        let StyledNode::Element { children, .. } = first_element(&tree) else {
            unreachable!()
        };
        assert_eq!(children.len(), 1);
    }
}
