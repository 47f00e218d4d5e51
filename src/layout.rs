//! Layout engine – uses Taffy to compute flexbox / grid layout from a styled
//! DOM tree, then converts the result into a tree of positioned boxes.
//!
//! Blocks whose children are all inline are flattened into a single text leaf
//! whose lines are word-wrapped up front; each line keeps styled runs so bold,
//! italic and coloured spans survive into the raster.

use std::collections::HashMap;
use taffy::prelude::*;

use crate::dom::Tag;
use crate::error::MeasureError;
use crate::fonts::FontManager;
use crate::style::{self, Color, ComputedStyle, StyledNode, TextDecoration};

// ---------------------------------------------------------------------------
// Positioned boxes
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    /// Bullet or number painted in the left gutter of list items.
    pub marker: Option<String>,
    pub children: Vec<PositionedBox>,
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl PositionedBox {
    /// Height including vertical margins.
    pub fn outer_height(&self) -> f32 {
        self.height + self.style.vertical_margin()
    }

    /// Shift this box and all descendants vertically.
    pub fn translate_y(&mut self, dy: f32) {
        self.y += dy;
        for child in &mut self.children {
            child.translate_y(dy);
        }
    }
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text {
        text: String,
        lines: Vec<TextLine>,
        line_height: f32,
    },
    Image {
        src: String,
    },
}

/// One wrapped line of text.
#[derive(Debug, Clone, Default)]
pub struct TextLine {
    pub runs: Vec<TextRun>,
    pub width: f32,
}

/// A stretch of text sharing one font and colour.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub family: String,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    pub decoration: TextDecoration,
    pub width: f32,
}

impl TextRun {
    fn same_face(&self, other: &RunStyle) -> bool {
        self.family == other.family
            && self.font_size == other.font_size
            && self.bold == other.bold
            && self.italic == other.italic
            && self.color == other.color
            && self.decoration == other.decoration
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RunStyle {
    family: String,
    font_size: f32,
    bold: bool,
    italic: bool,
    color: Color,
    decoration: TextDecoration,
}

impl RunStyle {
    fn from_style(s: &ComputedStyle) -> Self {
        Self {
            family: s.font_family.clone(),
            font_size: s.font_size,
            bold: s.is_bold(),
            italic: s.is_italic(),
            color: s.color,
            decoration: s.text_decoration,
        }
    }
}

enum InlineItem {
    Word {
        text: String,
        style: RunStyle,
        space_before: bool,
    },
    Break,
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
    node_markers: HashMap<NodeId, String>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
            node_markers: HashMap::new(),
        }
    }

    /// Return true when every child is a text node or an inline element
    /// (no block-level children and no images).
    fn all_inline(children: &[StyledNode]) -> bool {
        children.iter().all(|c| match c {
            StyledNode::Text { .. } => true,
            StyledNode::Element {
                tag,
                style,
                children: gc,
                ..
            } => {
                *tag != Tag::Img
                    && matches!(style.display, style::Display::Inline)
                    && Self::all_inline(gc)
            }
        })
    }

    fn has_visible_text(children: &[StyledNode]) -> bool {
        children.iter().any(|c| match c {
            StyledNode::Text { text, .. } => !text.trim().is_empty(),
            StyledNode::Element { tag, children, .. } => {
                *tag == Tag::Br || Self::has_visible_text(children)
            }
        })
    }

    fn collect_inline(node: &StyledNode, out: &mut Vec<InlineItem>, pending_space: &mut bool) {
        match node {
            StyledNode::Text { text, style } => {
                let run = RunStyle::from_style(style);
                let leading = text.starts_with(char::is_whitespace);
                let mut first = true;
                for word in text.split_whitespace() {
                    out.push(InlineItem::Word {
                        text: word.to_string(),
                        style: run.clone(),
                        space_before: if first { *pending_space || leading } else { true },
                    });
                    first = false;
                }
                if first {
                    // Whitespace-only text separates its neighbours.
                    *pending_space = *pending_space || !text.is_empty();
                } else {
                    *pending_space = text.ends_with(char::is_whitespace);
                }
            }
            StyledNode::Element { tag, children, style, .. } => {
                if *tag == Tag::Br {
                    out.push(InlineItem::Break);
                    *pending_space = false;
                    return;
                }
                if style.display == style::Display::None {
                    return;
                }
                for child in children {
                    Self::collect_inline(child, out, pending_space);
                }
            }
        }
    }

    fn collect_raw_text(node: &StyledNode) -> String {
        match node {
            StyledNode::Text { text, .. } => text.clone(),
            StyledNode::Element { tag: Tag::Br, .. } => "\n".to_string(),
            StyledNode::Element { children, .. } => {
                children.iter().map(Self::collect_raw_text).collect()
            }
        }
    }

    /// Greedy word wrap over styled words.
    fn wrap_inline(&self, items: &[InlineItem], max_width: f32) -> Vec<TextLine> {
        let mut lines = Vec::new();
        let mut line = TextLine::default();
        for item in items {
            let (text, run_style, space_before) = match item {
                InlineItem::Break => {
                    lines.push(std::mem::take(&mut line));
                    continue;
                }
                InlineItem::Word {
                    text,
                    style,
                    space_before,
                } => (text, style, *space_before),
            };
            let measure = |s: &str| {
                self.fonts.measure_text_width(
                    s,
                    run_style.font_size,
                    run_style.bold,
                    run_style.italic,
                    &run_style.family,
                )
            };
            let word_w = measure(text);
            let mut space_w = if space_before && !line.runs.is_empty() {
                measure(" ")
            } else {
                0.0
            };
            if max_width > 0.0 && line.width + space_w + word_w > max_width && !line.runs.is_empty()
            {
                lines.push(std::mem::take(&mut line));
                space_w = 0.0;
            }
            let piece = if space_w > 0.0 {
                format!(" {text}")
            } else {
                text.clone()
            };
            match line.runs.last_mut() {
                Some(last) if last.same_face(run_style) => {
                    last.text.push_str(&piece);
                    last.width += space_w + word_w;
                }
                _ => line.runs.push(TextRun {
                    text: piece,
                    family: run_style.family.clone(),
                    font_size: run_style.font_size,
                    bold: run_style.bold,
                    italic: run_style.italic,
                    color: run_style.color,
                    decoration: run_style.decoration,
                    width: space_w + word_w,
                }),
            }
            line.width += space_w + word_w;
        }
        if !line.runs.is_empty() || lines.is_empty() {
            lines.push(line);
        }
        lines
    }

    /// Preformatted text: one line per source line, no wrapping.
    fn preformatted_lines(&self, text: &str, block: &ComputedStyle) -> Vec<TextLine> {
        let text = text.strip_prefix('\n').unwrap_or(text);
        let text = text.strip_suffix('\n').unwrap_or(text);
        text.split('\n')
            .map(|raw| {
                let line = raw.replace('\t', "    ");
                let width = self.fonts.measure_text_width(
                    &line,
                    block.font_size,
                    block.is_bold(),
                    block.is_italic(),
                    &block.font_family,
                );
                let run = RunStyle::from_style(block);
                TextLine {
                    runs: vec![TextRun {
                        text: line,
                        family: run.family,
                        font_size: run.font_size,
                        bold: run.bold,
                        italic: run.italic,
                        color: run.color,
                        decoration: run.decoration,
                        width,
                    }],
                    width,
                }
            })
            .collect()
    }

    fn build_node(
        &mut self,
        styled: &StyledNode,
        parent_width: f32,
        in_row: bool,
    ) -> Result<Option<NodeId>, MeasureError> {
        match styled {
            StyledNode::Text { text, style } => {
                if text.trim().is_empty() && !style.white_space_pre {
                    return Ok(None);
                }
                let mut items = Vec::new();
                let mut pending = false;
                Self::collect_inline(styled, &mut items, &mut pending);
                let lines = if style.white_space_pre {
                    self.preformatted_lines(text, style)
                } else {
                    self.wrap_inline(&items, parent_width)
                };
                self.build_text_leaf(text.trim(), lines, style, false).map(Some)
            }
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => self
                .build_element_node(tag, style, children, attrs, parent_width, in_row)
                .map(Some),
        }
    }

    /// Create a leaf holding wrapped text. Block leaves stretch to the
    /// container width; inline leaves are as wide as their longest line.
    fn build_text_leaf(
        &mut self,
        text: &str,
        lines: Vec<TextLine>,
        s: &ComputedStyle,
        block: bool,
    ) -> Result<NodeId, MeasureError> {
        let base_lh = self.fonts.line_height_px(s.font_size, s.line_height);
        let line_height = lines
            .iter()
            .flat_map(|l| l.runs.iter())
            .map(|r| self.fonts.line_height_px(r.font_size, s.line_height))
            .fold(base_lh, f32::max);
        let text_width = lines.iter().map(|l| l.width).fold(0.0f32, f32::max);
        let text_height = lines.len() as f32 * line_height;

        let pad_h = s.padding_left + s.padding_right + s.border_left.width + s.border_right.width;
        let pad_v = s.padding_top + s.padding_bottom + s.border_top.width + s.border_bottom.width;

        let mut ts = self.box_model(s);
        ts.display = taffy::Display::Block;
        ts.size = Size {
            width: if block {
                self.dim_to_taffy(s.width)
            } else {
                taffy::Dimension::Length(text_width + pad_h)
            },
            height: match s.height {
                style::Dimension::Px(h) => taffy::Dimension::Length(h),
                _ => taffy::Dimension::Length(text_height + pad_v),
            },
        };
        if block {
            ts.min_size.height = self.dim_to_taffy(s.min_height);
        }

        let node = self.taffy.new_leaf(ts)?;
        self.node_styles.insert(node, s.clone());
        self.node_content.insert(
            node,
            BoxContent::Text {
                text: text.to_string(),
                lines,
                line_height,
            },
        );
        Ok(node)
    }

    fn build_element_node(
        &mut self,
        tag: &Tag,
        style: &ComputedStyle,
        children: &[StyledNode],
        attrs: &HashMap<String, String>,
        parent_width: f32,
        in_row: bool,
    ) -> Result<NodeId, MeasureError> {
        // Compute the width available for content
        let my_width = match style.width {
            style::Dimension::Px(w) => w,
            style::Dimension::Percent(p) => parent_width * p / 100.0,
            style::Dimension::Auto => parent_width - style.margin_left - style.margin_right,
        };
        let inner_width = (my_width
            - style.padding_left
            - style.padding_right
            - style.border_left.width
            - style.border_right.width)
            .max(0.0);

        // Blocks whose children are all inline get their text merged into a
        // single wrapped text leaf so spans flow correctly.
        let mergeable = !matches!(
            tag,
            Tag::Img | Tag::Table | Tag::TableSection | Tag::Tr | Tag::Br
        ) && style.display != style::Display::None
            && !children.is_empty()
            && Self::all_inline(children)
            && Self::has_visible_text(children);
        if mergeable {
            let lines = if style.white_space_pre {
                let raw: String = children.iter().map(Self::collect_raw_text).collect();
                self.preformatted_lines(&raw, style)
            } else {
                let mut items = Vec::new();
                let mut pending = false;
                for child in children {
                    Self::collect_inline(child, &mut items, &mut pending);
                }
                self.wrap_inline(&items, inner_width)
            };
            let text: String = lines
                .iter()
                .map(|l| l.runs.iter().map(|r| r.text.as_str()).collect::<String>())
                .collect::<Vec<_>>()
                .join("\n");
            let inline = style.display == style::Display::Inline
                || style.display == style::Display::InlineBlock
                || (in_row && matches!(style.width, style::Dimension::Auto));
            return self.build_text_leaf(&text, lines, style, !inline);
        }

        // Estimate per-child width for flex-row containers and table rows so
        // that text is word-wrapped to the right column width at build time.
        let is_flex_row = style.display == style::Display::Flex
            && style.flex_direction == style::FlexDirection::Row;
        let is_table_row = *tag == Tag::Tr;
        let is_grid = style.display == style::Display::Grid;

        let elem_child_count = children
            .iter()
            .filter(|c| matches!(c, StyledNode::Element { .. }))
            .count()
            .max(1);

        let child_build_width = if is_flex_row || is_table_row {
            let gap_total = style.gap * (elem_child_count.saturating_sub(1)) as f32;
            ((inner_width - gap_total) / elem_child_count as f32).max(1.0)
        } else if is_grid {
            let cols = style.grid_template_columns.len().max(1);
            let gap_total = style.gap * cols.saturating_sub(1) as f32;
            ((inner_width - gap_total) / cols as f32).max(1.0)
        } else {
            inner_width
        };

        // Build child nodes
        let mut child_nodes = Vec::new();
        let mut list_counter = 0u32;

        for child in children {
            // For list items, record the marker string so it can be painted
            // as a bullet / number in the left gutter.
            let li_marker = match child {
                StyledNode::Element {
                    tag: Tag::Li,
                    style: child_style,
                    ..
                } => {
                    list_counter += 1;
                    if child_style.list_style_none {
                        None
                    } else if *tag == Tag::Ol {
                        Some(format!("{list_counter}."))
                    } else {
                        Some("\u{2022}".to_string())
                    }
                }
                _ => None,
            };

            let Some(child_id) = self.build_node(child, child_build_width, is_flex_row || is_table_row)?
            else {
                continue;
            };
            if let Some(marker) = li_marker {
                self.node_markers.insert(child_id, marker);
            }
            child_nodes.push(child_id);
        }

        // For <img> elements, resolve Auto width/height to concrete pixel dimensions
        // using the image's intrinsic size decoded from the base64 data URI.
        // Without this, a Taffy container with no children and Auto dimensions
        // computes to 0×0, making the image invisible.
        let style_override: Option<ComputedStyle> = if *tag == Tag::Img
            && (matches!(style.width, style::Dimension::Auto)
                || matches!(style.height, style::Dimension::Auto))
        {
            let src = attrs.get("src").map(|s| s.as_str()).unwrap_or("");
            resolve_img_auto_dimensions(src, style, parent_width)
        } else {
            None
        };

        let effective_style = style_override.as_ref().unwrap_or(style);
        let taffy_style = self.computed_to_taffy(effective_style, tag);
        let node = self.taffy.new_with_children(taffy_style, &child_nodes)?;
        self.node_styles.insert(node, effective_style.clone());

        // Handle images
        if *tag == Tag::Img {
            let src = attrs.get("src").cloned().unwrap_or_default();
            self.node_content.insert(node, BoxContent::Image { src });
        }

        Ok(node)
    }

    /// Margin, padding and border of a computed style.
    fn box_model(&self, s: &ComputedStyle) -> Style {
        Style {
            margin: Rect {
                top: LengthPercentageAuto::Length(s.margin_top),
                right: LengthPercentageAuto::Length(s.margin_right),
                bottom: LengthPercentageAuto::Length(s.margin_bottom),
                left: LengthPercentageAuto::Length(s.margin_left),
            },
            padding: Rect {
                top: LengthPercentage::Length(s.padding_top),
                right: LengthPercentage::Length(s.padding_right),
                bottom: LengthPercentage::Length(s.padding_bottom),
                left: LengthPercentage::Length(s.padding_left),
            },
            border: Rect {
                top: LengthPercentage::Length(s.border_top.width),
                right: LengthPercentage::Length(s.border_right.width),
                bottom: LengthPercentage::Length(s.border_bottom.width),
                left: LengthPercentage::Length(s.border_left.width),
            },
            flex_grow: s.flex_grow,
            flex_shrink: s.flex_shrink,
            min_size: Size {
                width: taffy::Dimension::Length(0.0),
                height: taffy::Dimension::Auto,
            },
            ..Default::default()
        }
    }

    fn computed_to_taffy(&self, s: &ComputedStyle, tag: &Tag) -> Style {
        let mut ts = self.box_model(s);

        // -----------------------------------------------------------------
        // HTML table model: always use flex regardless of computed display.
        // -----------------------------------------------------------------
        match tag {
            Tag::Table | Tag::TableSection => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.size.width = if *tag == Tag::TableSection {
                    taffy::Dimension::Percent(1.0)
                } else {
                    self.dim_to_taffy(s.width)
                };
                ts.size.height = self.dim_to_taffy(s.height);
                return ts;
            }
            Tag::Tr => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Row;
                ts.align_items = Some(taffy::AlignItems::Stretch);
                ts.size.width = taffy::Dimension::Percent(1.0);
                return ts;
            }
            Tag::Td | Tag::Th => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
                ts.flex_grow = 1.0;
                ts.flex_shrink = 1.0;
                ts.flex_basis = taffy::Dimension::Length(0.0); // equal columns
                return ts;
            }
            _ => {}
        }

        // Display / layout mode
        match s.display {
            style::Display::Flex => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = match s.flex_direction {
                    style::FlexDirection::Row => taffy::FlexDirection::Row,
                    style::FlexDirection::Column => taffy::FlexDirection::Column,
                };
                ts.flex_wrap = match s.flex_wrap {
                    style::FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
                    style::FlexWrap::Wrap => taffy::FlexWrap::Wrap,
                };
                ts.justify_content = Some(match s.justify_content {
                    style::JustifyContent::Start => taffy::JustifyContent::Start,
                    style::JustifyContent::End => taffy::JustifyContent::End,
                    style::JustifyContent::Center => taffy::JustifyContent::Center,
                    style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                    style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                    style::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
                });
                ts.align_items = Some(match s.align_items {
                    style::AlignItems::Start => taffy::AlignItems::Start,
                    style::AlignItems::End => taffy::AlignItems::End,
                    style::AlignItems::Center => taffy::AlignItems::Center,
                    style::AlignItems::Stretch => taffy::AlignItems::Stretch,
                });
            }
            style::Display::Grid => {
                ts.display = taffy::Display::Grid;
                ts.grid_template_columns = if s.grid_template_columns.is_empty() {
                    vec![taffy::TrackSizingFunction::from_flex(1.0)]
                } else {
                    s.grid_template_columns
                        .iter()
                        .map(|t| match t {
                            style::GridTrack::Px(px) => taffy::TrackSizingFunction::from_length(*px),
                            style::GridTrack::Fr(fr) => taffy::TrackSizingFunction::from_flex(*fr),
                            style::GridTrack::Auto => taffy::TrackSizingFunction::from_flex(1.0),
                        })
                        .collect()
                };
            }
            style::Display::Block
            | style::Display::ListItem
            | style::Display::TableRow
            | style::Display::TableCell
            | style::Display::InlineBlock => {
                // Use flex column for block-level elements (vertical stacking)
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Column;
            }
            style::Display::Inline => {
                ts.display = taffy::Display::Flex;
                ts.flex_direction = taffy::FlexDirection::Row;
                ts.flex_wrap = taffy::FlexWrap::Wrap;
            }
            style::Display::None => {
                ts.display = taffy::Display::None;
            }
        }

        // Sizing
        ts.size = Size {
            width: self.dim_to_taffy(s.width),
            height: self.dim_to_taffy(s.height),
        };
        // Allow flex/shrink items to compress below their natural content size
        ts.min_size = Size {
            width: if s.flex_shrink > 0.0 || s.flex_grow > 0.0 {
                taffy::Dimension::Length(0.0)
            } else {
                self.dim_to_taffy(s.min_width)
            },
            height: self.dim_to_taffy(s.min_height),
        };
        ts.max_size = Size {
            width: self.dim_to_taffy(s.max_width),
            height: taffy::Dimension::Auto,
        };

        // Gap
        ts.gap = Size {
            width: LengthPercentage::Length(s.gap),
            height: LengthPercentage::Length(s.gap),
        };

        ts
    }

    fn dim_to_taffy(&self, d: style::Dimension) -> taffy::Dimension {
        match d {
            style::Dimension::Auto => taffy::Dimension::Auto,
            style::Dimension::Px(v) => taffy::Dimension::Length(v),
            style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
        }
    }

    /// Extract positioned boxes after layout computation.
    fn extract(
        &self,
        node: NodeId,
        offset_x: f32,
        offset_y: f32,
    ) -> Result<PositionedBox, MeasureError> {
        let layout = self.taffy.layout(node)?;
        let style = self.node_styles.get(&node).cloned().unwrap_or_default();
        let content = self
            .node_content
            .get(&node)
            .cloned()
            .unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;
        let (width, height) = (layout.size.width, layout.size.height);

        let children = self
            .taffy
            .children(node)?
            .iter()
            .map(|&child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PositionedBox {
            x,
            y,
            width,
            height,
            page_break_before: style.page_break_before,
            page_break_after: style.page_break_after,
            page_break_inside_avoid: style.page_break_inside_avoid,
            marker: self.node_markers.get(&node).cloned(),
            style,
            content,
            children,
        })
    }
}

// ---------------------------------------------------------------------------
// Image intrinsic-size helper
// ---------------------------------------------------------------------------

/// Decode a base64 data URI into raw bytes.
pub fn decode_data_uri(src: &str) -> Option<Vec<u8>> {
    use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

    if !src.starts_with("data:") || !src.contains(";base64,") {
        return None;
    }
    let comma = src.find(',')?;
    BASE64_STD.decode(src[comma + 1..].trim()).ok()
}

/// Attempt to decode a base64 data-URI image and return a cloned
/// [`ComputedStyle`] with any `Auto` width/height replaced by concrete pixel
/// values derived from the image's intrinsic dimensions.
///
/// Returns `None` when the src is not a parseable base64 data URI, when image
/// decoding fails, or when both dimensions are already specified.
fn resolve_img_auto_dimensions(
    src: &str,
    style: &ComputedStyle,
    parent_width: f32,
) -> Option<ComputedStyle> {
    let bytes = decode_data_uri(src)?;
    let img = ::image::load_from_memory(&bytes).ok()?;
    let (px_w, px_h) = (img.width() as f32, img.height() as f32);
    if px_w == 0.0 || px_h == 0.0 {
        return None;
    }
    let aspect = px_w / px_h;

    let known_w: Option<f32> = match style.width {
        style::Dimension::Px(v) => Some(v),
        style::Dimension::Percent(p) => Some(parent_width * p / 100.0),
        style::Dimension::Auto => None,
    };
    let known_h: Option<f32> = match style.height {
        style::Dimension::Px(v) => Some(v),
        _ => None,
    };

    let mut s = style.clone();
    match (known_w, known_h) {
        // Width known → derive height from aspect ratio.
        (Some(w), None) => s.height = style::Dimension::Px((w / aspect).max(1.0)),
        // Height known → derive width from aspect ratio.
        (None, Some(h)) => s.width = style::Dimension::Px((h * aspect).max(1.0)),
        // Both Auto → intrinsic size, scaled down to fit the container.
        (None, None) => {
            let w = px_w.min(parent_width.max(1.0));
            s.width = style::Dimension::Px(w);
            s.height = style::Dimension::Px((w / aspect).max(1.0));
        }
        // Both already resolved — nothing to fix.
        (Some(_), Some(_)) => return None,
    }
    Some(s)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out a styled tree at `content_width`.
///
/// Returns a synthetic root box at the origin whose children are the
/// top-level boxes, in document order; the root's height is the total
/// content height.
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    content_width: f32,
    fonts: &FontManager,
) -> Result<PositionedBox, MeasureError> {
    let mut builder = LayoutBuilder::new(fonts);

    // Wrap all nodes in a root flex-column container
    let mut child_ids = Vec::new();
    for node in styled_nodes {
        if let Some(id) = builder.build_node(node, content_width, false)? {
            child_ids.push(id);
        }
    }

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: taffy::Dimension::Length(content_width),
            height: taffy::Dimension::Auto,
        },
        ..Default::default()
    };

    let root = builder.taffy.new_with_children(root_style, &child_ids)?;

    builder.taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(content_width),
            height: AvailableSpace::MaxContent,
        },
    )?;

    builder.extract(root, 0.0, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::style::build_styled_tree;

    fn layout(html: &str, width: f32) -> PositionedBox {
        let dom = parse_html(html);
        let styled = build_styled_tree(&dom, None);
        compute_layout(&styled, width, &FontManager::default()).unwrap()
    }

    #[test]
    fn layout_simple_paragraph() {
        let root = layout("<p>Hello world</p>", 515.0);
        assert_eq!(root.children.len(), 1);
        let first = &root.children[0];
        assert!(first.width > 0.0, "Box should have width");
        assert!(first.height > 0.0, "Box should have height");
        assert_eq!(first.x, 0.0);
    }

    #[test]
    fn paragraphs_stack_with_margins() {
        let root = layout("<p>One</p><p>Two</p>", 400.0);
        assert_eq!(root.children.len(), 2);
        let (a, b) = (&root.children[0], &root.children[1]);
        assert!(b.y >= a.y + a.height);
        let total: f32 = root.children.iter().map(|c| c.outer_height()).sum();
        assert!((root.height - total).abs() < 0.5);
    }

    #[test]
    fn long_text_wraps_to_more_lines() {
        let short = layout("<p>word</p>", 200.0);
        let long = layout(&format!("<p>{}</p>", "word ".repeat(60)), 200.0);
        assert!(long.children[0].height > short.children[0].height * 3.0);
    }

    #[test]
    fn inline_runs_keep_their_weight() {
        let root = layout("<p><strong>Acme</strong> Engineer</p>", 400.0);
        let BoxContent::Text { lines, .. } = &root.children[0].content else {
            panic!("expected text");
        };
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].runs.len(), 2);
        assert!(lines[0].runs[0].bold);
        assert_eq!(lines[0].runs[1].text, " Engineer");
    }

    #[test]
    fn list_items_get_markers() {
        let root = layout("<ol><li>a</li><li>b</li></ol>", 400.0);
        let ol = &root.children[0];
        assert_eq!(ol.children[1].marker.as_deref(), Some("2."));
    }

    #[test]
    fn preformatted_text_keeps_lines() {
        let root = layout("<pre>a\nb\nc</pre>", 400.0);
        let BoxContent::Text { lines, .. } = &root.children[0].content else {
            panic!("expected text");
        };
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn layout_flex_row() {
        let html = r#"<div style="display: flex"><div style="flex: 1">A</div><div style="flex: 1">B</div></div>"#;
        let root = layout(html, 400.0);
        let row = &root.children[0];
        assert_eq!(row.children.len(), 2);
        assert!(row.children[1].x > row.children[0].x);
    }
}
