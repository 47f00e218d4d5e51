//! Content measurement – the seam between pagination and a layout engine.
//!
//! [`TaffyMeasurer`] is the built-in measurer: it parses the HTML, places it
//! inside an invisible element carrying the scope class, runs the cascade of
//! the injected scoped style sheet, and lays everything out with Taffy at the
//! content width.

use std::time::Duration;

use log::debug;

use crate::css::{Media, Stylesheet};
use crate::dom::{self, DomNode, ElementNode};
use crate::error::MeasureError;
use crate::fonts::FontManager;
use crate::layout;
use crate::style::{StyleResolver, StyledNode};

/// What to measure and how it is styled.
#[derive(Debug, Clone, Copy)]
pub struct MeasureRequest<'a> {
    pub html: &'a str,
    /// Content width in CSS px.
    pub width: f32,
    pub scope_class: &'a str,
    /// The scoped style sheet applied to the content.
    pub stylesheet: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Content,
    /// A manual page-break marker; contributes no markup and no height.
    PageBreak,
}

/// One top-level child of the content, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredBlock {
    pub index: usize,
    /// Exact outer markup of the child as it appears in the source.
    pub markup: String,
    /// Height including vertical margins, in CSS px.
    pub height: f32,
    pub kind: BlockKind,
    /// `break-before: page` on the child.
    pub break_before: bool,
    /// `break-after: page` on the child.
    pub break_after: bool,
}

impl MeasuredBlock {
    pub fn content(index: usize, markup: impl Into<String>, height: f32) -> Self {
        Self {
            index,
            markup: markup.into(),
            height,
            kind: BlockKind::Content,
            break_before: false,
            break_after: false,
        }
    }

    pub fn page_break(index: usize) -> Self {
        Self {
            index,
            markup: String::new(),
            height: 0.0,
            kind: BlockKind::PageBreak,
            break_before: false,
            break_after: false,
        }
    }

    /// Whether this block forces a page boundary somewhere.
    pub fn forces_break(&self) -> bool {
        self.kind == BlockKind::PageBreak || self.break_before || self.break_after
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub total_height: f32,
    pub blocks: Vec<MeasuredBlock>,
}

/// Measures rendered heights of content under a given style sheet.
pub trait LayoutMeasurer {
    /// Whether fonts needed for measurement are loaded.
    fn fonts_ready(&self) -> bool;

    fn measure(&self, request: &MeasureRequest<'_>) -> Result<Measurement, MeasureError>;
}

/// Bounded polling before measuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_millis(50),
        }
    }
}

impl ReadinessPolicy {
    /// No waiting at all; used where readiness is known up front.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Taffy-backed measurer
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct TaffyMeasurer {
    fonts: FontManager,
}

impl TaffyMeasurer {
    pub fn new(fonts: FontManager) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }
}

impl LayoutMeasurer for TaffyMeasurer {
    fn fonts_ready(&self) -> bool {
        // Faces are loaded synchronously before the measurer is built.
        true
    }

    fn measure(&self, request: &MeasureRequest<'_>) -> Result<Measurement, MeasureError> {
        if !request.width.is_finite() || request.width <= 0.0 {
            return Err(MeasureError::Unavailable(format!(
                "content width {} is not positive",
                request.width
            )));
        }

        let nodes = dom::parse_html(request.html);
        let top: Vec<DomNode> = nodes.iter().filter(|n| !n.is_whitespace()).cloned().collect();

        let sheet = Stylesheet::parse(request.stylesheet, Media::Screen);
        let resolver = StyleResolver::new(&sheet);
        let scope = ElementNode::synthetic_div(request.scope_class, nodes);
        let styled = resolver.build_styled_tree(&[DomNode::Element(scope)], None);
        let Some(StyledNode::Element { children, .. }) = styled.into_iter().next() else {
            return Err(MeasureError::Layout("scope element was not styled".into()));
        };
        // Whitespace-only text is the only thing styling may drop, so the
        // remaining children line up with `top`.
        let children: Vec<StyledNode> = children
            .into_iter()
            .filter(|c| !matches!(c, StyledNode::Text { text, .. } if text.trim().is_empty()))
            .collect();
        if children.len() != top.len() {
            return Err(MeasureError::Layout(format!(
                "styled {} top-level nodes but parsed {}",
                children.len(),
                top.len()
            )));
        }

        let root = layout::compute_layout(&children, request.width, &self.fonts)?;
        if root.children.len() != top.len() {
            return Err(MeasureError::Layout(format!(
                "laid out {} top-level boxes but parsed {}",
                root.children.len(),
                top.len()
            )));
        }

        let blocks = top
            .iter()
            .zip(&root.children)
            .enumerate()
            .map(|(index, (node, pbox))| {
                if node.is_page_break() {
                    return MeasuredBlock::page_break(index);
                }
                MeasuredBlock {
                    index,
                    markup: request.html[node.span()].to_string(),
                    height: pbox.outer_height(),
                    kind: BlockKind::Content,
                    break_before: pbox.page_break_before,
                    break_after: pbox.page_break_after,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "measured {} blocks, total height {:.1}px at width {:.1}px",
            blocks.len(),
            root.height,
            request.width
        );
        Ok(Measurement {
            total_height: root.height,
            blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measure(html: &str, css: &str) -> Measurement {
        TaffyMeasurer::default()
            .measure(&MeasureRequest {
                html,
                width: 600.0,
                scope_class: "s",
                stylesheet: css,
            })
            .unwrap()
    }

    #[test]
    fn blocks_follow_document_order() {
        let html = "<h1>Name</h1>\n<p>Summary</p>\n<break/>\n<p>More</p>";
        let m = measure(html, "");
        assert_eq!(m.blocks.len(), 4);
        assert_eq!(m.blocks[0].markup, "<h1>Name</h1>");
        assert_eq!(m.blocks[2].kind, BlockKind::PageBreak);
        assert_eq!(m.blocks[2].height, 0.0);
        assert_eq!(m.blocks[3].index, 3);
    }

    #[test]
    fn scoped_css_changes_heights() {
        let plain = measure("<p>x</p>", "");
        let tall = measure("<p>x</p>", ".s p { margin: 0; height: 300px }");
        assert_eq!(tall.blocks[0].height, 300.0);
        assert!(plain.blocks[0].height < 100.0);
    }

    #[test]
    fn custom_properties_resolve_through_var() {
        let css = ".s { --gap: 50px } .s p { margin: 0 0 var(--gap) 0 }";
        let m = measure("<p>x</p>", css);
        let plain = measure("<p>x</p>", ".s p { margin: 0 }");
        assert!((m.blocks[0].height - plain.blocks[0].height - 50.0).abs() < 0.01);
    }

    #[test]
    fn break_properties_are_reported() {
        let m = measure(r#"<p style="break-after: page">a</p><p>b</p>"#, "");
        assert!(m.blocks[0].break_after);
        assert!(m.blocks[0].forces_break());
        assert!(!m.blocks[1].forces_break());
    }

    #[test]
    fn zero_width_is_unavailable() {
        let err = TaffyMeasurer::default()
            .measure(&MeasureRequest {
                html: "<p>x</p>",
                width: 0.0,
                scope_class: "s",
                stylesheet: "",
            })
            .unwrap_err();
        assert!(matches!(err, MeasureError::Unavailable(_)));
    }
}
