//! Pagination – splits measured top-level blocks into print-accurate pages.
//!
//! Handles:
//! - Paper-size page boundaries minus margins and a print buffer
//! - Manual page-break markers (`<break>` or `.page-break`)
//! - `break-before` / `break-after: page` on top-level blocks
//! - Oversized blocks, which get a page of their own and are never split

use std::thread;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::measure::{
    BlockKind, LayoutMeasurer, MeasureRequest, MeasuredBlock, ReadinessPolicy, TaffyMeasurer,
};
use crate::scope::{ScopedStyleContext, StyleRegistry};
use crate::style_config::StyleConfig;

/// Safety margin subtracted from the usable height so that rounding in the
/// print engine never pushes a page's last line onto an extra sheet.
pub const PRINT_BUFFER_PX: f32 = 10.0;

/// Page geometry in CSS px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMetrics {
    pub page_width: f32,
    pub page_height: f32,
    pub available_width: f32,
    pub available_height: f32,
}

impl PageMetrics {
    pub fn from_styles(styles: &StyleConfig) -> Self {
        let page_width = styles.paper_size.width_px();
        let page_height = styles.paper_size.height_px();
        Self {
            page_width,
            page_height,
            available_width: page_width - 2.0 * styles.margin_h,
            available_height: page_height - 2.0 * styles.margin_v - PRINT_BUFFER_PX,
        }
    }
}

/// One preview page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// 1-based, contiguous.
    pub page_number: usize,
    /// Concatenated outer markup of the blocks on this page.
    pub content: String,
    pub content_height: f32,
    pub available_height: f32,
}

impl PageRecord {
    fn single(content: &str, content_height: f32, available_height: f32) -> Self {
        Self {
            page_number: 1,
            content: content.to_string(),
            content_height,
            available_height,
        }
    }
}

/// First-fit greedy packing of blocks into pages, in document order.
///
/// A block that does not fit closes the current page unless the page is
/// empty, so an oversized block gets a page to itself. Always returns at
/// least one page.
pub fn pack_blocks(blocks: &[MeasuredBlock], available_height: f32) -> Vec<PageRecord> {
    let mut acc = PageAccumulator::new(available_height);
    for block in blocks {
        if block.kind == BlockKind::PageBreak {
            acc.close_page();
            continue;
        }
        if block.break_before {
            acc.close_page();
        }
        if acc.count > 0 && acc.height + block.height > available_height {
            acc.close_page();
        }
        acc.content.push_str(&block.markup);
        acc.height += block.height;
        acc.count += 1;
        if block.break_after {
            acc.close_page();
        }
    }
    acc.close_page();

    if acc.pages.is_empty() {
        acc.pages.push(PageRecord::single("", 0.0, available_height));
    }
    acc.pages
}

struct PageAccumulator {
    pages: Vec<PageRecord>,
    content: String,
    height: f32,
    count: usize,
    available_height: f32,
}

impl PageAccumulator {
    fn new(available_height: f32) -> Self {
        Self {
            pages: Vec::new(),
            content: String::new(),
            height: 0.0,
            count: 0,
            available_height,
        }
    }

    /// Close the current page; a page with no blocks is never emitted.
    fn close_page(&mut self) {
        if self.count == 0 {
            return;
        }
        self.pages.push(PageRecord {
            page_number: self.pages.len() + 1,
            content: std::mem::take(&mut self.content),
            content_height: self.height,
            available_height: self.available_height,
        });
        self.height = 0.0;
        self.count = 0;
    }
}

/// Splits content into pages using a [`LayoutMeasurer`] and the scoped
/// style sheets held by a [`StyleRegistry`].
pub struct Pager<M: LayoutMeasurer = TaffyMeasurer> {
    measurer: M,
    registry: StyleRegistry,
    readiness: ReadinessPolicy,
}

impl<M: LayoutMeasurer> Pager<M> {
    pub fn new(measurer: M, registry: StyleRegistry) -> Self {
        Self {
            measurer,
            registry,
            readiness: ReadinessPolicy::default(),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn measurer(&self) -> &M {
        &self.measurer
    }

    /// Split `html` into pages for the given scope.
    ///
    /// A pure function of the content, the style configuration and the
    /// injected style sheet; measurement failures degrade to a single page
    /// holding everything with `content_height == 0`.
    pub fn paginate(&self, html: &str, ctx: &ScopedStyleContext) -> Vec<PageRecord> {
        let metrics = PageMetrics::from_styles(&ctx.styles);
        if html.trim().is_empty() {
            return vec![PageRecord::single("", 0.0, metrics.available_height)];
        }

        self.wait_until_ready(&ctx.scope_class);
        let stylesheet = self
            .registry
            .get(&ctx.scope_class)
            .unwrap_or_else(|| ctx.scoped_css.clone());

        let request = MeasureRequest {
            html,
            width: metrics.available_width,
            scope_class: &ctx.scope_class,
            stylesheet: &stylesheet,
        };
        let measurement = match self.measurer.measure(&request) {
            Ok(m) => m,
            Err(e) => {
                warn!("pagination fell back to a single page: {e}");
                return vec![PageRecord::single(html, 0.0, metrics.available_height)];
            }
        };

        let forced = measurement.blocks.iter().any(MeasuredBlock::forces_break);
        let pages = if !forced && measurement.total_height <= metrics.available_height {
            vec![PageRecord::single(
                html,
                measurement.total_height,
                metrics.available_height,
            )]
        } else {
            pack_blocks(&measurement.blocks, metrics.available_height)
        };

        info!(
            "paginated {} blocks into {} page(s) (available height {:.1}px)",
            measurement.blocks.len(),
            pages.len(),
            metrics.available_height
        );
        pages
    }

    /// Poll fonts and the scope's style sheet; give up after the policy's
    /// attempts and measure best-effort.
    fn wait_until_ready(&self, scope_class: &str) {
        for attempt in 1..=self.readiness.max_attempts.max(1) {
            if self.measurer.fonts_ready() && self.registry.is_applied(scope_class) {
                if attempt > 1 {
                    debug!("styles for {scope_class} ready after {attempt} attempts");
                }
                return;
            }
            if attempt < self.readiness.max_attempts {
                thread::sleep(self.readiness.delay);
            }
        }
        warn!(
            "styles for {scope_class} not confirmed after {} attempts; measuring anyway",
            self.readiness.max_attempts
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeasureError;
    use crate::measure::Measurement;
    use crate::style_config::PaperSize;

    fn ctx() -> ScopedStyleContext {
        ScopedStyleContext::with_scope_class("pp-t".into(), &StyleConfig::default(), "")
    }

    struct Failing;

    impl LayoutMeasurer for Failing {
        fn fonts_ready(&self) -> bool {
            true
        }

        fn measure(&self, _: &MeasureRequest<'_>) -> Result<Measurement, MeasureError> {
            Err(MeasureError::Unavailable("detached".into()))
        }
    }

    #[test]
    fn available_height_formula() {
        let styles = StyleConfig {
            paper_size: PaperSize::Letter,
            margin_v: 30.0,
            ..StyleConfig::default()
        };
        let m = PageMetrics::from_styles(&styles);
        assert!((m.available_height - (1056.0 - 60.0 - PRINT_BUFFER_PX)).abs() < 0.01);
        assert!((m.available_width - (816.0 - 2.0 * styles.margin_h)).abs() < 0.01);
    }

    #[test]
    fn greedy_packing_never_splits_blocks() {
        let blocks: Vec<MeasuredBlock> = (0..5)
            .map(|i| MeasuredBlock::content(i, format!("<p>{i}</p>"), 40.0))
            .collect();
        let pages = pack_blocks(&blocks, 100.0);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].content, "<p>0</p><p>1</p>");
        assert_eq!(pages[2].content, "<p>4</p>");
        assert!(pages.iter().all(|p| p.content_height <= 100.0));
        let numbers: Vec<usize> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn oversized_block_gets_its_own_page() {
        let blocks = vec![
            MeasuredBlock::content(0, "<p>a</p>", 30.0),
            MeasuredBlock::content(1, "<table></table>", 250.0),
            MeasuredBlock::content(2, "<p>b</p>", 30.0),
        ];
        let pages = pack_blocks(&blocks, 100.0);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].content_height, 250.0);
    }

    #[test]
    fn break_markers_never_create_empty_pages() {
        let blocks = vec![
            MeasuredBlock::page_break(0),
            MeasuredBlock::content(1, "<p>a</p>", 10.0),
            MeasuredBlock::page_break(2),
            MeasuredBlock::page_break(3),
            MeasuredBlock::content(4, "<p>b</p>", 10.0),
            MeasuredBlock::page_break(5),
        ];
        let pages = pack_blocks(&blocks, 100.0);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].content, "<p>b</p>");
    }

    #[test]
    fn break_after_property_closes_the_page() {
        let mut first = MeasuredBlock::content(0, "<h1>a</h1>", 10.0);
        first.break_after = true;
        let blocks = vec![first, MeasuredBlock::content(1, "<p>b</p>", 10.0)];
        assert_eq!(pack_blocks(&blocks, 100.0).len(), 2);
    }

    #[test]
    fn empty_content_is_one_empty_page() {
        let pager = Pager::new(TaffyMeasurer::default(), StyleRegistry::new())
            .with_readiness(ReadinessPolicy::immediate());
        let pages = pager.paginate("  \n ", &ctx());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].content_height, 0.0);
        assert_eq!(pages[0].page_number, 1);
    }

    #[test]
    fn multibyte_text_after_ampersand_paginates() {
        let pager = Pager::new(TaffyMeasurer::default(), StyleRegistry::new())
            .with_readiness(ReadinessPolicy::immediate());
        let html = "<p>R&äääääää</p><p>R&D — Zürich</p>";
        let pages = pager.paginate(html, &ctx());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].content, html);
        assert!(pages[0].content_height > 0.0);
    }

    #[test]
    fn malformed_colour_in_user_css_still_paginates() {
        let ctx = ScopedStyleContext::with_scope_class(
            "pp-t".into(),
            &StyleConfig::default(),
            "p { color: #é1 }",
        );
        let registry = StyleRegistry::new();
        registry.inject(&ctx);
        let pager = Pager::new(TaffyMeasurer::default(), registry)
            .with_readiness(ReadinessPolicy::immediate());
        let pages = pager.paginate("<p>x</p>", &ctx);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].content_height > 0.0);
    }

    #[test]
    fn measurement_failure_falls_back_to_one_page() {
        let pager =
            Pager::new(Failing, StyleRegistry::new()).with_readiness(ReadinessPolicy::immediate());
        let html = "<p>a</p><break/><p>b</p>";
        let pages = pager.paginate(html, &ctx());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].content, html);
        assert_eq!(pages[0].content_height, 0.0);
    }

    #[test]
    fn page_records_serialise_camel_case() {
        let json = serde_json::to_string(&PageRecord::single("<p/>", 1.0, 2.0)).unwrap();
        assert!(json.contains("\"pageNumber\":1"));
        assert!(json.contains("\"contentHeight\":1.0"));
    }
}
