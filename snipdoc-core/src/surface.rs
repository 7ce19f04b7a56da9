use std::ops::Range;

use crate::document::{page_text, NormalizedRect, PageNumber, RenderImage, TextItem, Viewport};
use crate::highlight::HighlightRange;

/// A fully painted page.
#[derive(Debug, Clone)]
pub struct Frame {
    pub page: PageNumber,
    pub task_id: u64,
    pub viewport: Viewport,
    pub image: RenderImage,
}

/// The drawing surface. Only [`crate::RenderPipeline`] paints it.
#[derive(Debug, Default)]
pub struct Surface {
    frame: Option<Frame>,
    commits: u64,
}

impl Surface {
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Number of frames ever painted onto this surface.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub(crate) fn paint(&mut self, frame: Frame) {
        self.frame = Some(frame);
        self.commits += 1;
    }

    pub(crate) fn blank(&mut self) {
        self.frame = None;
    }
}

/// Text content of the page currently on the surface, plus highlight markers.
///
/// Highlight ranges are byte offsets into [`TextLayer::text`], which is the
/// page's items joined by single spaces.
#[derive(Debug, Default, Clone)]
pub struct TextLayer {
    page: Option<PageNumber>,
    items: Vec<TextItem>,
    text: String,
    item_ranges: Vec<Range<usize>>,
    highlights: Vec<HighlightRange>,
}

impl TextLayer {
    pub fn page(&self) -> Option<PageNumber> {
        self.page
    }

    pub fn items(&self) -> &[TextItem] {
        &self.items
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn highlights(&self) -> &[HighlightRange] {
        &self.highlights
    }

    /// Text covered by each highlight, in order.
    pub fn highlighted_text(&self) -> Vec<&str> {
        self.highlights
            .iter()
            .filter_map(|range| self.text.get(range.start..range.end))
            .collect()
    }

    pub fn set_highlights(&mut self, highlights: Vec<HighlightRange>) {
        self.highlights = highlights;
    }

    pub fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    /// Bounds of every text item overlapping `range`.
    pub fn rects_for(&self, range: HighlightRange) -> Vec<NormalizedRect> {
        self.item_ranges
            .iter()
            .zip(&self.items)
            .filter(|(item_range, _)| item_range.start < range.end && range.start < item_range.end)
            .map(|(_, item)| item.bounds)
            .collect()
    }

    pub fn highlight_rects(&self) -> Vec<NormalizedRect> {
        self.highlights
            .iter()
            .flat_map(|range| self.rects_for(*range))
            .collect()
    }

    pub(crate) fn replace(&mut self, page: PageNumber, items: Vec<TextItem>) {
        let text = page_text(&items);
        let mut item_ranges = Vec::with_capacity(items.len());
        let mut offset = 0;
        for item in &items {
            item_ranges.push(offset..offset + item.text.len());
            offset += item.text.len() + 1;
        }

        self.page = Some(page);
        self.items = items;
        self.text = text;
        self.item_ranges = item_ranges;
        self.highlights.clear();
    }
}
