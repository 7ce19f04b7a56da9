use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::locator::MatchResult;
use crate::surface::TextLayer;

/// Byte range into a page's joined text that should be drawn highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
}

/// Case-insensitive literal pattern for `span`. Pattern syntax in the span is
/// escaped, so `C++ (1998)` matches exactly that text.
pub fn literal_pattern(span: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&regex::escape(span))
        .case_insensitive(true)
        .build()
}

/// Every non-overlapping occurrence of `span` in `text`.
pub fn find_ranges(text: &str, span: &str) -> Vec<HighlightRange> {
    if span.is_empty() {
        return Vec::new();
    }
    match literal_pattern(span) {
        Ok(pattern) => pattern
            .find_iter(text)
            .map(|found| HighlightRange {
                start: found.start(),
                end: found.end(),
            })
            .collect(),
        Err(err) => {
            warn!(%err, "unable to build highlight pattern");
            Vec::new()
        }
    }
}

/// Marks a located span on the text layer of the rendered page.
#[derive(Debug, Default, Clone, Copy)]
pub struct HighlightInjector;

impl HighlightInjector {
    pub fn new() -> Self {
        Self
    }

    /// Returns the number of highlighted occurrences. Finding nothing, or a
    /// layer that shows some other page, leaves the layer untouched.
    pub fn inject(&self, layer: &mut TextLayer, matched: &MatchResult) -> usize {
        if layer.page() != Some(matched.page_number) {
            debug!(
                expected = matched.page_number,
                shown = ?layer.page(),
                "text layer shows another page; skipping highlight"
            );
            return 0;
        }

        let ranges = find_ranges(layer.text(), &matched.matched_span);
        if ranges.is_empty() {
            debug!(page = matched.page_number, "matched span not present on text layer");
            return 0;
        }

        let count = ranges.len();
        layer.set_highlights(ranges);
        count
    }
}
