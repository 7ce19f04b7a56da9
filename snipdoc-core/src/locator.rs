use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::distance::distance;
use crate::document::{page_text, DocumentHandle, PageNumber};
use crate::error::{Result, ViewerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ViewerError::EmptyQuery);
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub page_number: PageNumber,
    pub matched_span: String,
    /// Raw edit distance between the lowercased span and query.
    pub distance: usize,
}

/// Finds the word window that best approximates a query.
///
/// Pages are scanned in order and the first page that has at least one
/// window wins; distances are never compared across pages. A page whose text
/// cannot be extracted aborts the scan with [`ViewerError::Render`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SnippetLocator;

impl SnippetLocator {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, document, query), fields(query = query.text()))]
    pub async fn locate(
        &self,
        document: &dyn DocumentHandle,
        query: &SearchQuery,
    ) -> Result<Option<MatchResult>> {
        for page_number in 1..=document.page_count() {
            let items = match document.page(page_number).await {
                Ok(page) => page.text_content().await,
                Err(err) => Err(err),
            };
            let items = items.map_err(|err| {
                warn!(page = page_number, error = %format!("{err:#}"), "text extraction failed; search aborted");
                ViewerError::render(page_number, &err)
            })?;

            let text = page_text(&items);
            if let Some((matched_span, distance)) = best_window(&text, query.text()) {
                info!(page = page_number, distance, "snippet located");
                return Ok(Some(MatchResult {
                    page_number,
                    matched_span,
                    distance,
                }));
            }
            debug!(page = page_number, "page too short for query window");
        }

        info!("snippet not found");
        Ok(None)
    }
}

/// Lowest-distance run of `k` consecutive words in `page_text`, where `k` is
/// the query's word count. The earliest window wins ties.
pub fn best_window(page_text: &str, query: &str) -> Option<(String, usize)> {
    let query = query.to_lowercase();
    let window = query.split_whitespace().count();
    let words: Vec<&str> = page_text.split_whitespace().collect();
    if window == 0 || words.len() < window {
        return None;
    }

    let mut best: Option<(String, usize)> = None;
    for start in 0..=words.len() - window {
        let candidate = words[start..start + window].join(" ");
        let cost = distance(&candidate.to_lowercase(), &query);
        if best.as_ref().map_or(true, |(_, best_cost)| cost < *best_cost) {
            best = Some((candidate, cost));
        }
    }

    best.filter(|(span, _)| !span.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::document::DocumentProvider;
    use crate::testing::FakeProvider;

    async fn locate(pages: &[&[&str]], query: &str) -> Option<MatchResult> {
        let provider = FakeProvider::new().with_document("mem://doc", pages);
        let document = provider.open("mem://doc").await.unwrap();
        SnippetLocator::new()
            .locate(&*document, &SearchQuery::new(query).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn best_window_picks_lowest_distance_span() {
        let (span, cost) =
            best_window("We train Neural Networks with gradient descent", "neural networks")
                .unwrap();
        assert_eq!(span, "Neural Networks");
        assert_eq!(cost, 0);

        let (span, cost) = best_window("a nueral netwrk appears", "neural network").unwrap();
        assert_eq!(span, "nueral netwrk");
        assert_eq!(cost, 3);
    }

    #[test]
    fn best_window_keeps_the_first_of_equal_windows() {
        let (span, _) = best_window("cat hat cat", "bat").unwrap();
        assert_eq!(span, "cat");
    }

    #[test]
    fn query_longer_than_page_has_no_window() {
        assert_eq!(best_window("two words", "three whole words"), None);
        assert_eq!(best_window("", "anything"), None);
        assert_eq!(best_window("some text", "   "), None);
    }

    #[test]
    fn empty_query_is_rejected() {
        assert_eq!(SearchQuery::new(" \t"), Err(ViewerError::EmptyQuery));
    }

    #[tokio::test]
    async fn finds_the_only_page_with_the_phrase() {
        let result = locate(
            &[
                &["Intro"],
                &["Deep learning relies on", "neural networks", "trained end to end"],
                &["Summary"],
            ],
            "neural networks",
        )
        .await
        .unwrap();
        assert_eq!(result.page_number, 2);
        assert_eq!(result.matched_span, "neural networks");
        assert_eq!(result.distance, 0);
    }

    #[tokio::test]
    async fn commits_to_first_page_with_any_window() {
        // Exact match lives on page 3, yet page 1 already yields a window.
        let result = locate(
            &[
                &["support vector machines"],
                &["kernels"],
                &["neural networks"],
            ],
            "neural networks",
        )
        .await
        .unwrap();
        assert_eq!(result.page_number, 1);
        assert!(result.distance > 0);
    }

    #[tokio::test]
    async fn identical_match_on_pages_one_and_three_returns_page_one() {
        let result = locate(
            &[
                &["backpropagation through time"],
                &["unrelated"],
                &["backpropagation through time"],
            ],
            "Backpropagation through time",
        )
        .await
        .unwrap();
        assert_eq!(result.page_number, 1);
        assert_eq!(result.distance, 0);
    }

    #[tokio::test]
    async fn unreadable_page_aborts_the_scan() {
        let provider = FakeProvider::new().with_document(
            "mem://doc",
            &[&["scanned image"], &["neural networks"]],
        );
        provider.fail_text("mem://doc", 1);
        let document = provider.open("mem://doc").await.unwrap();

        let err = SnippetLocator::new()
            .locate(&*document, &SearchQuery::new("neural networks").unwrap())
            .await
            .unwrap_err();
        match err {
            ViewerError::Render { page, reason } => {
                assert_eq!(page, 1);
                assert!(reason.contains("text layer unavailable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failure_after_a_matching_page_is_never_reached() {
        let provider = FakeProvider::new().with_document(
            "mem://doc",
            &[&["neural networks"], &["broken"]],
        );
        provider.fail_text("mem://doc", 2);
        let document = provider.open("mem://doc").await.unwrap();

        let result = SnippetLocator::new()
            .locate(&*document, &SearchQuery::new("neural networks").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.page_number, 1);
    }

    #[tokio::test]
    async fn no_match_when_no_page_is_long_enough() {
        assert_eq!(locate(&[&["short"], &["page"]], "a longer query").await, None);
        assert_eq!(locate(&[], "anything").await, None);
    }
}
