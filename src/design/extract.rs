use crate::design::DesignDocument;
use crate::error::DesignError;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const JSON_FENCE: &str = "```json";

// Non-greedy: stops at the first closing fence.
static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json[ \t]*\r?\n?(.*?)\s*```").expect("fenced json pattern is valid")
});

/// Body of the first complete ```` ```json ```` block, if any.
pub fn fenced_block(text: &str) -> Option<&str> {
    FENCED_JSON
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str())
}

/// A json fence has been opened but not yet closed, which is what a reply
/// looks like while a design is still streaming in.
pub fn has_open_fence(text: &str) -> bool {
    text.contains(JSON_FENCE) && fenced_block(text).is_none()
}

/// Conversational text that precedes the design block.
pub fn prose_before_fence(text: &str) -> &str {
    match text.find(JSON_FENCE) {
        Some(index) => text[..index].trim_end(),
        None => text,
    }
}

pub fn parse_design(raw: &str) -> Result<DesignDocument, DesignError> {
    let document: DesignDocument = serde_json::from_str(raw)?;
    validate(&document)?;
    Ok(document)
}

fn validate(document: &DesignDocument) -> Result<(), DesignError> {
    if document.pages.is_empty() {
        return Err(DesignError::Invalid("document has no pages".to_string()));
    }
    if let Some(index) = document
        .pages
        .iter()
        .position(|page| page.id.trim().is_empty())
    {
        return Err(DesignError::Invalid(format!("page {index} has an empty id")));
    }
    Ok(())
}

/// `Ok(None)` for ordinary replies without a design block.
pub fn extract_design(text: &str) -> Result<Option<DesignDocument>, DesignError> {
    let Some(raw) = fenced_block(text) else {
        return Ok(None);
    };
    parse_design(raw).map(Some)
}

/// Like [`extract_design`], but a broken block is logged and reported as no
/// design so the reply itself is still shown untouched.
pub fn find_design(text: &str) -> Option<DesignDocument> {
    match extract_design(text) {
        Ok(Some(document)) => {
            debug!(
                title = %document.title,
                pages = document.page_count(),
                "design document extracted"
            );
            Some(document)
        }
        Ok(None) => None,
        Err(err) => {
            warn!("failed to parse design JSON: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::PageLayout;

    #[test]
    fn extracts_inline_fenced_block() {
        let text = r#"Here you go ```json {"title":"T","pages":[{"id":"p1","layout":"cover","content":{"heading":"H"}}]}```"#;
        let document = extract_design(text)
            .expect("valid block should parse")
            .expect("block should be found");
        assert_eq!(document.title, "T");
        assert_eq!(document.pages.len(), 1);
        assert_eq!(document.pages[0].layout, PageLayout::Cover);
        assert_eq!(document.pages[0].content.heading.as_deref(), Some("H"));
    }

    #[test]
    fn extracts_multiline_fenced_block() {
        let text = "Intro\n```json\n{\n  \"title\": \"Book\",\n  \"pages\": [\n    {\"id\": \"p1\", \"layout\": \"content\", \"content\": {\"body\": \"b\"}}\n  ]\n}\n```\nOutro";
        let document = find_design(text).expect("design should be found");
        assert_eq!(document.title, "Book");
        assert_eq!(document.pages[0].layout, PageLayout::Content);
    }

    #[test]
    fn plain_reply_has_no_design() {
        assert!(extract_design("Just chatting, no design here.").unwrap().is_none());
        assert!(find_design("```rust\nfn main() {}\n```").is_none());
    }

    #[test]
    fn invalid_json_is_reported_without_panicking() {
        let text = "```json\n{\"title\": \"T\", \"pages\": [\n```";
        assert!(matches!(extract_design(text), Err(DesignError::Json(_))));
        assert!(find_design(text).is_none());
    }

    #[test]
    fn documents_missing_required_fields_are_rejected() {
        let missing_pages = "```json\n{\"title\": \"T\"}\n```";
        assert!(matches!(
            extract_design(missing_pages),
            Err(DesignError::Json(_))
        ));

        let empty_pages = "```json\n{\"title\": \"T\", \"pages\": []}\n```";
        assert!(matches!(
            extract_design(empty_pages),
            Err(DesignError::Invalid(_))
        ));

        let unknown_layout =
            "```json\n{\"title\": \"T\", \"pages\": [{\"id\":\"p1\",\"layout\":\"poster\"}]}\n```";
        assert!(find_design(unknown_layout).is_none());
    }

    #[test]
    fn only_the_first_block_is_considered() {
        let text = "```json\n{\"title\":\"A\",\"pages\":[{\"id\":\"1\",\"layout\":\"cover\"}]}\n```\n```json\n{\"title\":\"B\",\"pages\":[{\"id\":\"1\",\"layout\":\"cover\"}]}\n```";
        assert_eq!(find_design(text).map(|doc| doc.title), Some("A".to_string()));
    }

    #[test]
    fn open_fence_is_detected_while_streaming() {
        assert!(has_open_fence("Designing now\n```json\n{\"title\": \"T\""));
        assert!(!has_open_fence("```json\n{}\n```"));
        assert!(!has_open_fence("no fence"));
    }

    #[test]
    fn prose_stops_at_the_fence() {
        assert_eq!(prose_before_fence("Intro text\n```json\n{}\n```"), "Intro text");
        assert_eq!(prose_before_fence("plain"), "plain");
    }
}
