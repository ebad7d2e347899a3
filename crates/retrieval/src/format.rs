//! Rendering search hits as prompt text.

use ankigen_core::SearchResult;

/// Appended when an auxiliary search result is cut short.
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Labelled blocks, one per hit, separated by a blank line:
///
/// ```text
/// Title: ...
/// URL: ...
/// Text: ...
/// ```
///
/// Empty fields are omitted, and hits with neither title nor text are
/// skipped.
pub fn format_results(results: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().filter(|r| has_body(r)).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if !r.title.is_empty() {
            out.push_str(&format!("Title: {}\n", r.title));
        }
        if !r.url.is_empty() {
            out.push_str(&format!("URL: {}\n", r.url));
        }
        if !r.text.is_empty() {
            out.push_str(&format!("Text: {}\n", r.text));
        }
    }
    out
}

/// Markdown sections (`## title` then text) used by direct retrieval.
pub fn format_markdown(results: &[SearchResult]) -> String {
    results
        .iter()
        .filter(|r| has_body(r))
        .map(|r| format!("## {}\n{}\n\n", r.title, r.text))
        .collect()
}

/// A hit with neither title nor text carries nothing worth showing.
fn has_body(r: &SearchResult) -> bool {
    !r.title.trim().is_empty() || !r.text.trim().is_empty()
}

/// Keep at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_format_skips_empty_fields() {
        let results = vec![
            SearchResult::new("Docker", "https://docker.com", "Containers."),
            SearchResult::new("", "https://example.com", "No title."),
        ];
        assert_eq!(
            format_results(&results),
            "Title: Docker\nURL: https://docker.com\nText: Containers.\n\nURL: https://example.com\nText: No title.\n"
        );
    }

    #[test]
    fn markdown_format() {
        let results = vec![SearchResult::new("Layers", "u", "Images are layered.")];
        assert_eq!(format_markdown(&results), "## Layers\nImages are layered.\n\n");
        assert_eq!(format_markdown(&[]), "");
    }

    #[test]
    fn hits_without_title_or_text_are_skipped() {
        let results = vec![
            SearchResult::new("", "https://blank.example", "  "),
            SearchResult::new("Layers", "u", "Images are layered."),
        ];
        assert_eq!(format_markdown(&results), "## Layers\nImages are layered.\n\n");
        assert_eq!(format_results(&results), "Title: Layers\nURL: u\nText: Images are layered.\n");
        assert_eq!(format_markdown(&results[..1]), "");
        assert_eq!(format_results(&results[..1]), "");
    }

    #[test]
    fn truncation_marks_the_cut() {
        assert_eq!(truncate_chars("abcdef", 3), "abc\n[truncated]");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé\n[truncated]");
    }
}
