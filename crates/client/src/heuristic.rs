//! Heuristic chapter extraction for pages without a working script.
//!
//! A deliberately simple fallback: scan rendered markup for anchors whose
//! visible text looks like a chapter reference. It trades precision for
//! predictability and never fails outright.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// A chapter in an extraction job.
///
/// Never persisted; lives only for the duration of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub url: Url,
    pub selected: bool,
}

/// Synthetic chapter title used when no chapter links are found.
pub const FULL_PAGE_TITLE: &str = "Full Page Content";

/// Anchor text marking a chapter-ish link: "chapter", "ep<digits>",
/// or "ch.<digits>", case-insensitive.
fn chapter_indicator() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)chapter|ep\d+|ch\.\d+").expect("invalid pattern"))
}

/// Scan rendered markup for chapter-looking links.
///
/// Matching anchors are kept in document order with their hrefs resolved
/// against `base_url`; unresolvable hrefs are dropped. When nothing
/// matches, the page itself becomes a single synthetic chapter so a
/// conversion can always proceed. Every produced chapter is selected.
pub fn guess_chapters(html: &str, base_url: &Url) -> Vec<Chapter> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("invalid selector");

    let mut chapters = Vec::new();
    for element in document.select(&selector) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.trim();
        if text.is_empty() || !chapter_indicator().is_match(text) {
            continue;
        }

        let href = match element.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        let url = match base_url.join(href) {
            Ok(u) => u,
            Err(_) => continue,
        };

        chapters.push(Chapter { title: text.to_string(), url, selected: true });
    }

    if chapters.is_empty() {
        chapters.push(Chapter {
            title: FULL_PAGE_TITLE.to_string(),
            url: base_url.clone(),
            selected: true,
        });
    }

    chapters
}

/// Trimmed `<title>` text of a page, if present and non-empty.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").expect("invalid selector");

    let element = document.select(&selector).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.trim();
    if text.is_empty() { None } else { Some(text.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/novel/").unwrap()
    }

    #[test]
    fn test_finds_chapter_links_in_document_order() {
        let html = r#"
            <html><body>
                <a href="/c/2">Chapter 2</a>
                <a href="/about">About the author</a>
                <a href="/c/1">Chapter 1</a>
            </body></html>
        "#;

        let chapters = guess_chapters(html, &base());
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Chapter 2");
        assert_eq!(chapters[0].url.as_str(), "https://example.com/c/2");
        assert_eq!(chapters[1].title, "Chapter 1");
        assert!(chapters.iter().all(|c| c.selected));
    }

    #[test]
    fn test_relative_urls_resolved_against_base() {
        let html = r#"<a href="ch-listing/ep12">Ep12 finale</a>"#;

        let chapters = guess_chapters(html, &base());
        assert_eq!(chapters[0].url.as_str(), "https://example.com/novel/ch-listing/ep12");
    }

    #[test]
    fn test_indicator_patterns() {
        let html = r#"
            <a href="/1">Ep12</a>
            <a href="/2">Ch.3 - The Gate</a>
            <a href="/3">CHAPTER ONE</a>
            <a href="/4">Epilogue</a>
            <a href="/5">Ch. 4</a>
        "#;

        let chapters = guess_chapters(html, &base());
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Ep12", "Ch.3 - The Gate", "CHAPTER ONE"]);
    }

    #[test]
    fn test_synthetic_chapter_when_nothing_matches() {
        let html = r#"<html><body><a href="/about">About</a><p>prose</p></body></html>"#;

        let chapters = guess_chapters(html, &base());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, FULL_PAGE_TITLE);
        assert_eq!(chapters[0].url, base());
        assert!(chapters[0].selected);
    }

    #[test]
    fn test_synthetic_chapter_for_empty_document() {
        let chapters = guess_chapters("", &base());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, FULL_PAGE_TITLE);
    }

    #[test]
    fn test_anchors_with_empty_text_skipped() {
        let html = r#"<a href="/c/1"></a><a href="/c/2">   </a>"#;

        let chapters = guess_chapters(html, &base());
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, FULL_PAGE_TITLE);
    }

    #[test]
    fn test_multiline_anchor_text() {
        let html = "<a href=\"/c/9\">\n  Chapter\n  9\n</a>";

        let chapters = guess_chapters(html, &base());
        assert_eq!(chapters.len(), 1);
        assert!(chapters[0].title.contains("Chapter"));
    }

    #[test]
    fn test_page_title_extraction() {
        assert_eq!(
            page_title("<html><head><title>  My Novel  </title></head></html>").as_deref(),
            Some("My Novel")
        );
        assert!(page_title("<html><head></head><body></body></html>").is_none());
        assert!(page_title("<html><head><title>   </title></head></html>").is_none());
    }
}
