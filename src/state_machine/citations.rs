//! Source normalization and citation marker alignment

use super::state::SearchResult;
use crate::search::SearchHit;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Results with less trimmed content than this are discarded
pub const MIN_CONTENT_CHARS: usize = 50;

static MARKER: OnceLock<Regex> = OnceLock::new();

fn marker_regex() -> &'static Regex {
    MARKER.get_or_init(|| Regex::new(r"\[(\d+)\]").unwrap())
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Normalize raw provider results into citation-ordered sources.
///
/// `url` falls back to `source` and `content` to `snippet`. Results without
/// a URL or with too little content are dropped, so every kept entry can be
/// cited by position.
pub fn normalize_hits(hits: &[SearchHit]) -> Vec<SearchResult> {
    hits.iter()
        .filter_map(|hit| {
            let url = non_blank(hit.url.as_ref()).or_else(|| non_blank(hit.source.as_ref()))?;
            let content = non_blank(hit.content.as_ref()).or_else(|| non_blank(hit.snippet.as_ref()))?;
            if content.chars().count() < MIN_CONTENT_CHARS {
                return None;
            }
            Some(SearchResult {
                url: url.to_string(),
                title: hit.title.as_deref().map(str::trim).unwrap_or_default().to_string(),
                content: content.to_string(),
            })
        })
        .collect()
}

/// The single static source used when search yields nothing usable
pub fn fallback_source() -> SearchResult {
    SearchResult {
        url: "https://www.healthline.com".to_string(),
        title: "Health Information".to_string(),
        content: "General health information and resources. Please try rephrasing your question for more specific results."
            .to_string(),
    }
}

/// Citation URLs in marker order: `citations[i]` backs `[i+1]`
pub fn citations_for(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| r.url.clone()).collect()
}

/// Every `[n]` marker number in `text`, in order of appearance
pub fn citation_markers(text: &str) -> Vec<usize> {
    marker_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Remove markers that do not point at a citation (`n` outside `1..=count`)
pub fn strip_unaligned_markers(text: &str, count: usize) -> String {
    // Removing "[5]" from "[[5]7]" splices a new marker, so repeat until stable
    let mut current = strip_pass(text, count);
    loop {
        let next = strip_pass(&current, count);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_pass(text: &str, count: usize) -> String {
    marker_regex()
        .replace_all(text, |caps: &Captures| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            match caps.get(1).and_then(|n| n.as_str().parse::<usize>().ok()) {
                Some(n) if (1..=count).contains(&n) => whole.to_string(),
                _ => String::new(),
            }
        })
        .into_owned()
}
