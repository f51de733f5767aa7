//! Verse content: fetch results, viewer text assembly, and the chapter cache.

use std::collections::{HashMap, VecDeque};

use crate::chunk::VerseRange;
use crate::protocol::{ControlSignal, ErrorClass};

/// Default number of chapters kept in [`VerseCache`].
pub const DEFAULT_CACHE_CHAPTERS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub number: u32,
    pub text: String,
}

impl Verse {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Why a verse source could not deliver a chapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FetchError::Timeout => ErrorClass::Timeout,
            FetchError::Connect(_) => ErrorClass::Connection,
            FetchError::Status(_) | FetchError::InvalidResponse(_) => ErrorClass::BadResponse,
        }
    }

    /// Error packet body shown on the device.
    pub fn to_signal(&self) -> ControlSignal {
        let message = match self.class() {
            ErrorClass::Timeout => "Error: Request timed out!",
            ErrorClass::Connection => "Error: Failed to connect!",
            _ => "Error: Invalid response!",
        };
        ControlSignal::error(self.class(), message)
    }
}

/// Render every verse inside `range` as `"<n>) <text> "`, in source order.
pub fn viewer_text(verses: &[Verse], range: VerseRange) -> String {
    let mut out = String::new();
    for verse in verses.iter().filter(|v| range.contains(v.number)) {
        out.push_str(&verse.number.to_string());
        out.push_str(") ");
        out.push_str(&verse.text);
        out.push(' ');
    }
    out
}

/// Fetched chapters keyed by (book, chapter). Evicts the oldest entry past capacity.
pub struct VerseCache {
    capacity: usize,
    chapters: HashMap<(String, u16), Vec<Verse>>,
    order: VecDeque<(String, u16)>,
}

impl VerseCache {
    /// Capacity 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            chapters: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, book: &str, chapter: u16) -> Option<&[Verse]> {
        self.chapters
            .get(&(book.to_string(), chapter))
            .map(Vec::as_slice)
    }

    pub fn insert(&mut self, book: &str, chapter: u16, verses: Vec<Verse>) {
        if self.capacity == 0 {
            return;
        }
        let key = (book.to_string(), chapter);
        if self.chapters.insert(key.clone(), verses).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.chapters.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

impl Default for VerseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CHAPTERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter() -> Vec<Verse> {
        vec![
            Verse::new(1, "Blessed is the man"),
            Verse::new(2, "But his delight"),
            Verse::new(3, "And he shall be like a tree"),
        ]
    }

    #[test]
    fn viewer_text_filters_and_formats() {
        let text = viewer_text(&chapter(), VerseRange { start: 2, end: 3 });
        assert_eq!(text, "2) But his delight 3) And he shall be like a tree ");
    }

    #[test]
    fn viewer_text_outside_range_is_empty() {
        assert_eq!(viewer_text(&chapter(), VerseRange { start: 10, end: 12 }), "");
    }

    #[test]
    fn fetch_error_signals() {
        assert_eq!(
            FetchError::Timeout.to_signal(),
            ControlSignal::error(ErrorClass::Timeout, "Error: Request timed out!")
        );
        assert_eq!(
            FetchError::Connect("refused".into()).to_signal(),
            ControlSignal::error(ErrorClass::Connection, "Error: Failed to connect!")
        );
        assert_eq!(FetchError::Status(503).class(), ErrorClass::BadResponse);
    }

    #[test]
    fn cache_evicts_oldest() {
        let mut cache = VerseCache::new(2);
        cache.insert("Psalms", 1, chapter());
        cache.insert("Psalms", 2, chapter());
        cache.insert("Psalms", 1, chapter());
        assert_eq!(cache.len(), 2);
        cache.insert("Psalms", 3, chapter());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("Psalms", 1).is_none());
        assert!(cache.get("Psalms", 3).is_some());
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let mut cache = VerseCache::new(0);
        cache.insert("Psalms", 1, chapter());
        assert!(cache.is_empty());
    }
}
