//! Chunker: split verse counts into range batches and text into bounded packets.

use std::fmt;
use std::str::FromStr;

/// Default viewer packet length in characters.
pub const DEFAULT_PACKET_LENGTH: usize = 80;

/// Default number of verses per batch.
pub const DEFAULT_VERSE_BATCH: u32 = 15;

/// Inclusive, 1-based verse range. Renders as `"<start>-<end>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerseRange {
    pub start: u32,
    pub end: u32,
}

impl VerseRange {
    pub fn contains(&self, verse: u32) -> bool {
        verse >= self.start && verse <= self.end
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid verse range {0:?}")]
pub struct RangeParseError(pub String);

impl FromStr for VerseRange {
    type Err = RangeParseError;

    /// Accepts `"a-b"` and a bare `"a"` (single verse).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || RangeParseError(s.to_string());
        let (start, end) = match s.trim().split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (s.trim(), s.trim()),
        };
        let start: u32 = start.parse().map_err(|_| err())?;
        let end: u32 = end.parse().map_err(|_| err())?;
        if start == 0 || end < start {
            return Err(err());
        }
        Ok(VerseRange { start, end })
    }
}

/// Split `total` verses into batches of `batch_size`. Batch `i` covers `[i*B+1, min((i+1)*B, total)]`.
/// A zero batch size falls back to the default.
pub fn batch_ranges(total: u32, batch_size: u32) -> Vec<VerseRange> {
    let size = if batch_size == 0 {
        DEFAULT_VERSE_BATCH
    } else {
        batch_size
    };
    let mut out = Vec::with_capacity(total.div_ceil(size) as usize);
    let mut start = 1u32;
    while start <= total {
        let end = start.saturating_add(size - 1).min(total);
        out.push(VerseRange { start, end });
        start = end + 1;
    }
    out
}

/// Split cleaned text into packets of at most `packet_length` characters.
/// Counts chars, not bytes, so a packet boundary never lands inside a code point.
/// Empty text yields no packets; the last packet is never padded.
pub fn split_text(text: &str, packet_length: usize) -> Vec<String> {
    let size = if packet_length == 0 {
        DEFAULT_PACKET_LENGTH
    } else {
        packet_length
    };
    let mut out = Vec::new();
    let mut chars = text.chars().peekable();
    while chars.peek().is_some() {
        out.push(chars.by_ref().take(size).collect());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isaiah_batches() {
        let names: Vec<String> = batch_ranges(66, 15).iter().map(|r| r.to_string()).collect();
        assert_eq!(names, vec!["1-15", "16-30", "31-45", "46-60", "61-66"]);
    }

    #[test]
    fn batches_are_contiguous_and_cover_everything() {
        for total in 0..=80u32 {
            for size in 1..=20u32 {
                let batches = batch_ranges(total, size);
                assert_eq!(batches.len() as u32, total.div_ceil(size));
                if total == 0 {
                    assert!(batches.is_empty());
                    continue;
                }
                assert_eq!(batches[0].start, 1);
                assert_eq!(batches.last().unwrap().end, total);
                for pair in batches.windows(2) {
                    assert_eq!(pair[1].start, pair[0].end + 1);
                }
            }
        }
    }

    #[test]
    fn zero_batch_size_uses_default() {
        assert_eq!(batch_ranges(31, 0).len(), 3);
    }

    #[test]
    fn split_exact_multiple() {
        let packets = split_text("Love is patient. Love is kind.", 10);
        assert_eq!(packets, vec!["Love is pa", "tient. Lov", "e is kind."]);
    }

    #[test]
    fn split_short_last_packet() {
        let packets = split_text("Love is patient. Love is kind.", 12);
        assert_eq!(packets, vec!["Love is pati", "ent. Love is", " kind."]);
        assert_eq!(packets.last().unwrap().len(), 6);
    }

    #[test]
    fn split_empty_text() {
        assert!(split_text("", 80).is_empty());
    }

    #[test]
    fn split_concatenates_back() {
        let text = "1) Blessed are the poor in spirit: for theirs is the kingdom of heaven. ";
        for size in 1..=text.len() + 1 {
            let packets = split_text(text, size);
            assert_eq!(packets.len(), text.chars().count().div_ceil(size));
            assert_eq!(packets.concat(), text);
        }
    }

    #[test]
    fn split_counts_chars_not_bytes() {
        let packets = split_text("ÀÉÎõü", 2);
        assert_eq!(packets, vec!["ÀÉ", "Îõ", "ü"]);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(
            "16-30".parse::<VerseRange>().unwrap(),
            VerseRange { start: 16, end: 30 }
        );
        assert_eq!(
            " 4 ".parse::<VerseRange>().unwrap(),
            VerseRange { start: 4, end: 4 }
        );
        assert!("30-16".parse::<VerseRange>().is_err());
        assert!("0-3".parse::<VerseRange>().is_err());
        assert!("a-b".parse::<VerseRange>().is_err());
        assert!("".parse::<VerseRange>().is_err());
    }
}
