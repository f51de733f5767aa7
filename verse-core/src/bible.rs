//! Canonical book list: names and chapter counts for both testaments.

/// One book of the canon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookInfo {
    pub name: &'static str,
    pub chapters: u16,
}

impl BookInfo {
    const fn new(name: &'static str, chapters: u16) -> Self {
        Self { name, chapters }
    }
}

pub const OLD_TESTAMENT: &[BookInfo] = &[
    BookInfo::new("Genesis", 50),
    BookInfo::new("Exodus", 40),
    BookInfo::new("Leviticus", 27),
    BookInfo::new("Numbers", 36),
    BookInfo::new("Deuteronomy", 34),
    BookInfo::new("Joshua", 24),
    BookInfo::new("Judges", 21),
    BookInfo::new("Ruth", 4),
    BookInfo::new("1 Samuel", 31),
    BookInfo::new("2 Samuel", 24),
    BookInfo::new("1 Kings", 22),
    BookInfo::new("2 Kings", 25),
    BookInfo::new("1 Chronicles", 29),
    BookInfo::new("2 Chronicles", 36),
    BookInfo::new("Ezra", 10),
    BookInfo::new("Nehemiah", 13),
    BookInfo::new("Esther", 10),
    BookInfo::new("Job", 42),
    BookInfo::new("Psalms", 150),
    BookInfo::new("Proverbs", 31),
    BookInfo::new("Ecclesiastes", 12),
    BookInfo::new("Song of Solomon", 8),
    BookInfo::new("Isaiah", 66),
    BookInfo::new("Jeremiah", 52),
    BookInfo::new("Lamentations", 5),
    BookInfo::new("Ezekiel", 48),
    BookInfo::new("Daniel", 12),
    BookInfo::new("Hosea", 14),
    BookInfo::new("Joel", 3),
    BookInfo::new("Amos", 9),
    BookInfo::new("Obadiah", 1),
    BookInfo::new("Jonah", 4),
    BookInfo::new("Micah", 7),
    BookInfo::new("Nahum", 3),
    BookInfo::new("Habakkuk", 3),
    BookInfo::new("Zephaniah", 3),
    BookInfo::new("Haggai", 2),
    BookInfo::new("Zechariah", 14),
    BookInfo::new("Malachi", 4),
];

pub const NEW_TESTAMENT: &[BookInfo] = &[
    BookInfo::new("Matthew", 28),
    BookInfo::new("Mark", 16),
    BookInfo::new("Luke", 24),
    BookInfo::new("John", 21),
    BookInfo::new("Acts", 28),
    BookInfo::new("Romans", 16),
    BookInfo::new("1 Corinthians", 16),
    BookInfo::new("2 Corinthians", 13),
    BookInfo::new("Galatians", 6),
    BookInfo::new("Ephesians", 6),
    BookInfo::new("Philippians", 4),
    BookInfo::new("Colossians", 4),
    BookInfo::new("1 Thessalonians", 5),
    BookInfo::new("2 Thessalonians", 3),
    BookInfo::new("1 Timothy", 6),
    BookInfo::new("2 Timothy", 4),
    BookInfo::new("Titus", 3),
    BookInfo::new("Philemon", 1),
    BookInfo::new("Hebrews", 13),
    BookInfo::new("James", 5),
    BookInfo::new("1 Peter", 5),
    BookInfo::new("2 Peter", 3),
    BookInfo::new("1 John", 5),
    BookInfo::new("2 John", 1),
    BookInfo::new("3 John", 1),
    BookInfo::new("Jude", 1),
    BookInfo::new("Revelation", 22),
];

/// Books for testament 0 (old) or 1 (new).
pub fn books_for_testament(testament: u8) -> Option<&'static [BookInfo]> {
    match testament {
        0 => Some(OLD_TESTAMENT),
        1 => Some(NEW_TESTAMENT),
        _ => None,
    }
}

/// Look up a book by exact name in either testament.
pub fn find_book(name: &str) -> Option<&'static BookInfo> {
    OLD_TESTAMENT
        .iter()
        .chain(NEW_TESTAMENT.iter())
        .find(|b| b.name == name)
}
