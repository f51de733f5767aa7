//! Favorites: value type, durable store seam, and the deduplicating in-memory list.

use serde::{Deserialize, Serialize};

/// A favorite passage. Equality is structural on all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Favorite {
    pub book: String,
    pub chapter: u16,
    pub range: String,
}

impl Favorite {
    pub fn new(book: impl Into<String>, chapter: u16, range: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            chapter,
            range: range.into(),
        }
    }
}

impl std::fmt::Display for Favorite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.range)
    }
}

/// Durable storage for the favorites list. Implemented by the host.
pub trait FavoriteStore {
    /// Load the stored list. A missing or unreadable record is an empty list, not an error.
    fn load(&self) -> Result<Vec<Favorite>, StoreError>;
    /// Replace the stored list.
    fn save(&mut self, favorites: &[Favorite]) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(String),
}

/// In-memory store. Counts saves so callers can check persistence happened.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    favorites: Vec<Favorite>,
    saves: usize,
}

impl MemoryStore {
    pub fn with_favorites(favorites: Vec<Favorite>) -> Self {
        Self { favorites, saves: 0 }
    }

    pub fn saved(&self) -> &[Favorite] {
        &self.favorites
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl FavoriteStore for MemoryStore {
    fn load(&self) -> Result<Vec<Favorite>, StoreError> {
        Ok(self.favorites.clone())
    }

    fn save(&mut self, favorites: &[Favorite]) -> Result<(), StoreError> {
        self.favorites = favorites.to_vec();
        self.saves += 1;
        Ok(())
    }
}

/// Ordered, duplicate-free favorites backed by a [`FavoriteStore`].
/// Every successful `add`/`remove` saves the full list.
pub struct FavoriteList<S> {
    favorites: Vec<Favorite>,
    store: S,
}

impl<S: FavoriteStore> FavoriteList<S> {
    /// Create the list and load it from `store`.
    pub fn new(store: S) -> Self {
        let mut list = Self {
            favorites: Vec::new(),
            store,
        };
        list.reload();
        list
    }

    pub fn len(&self) -> usize {
        self.favorites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Favorite> {
        self.favorites.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Favorite> {
        self.favorites.iter()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn contains(&self, candidate: &Favorite) -> bool {
        self.favorites.iter().any(|f| f == candidate)
    }

    /// Append `candidate` unless an equal favorite exists. Returns true if it was added.
    pub fn add(&mut self, candidate: Favorite) -> bool {
        if !self.insert(candidate) {
            return false;
        }
        self.persist();
        true
    }

    /// Remove the first favorite equal to `candidate`. Returns true only if one was removed.
    pub fn remove(&mut self, candidate: &Favorite) -> bool {
        let Some(pos) = self.favorites.iter().position(|f| f == candidate) else {
            return false;
        };
        self.favorites.remove(pos);
        self.persist();
        true
    }

    /// Replace in-memory contents with the stored list, coalescing duplicates.
    pub fn reload(&mut self) {
        self.favorites.clear();
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load favorites, starting empty");
                Vec::new()
            }
        };
        for favorite in stored {
            self.insert(favorite);
        }
    }

    fn insert(&mut self, candidate: Favorite) -> bool {
        if self.contains(&candidate) {
            return false;
        }
        self.favorites.push(candidate);
        true
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&self.favorites) {
            tracing::warn!(error = %e, count = self.favorites.len(), "failed to save favorites");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psalm() -> Favorite {
        Favorite::new("Psalms", 23, "1-6")
    }

    #[test]
    fn add_then_contains() {
        let mut list = FavoriteList::new(MemoryStore::default());
        assert!(!list.contains(&psalm()));
        assert!(list.add(psalm()));
        assert!(list.contains(&psalm()));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn add_duplicate_is_noop() {
        let mut list = FavoriteList::new(MemoryStore::default());
        assert!(list.add(psalm()));
        assert!(!list.add(psalm()));
        assert_eq!(list.len(), 1);
        assert_eq!(list.store().save_count(), 1);
    }

    #[test]
    fn equality_uses_all_fields() {
        let mut list = FavoriteList::new(MemoryStore::default());
        list.add(psalm());
        assert!(!list.contains(&Favorite::new("Psalms", 23, "1-5")));
        assert!(!list.contains(&Favorite::new("Psalms", 24, "1-6")));
        assert!(!list.contains(&Favorite::new("Proverbs", 23, "1-6")));
    }

    #[test]
    fn remove_present_and_absent() {
        let mut list = FavoriteList::new(MemoryStore::default());
        list.add(psalm());
        list.add(Favorite::new("John", 3, "16-16"));

        assert!(!list.remove(&Favorite::new("John", 3, "1-15")));
        assert_eq!(list.len(), 2);

        assert!(list.remove(&psalm()));
        assert_eq!(list.len(), 1);
        assert!(!list.contains(&psalm()));
        assert_eq!(list.store().saved(), &[Favorite::new("John", 3, "16-16")]);
    }

    #[test]
    fn insertion_order_preserved() {
        let mut list = FavoriteList::new(MemoryStore::default());
        list.add(Favorite::new("Genesis", 1, "1-15"));
        list.add(Favorite::new("Exodus", 20, "1-15"));
        list.add(Favorite::new("Acts", 2, "31-45"));
        let books: Vec<&str> = list.iter().map(|f| f.book.as_str()).collect();
        assert_eq!(books, vec!["Genesis", "Exodus", "Acts"]);
    }

    #[test]
    fn reload_coalesces_duplicates_without_saving() {
        let store = MemoryStore::with_favorites(vec![psalm(), psalm(), Favorite::new("Jude", 1, "1-15")]);
        let list = FavoriteList::new(store);
        assert_eq!(list.len(), 2);
        assert_eq!(list.store().save_count(), 0);
    }

    struct FailingStore;

    impl FavoriteStore for FailingStore {
        fn load(&self) -> Result<Vec<Favorite>, StoreError> {
            Err(StoreError::Encode("corrupt".into()))
        }

        fn save(&mut self, _favorites: &[Favorite]) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn store_failures_do_not_break_the_list() {
        let mut list = FavoriteList::new(FailingStore);
        assert!(list.is_empty());
        assert!(list.add(psalm()));
        assert!(list.contains(&psalm()));
        assert!(list.remove(&psalm()));
    }
}
