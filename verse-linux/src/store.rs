//! Favorites persistence: a JSON key/value file, favorites under one key.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use verse_core::{Favorite, FavoriteStore, StoreError};

/// Key holding the favorites list.
pub const FAVORITES_KEY: &str = "favoriteList";

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Map<String, Value>>(&text) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "favorites file unreadable, treating as empty");
                Ok(Map::new())
            }
        }
    }
}

impl FavoriteStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Favorite>, StoreError> {
        let mut doc = self.read_document()?;
        let Some(value) = doc.remove(FAVORITES_KEY) else {
            return Ok(Vec::new());
        };
        match serde_json::from_value::<Vec<Favorite>>(value) {
            Ok(favorites) => Ok(favorites),
            Err(e) => {
                tracing::warn!(error = %e, "stored favorites malformed, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Rewrites the whole file via a temp file + rename; other keys are preserved.
    fn save(&mut self, favorites: &[Favorite]) -> Result<(), StoreError> {
        let mut doc = self.read_document()?;
        let value = serde_json::to_value(favorites).map_err(|e| StoreError::Encode(e.to_string()))?;
        doc.insert(FAVORITES_KEY.to_string(), value);
        let bytes =
            serde_json::to_vec_pretty(&doc).map_err(|e| StoreError::Encode(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "versebridge-store-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("favorites.json")
    }

    #[test]
    fn missing_file_is_empty() {
        let store = JsonFileStore::new(temp_path("missing"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip");
        let mut store = JsonFileStore::new(&path);
        let favorites = vec![
            Favorite::new("Psalms", 23, "1-6"),
            Favorite::new("John", 3, "16-30"),
        ];
        store.save(&favorites).unwrap();
        assert_eq!(JsonFileStore::new(&path).load().unwrap(), favorites);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn garbage_file_is_empty() {
        let path = temp_path("garbage");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStore::new(&path).load().unwrap().is_empty());

        std::fs::write(&path, r#"{"favoriteList": "oops"}"#).unwrap();
        assert!(JsonFileStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn other_keys_survive_save() {
        let path = temp_path("keys");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"lastBook": "Ruth"}"#).unwrap();
        let mut store = JsonFileStore::new(&path);
        store.save(&[Favorite::new("Ruth", 1, "1-15")]).unwrap();
        let doc: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc.get("lastBook"), Some(&Value::String("Ruth".into())));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn list_reload_coalesces_stored_duplicates() {
        let path = temp_path("dupes");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"favoriteList": [
                {"book": "Jude", "chapter": 1, "range": "1-15"},
                {"book": "Jude", "chapter": 1, "range": "1-15"}
            ]}"#,
        )
        .unwrap();
        let list = verse_core::FavoriteList::new(JsonFileStore::new(&path));
        assert_eq!(list.len(), 1);
    }
}
