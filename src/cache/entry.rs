use serde::{Deserialize, Serialize};

/// Captured origin response body, persisted as `{"text": "..."}`.
///
/// Unknown fields are ignored when reading so older proxies can read entries
/// written by newer ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    text: String,
}

impl CacheEntry {
    pub fn new(text: impl Into<String>) -> Self {
        CacheEntry { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub(super) fn to_document(&self) -> serde_json::Result<Vec<u8>> {
        let mut document = serde_json::to_vec(self)?;
        document.push(b'\n');
        Ok(document)
    }

    pub(super) fn from_document(document: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(document)
    }
}
