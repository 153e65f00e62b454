//! Short selector ids for book buttons.
//!
//! Choice tokens are length-limited, so book buttons carry a short
//! fingerprint of the filename instead of the filename itself. The index only
//! ever covers the candidates on the current screen and is rebuilt whenever
//! they change.

const ID_LEN: usize = 8;

/// Fingerprint of `filename`: the first 8 hex digits of its BLAKE3 hash.
pub fn fingerprint(filename: &str) -> String {
    let mut hex = blake3::hash(filename.as_bytes()).to_hex().to_string();
    hex.truncate(ID_LEN);
    hex
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortIdIndex {
    slots: Vec<(String, String)>,
}

impl ShortIdIndex {
    /// Replace the contents with the first `capacity` of `filenames`.
    /// Returns `(id, filename)` for every slot, in order.
    pub fn rebuild<'a>(&mut self, filenames: impl IntoIterator<Item = &'a str>, capacity: usize) -> &[(String, String)] {
        self.slots.clear();
        for filename in filenames.into_iter().take(capacity) {
            let mut id = fingerprint(filename);
            if self.resolve(&id).is_some() {
                // Collision inside one screen: fall back to the full hash.
                id = blake3::hash(filename.as_bytes()).to_hex().to_string();
                tracing::debug!(%filename, "Short id collision");
            }
            self.slots.push((id, filename.to_string()));
        }
        &self.slots
    }

    pub fn slots(&self) -> &[(String, String)] {
        &self.slots
    }

    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.slots.iter().find(|(slot, _)| slot == id).map(|(_, filename)| filename.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
