//! Huffman-compressed post and message bodies

use anyhow::{anyhow, Context, Result};

use crate::codec::container;
use crate::data::SocialRepository;
use crate::feed::ContentRef;

/// Compresses bodies on the way into a repository and restores them on the way out
pub struct ContentStore<R> {
    repo: R,
}

impl<R: SocialRepository> ContentStore<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn into_inner(self) -> R {
        self.repo
    }

    pub fn put(&mut self, key: &str, body: &[u8]) -> Result<ContentRef> {
        let blob = container::compress(body)?;
        log::debug!(
            "Stored content {}: {} bytes -> {} bytes",
            key,
            body.len(),
            blob.len()
        );
        self.repo.store_content(key, blob)?;
        Ok(ContentRef {
            key: key.to_string(),
            original_len: body.len() as u64,
        })
    }

    pub fn get(&self, content: &ContentRef) -> Result<Vec<u8>> {
        let blob = self
            .repo
            .load_content(&content.key)?
            .ok_or_else(|| anyhow!("content {} not found", content.key))?;
        let body = container::decompress(&blob)
            .with_context(|| format!("decoding content {}", content.key))?;

        if body.len() as u64 != content.original_len {
            return Err(anyhow!(
                "content {} decoded to {} bytes, expected {}",
                content.key,
                body.len(),
                content.original_len
            ));
        }
        Ok(body)
    }

    pub fn get_text(&self, content: &ContentRef) -> Result<String> {
        let body = self.get(content)?;
        String::from_utf8(body).with_context(|| format!("content {} is not utf-8", content.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryRepository;

    #[test]
    fn bodies_round_trip_through_repository() {
        let mut store = ContentStore::new(MemoryRepository::new());
        let text = "the quick brown fox jumps over the lazy dog, again and again";
        let content = store.put("post:1", text.as_bytes()).unwrap();
        assert_eq!(content.original_len, text.len() as u64);
        assert_eq!(store.get_text(&content).unwrap(), text);

        let empty = store.put("post:2", b"").unwrap();
        assert!(store.get(&empty).unwrap().is_empty());
        assert_eq!(store.repository().content_len(), 2);
    }

    #[test]
    fn missing_or_mismatched_content_fails() {
        let mut store = ContentStore::new(MemoryRepository::new());
        let missing = ContentRef {
            key: "post:404".to_string(),
            original_len: 3,
        };
        assert!(store.get(&missing).is_err());

        let mut content = store.put("post:3", b"abc").unwrap();
        content.original_len = 4;
        assert!(store.get(&content).is_err());
    }
}
