use sha2::{Digest, Sha256};

/// Generate a content hash for duplicate detection
///
/// Normalizes case, punctuation and whitespace before hashing so that
/// re-fetching the same feed item with cosmetic changes yields the same key.
pub fn generate_content_hash(text: &str) -> String {
    let normalized = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable identity for content that has no URL of its own.
///
/// Used as the upsert key for feed items that carry neither a link nor a guid.
pub fn content_identity(title: &str, content: &str) -> String {
    format!(
        "urn:sha256:{}",
        generate_content_hash(&format!("{}\n{}", title, content))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let hash1 = generate_content_hash("Ethereum ships the Pectra upgrade!");
        let hash2 = generate_content_hash("ETHEREUM  ships the pectra upgrade");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_different_text_different_hash() {
        assert_ne!(
            generate_content_hash("Solana validators"),
            generate_content_hash("Cosmos validators")
        );
    }

    #[test]
    fn test_content_identity_is_urn() {
        let id = content_identity("Title", "Body");
        assert!(id.starts_with("urn:sha256:"));
        assert_eq!(id, content_identity("title", "body"));
    }
}
