//! ID generation
//!
//! All IDs use the format: `{kind}-{uuid-v7}`
//! Example: `input-01930a6e-...`
//!
//! UUID v7 is time-ordered, so IDs of the same kind sort by creation time.

/// Generate an ID for the given kind (`party`, `input`, `exec`, ...)
pub fn generate_id(kind: &str) -> String {
    format!("{}-{}", kind, uuid::Uuid::now_v7())
}

/// Shorten an ID for display: keeps the kind and the first 8 hex chars
pub fn short_id(id: &str) -> &str {
    match id.find('-') {
        Some(dash) => {
            let end = (dash + 9).min(id.len());
            &id[..end]
        }
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_has_kind_prefix() {
        let id = generate_id("input");
        assert!(id.starts_with("input-"));
        assert_eq!(id.len(), "input-".len() + 36);
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id("exec");
        let b = generate_id("exec");
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("input-01930a6e-1234-7000-8000-000000000000"), "input-01930a6e");
        assert_eq!(short_id("plain"), "plain");
        assert_eq!(short_id("a-b"), "a-b");
    }
}
