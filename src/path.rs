//! Path classification.
//!
//! Paths alternate collection and document segments: `users` is a
//! collection, `users/42` a document, `users/42/orders` a collection again.
//! The empty path is the root, which behaves like a collection.

use serde::{Deserialize, Serialize};

/// Path separator.
pub const SEPARATOR: char = '/';

/// What a path points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    Document,
    Collection,
}

/// Non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Classify a path by its segment count: a non-zero even count is a
/// document, anything else (including the root) a collection.
pub fn classify(path: &str) -> PathKind {
    let count = segments(path).count();
    if count > 0 && count % 2 == 0 {
        PathKind::Document
    } else {
        PathKind::Collection
    }
}

pub fn is_document(path: &str) -> bool {
    classify(path) == PathKind::Document
}

pub fn is_collection(path: &str) -> bool {
    classify(path) == PathKind::Collection
}

/// True for the root path (no segments).
pub fn is_root(path: &str) -> bool {
    segments(path).next().is_none()
}

/// Canonical form: no leading, trailing or doubled separators.
pub fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

/// Last segment (the document or collection id).
pub fn last_segment(path: &str) -> Option<&str> {
    segments(path).last()
}

/// Parent path, or `None` for the root.
pub fn parent(path: &str) -> Option<String> {
    let segs: Vec<&str> = segments(path).collect();
    if segs.is_empty() {
        return None;
    }
    Some(segs[..segs.len() - 1].join("/"))
}

/// Append a child segment.
pub fn join(base: &str, child: &str) -> String {
    let base = normalize(base);
    let child = normalize(child);
    if base.is_empty() {
        child
    } else if child.is_empty() {
        base
    } else {
        format!("{}/{}", base, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("users"), PathKind::Collection);
        assert_eq!(classify("users/42"), PathKind::Document);
        assert_eq!(classify("users/42/orders"), PathKind::Collection);
        assert_eq!(classify("users/42/orders/7"), PathKind::Document);
        assert!(is_document("users/42"));
        assert!(!is_document("users"));
    }

    #[test]
    fn test_root_is_collection() {
        assert_eq!(classify(""), PathKind::Collection);
        assert_eq!(classify("/"), PathKind::Collection);
        assert!(is_root("//"));
    }

    #[test]
    fn test_stray_separators_ignored() {
        assert_eq!(classify("/users/42/"), PathKind::Document);
        assert_eq!(normalize("/users//42/"), "users/42");
    }

    #[test]
    fn test_parent_and_last_segment() {
        assert_eq!(parent("users/42/orders").as_deref(), Some("users/42"));
        assert_eq!(parent("users").as_deref(), Some(""));
        assert_eq!(parent(""), None);
        assert_eq!(last_segment("users/42"), Some("42"));
        assert_eq!(last_segment(""), None);
    }

    #[test]
    fn test_join() {
        assert_eq!(join("users/42", "orders"), "users/42/orders");
        assert_eq!(join("", "users"), "users");
        assert_eq!(join("users/", "/42"), "users/42");
    }
}
