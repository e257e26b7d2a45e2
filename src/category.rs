//! Static registry of the image categories the service knows about.

use serde::Serialize;

use crate::error::FetchError;

/// A logical image bucket backed by one store collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Category {
    pub key: &'static str,
    pub collection: &'static str,
    /// Whether the `style` parameter may rewrite URLs of this category.
    pub style_capable: bool,
}

const BUILTIN: &[Category] = &[
    Category { key: "ysh", collection: "api_ysh", style_capable: true },
    Category { key: "yss", collection: "api_yss", style_capable: true },
    Category { key: "xqh", collection: "api_xqh", style_capable: true },
    Category { key: "xqs", collection: "api_xqs", style_capable: true },
    Category { key: "bing", collection: "api_bing", style_capable: false },
];

#[derive(Debug, Clone, Copy)]
pub struct CategoryRegistry {
    entries: &'static [Category],
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self { entries: BUILTIN }
    }
}

impl CategoryRegistry {
    /// Build a registry over a custom table.
    pub fn with_entries(entries: &'static [Category]) -> Self {
        Self { entries }
    }

    /// Look up a category by its exact key.
    pub fn resolve(&self, key: &str) -> Result<&'static Category, FetchError> {
        self.entries
            .iter()
            .find(|category| category.key == key)
            .ok_or_else(|| FetchError::UnknownCategory { key: key.to_string() })
    }

    /// Every registered key, in table order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(|category| category.key).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Category> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_category() {
        let registry = CategoryRegistry::default();
        let category = registry.resolve("ysh").unwrap();
        assert_eq!(category.collection, "api_ysh");
        assert!(category.style_capable);

        let bing = registry.resolve("bing").unwrap();
        assert_eq!(bing.collection, "api_bing");
        assert!(!bing.style_capable);
    }

    #[test]
    fn test_resolve_unknown_category() {
        let registry = CategoryRegistry::default();
        match registry.resolve("zzz") {
            Err(FetchError::UnknownCategory { key }) => assert_eq!(key, "zzz"),
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        assert!(CategoryRegistry::default().resolve("YSH").is_err());
    }

    #[test]
    fn test_keys_in_table_order() {
        assert_eq!(
            CategoryRegistry::default().keys(),
            vec!["ysh", "yss", "xqh", "xqs", "bing"]
        );
    }

    #[test]
    fn test_custom_table() {
        static ONLY: [Category; 1] = [Category {
            key: "cats",
            collection: "api_cats",
            style_capable: false,
        }];
        let registry = CategoryRegistry::with_entries(&ONLY);
        assert!(registry.resolve("cats").is_ok());
        assert!(registry.resolve("ysh").is_err());
    }
}
