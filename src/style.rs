//! Image style suffixes.
//!
//! Image hosts that support processing styles take the style appended to the
//! path after an `@`, ahead of any query string:
//! `https://host/a/b.jpg?w=100` + `.webp` becomes
//! `https://host/a/b.jpg@.webp?w=100`.

use url::{Position, Url};

use crate::category::Category;

/// Embed `style` into `image_url` for style-capable categories.
///
/// Returns the URL unchanged when the category does not support styles, the
/// style is empty, or the URL does not parse. The fragment is dropped.
pub fn apply_style(image_url: &str, style: &str, category: &Category) -> String {
    if style.is_empty() || !category.style_capable {
        return image_url.to_string();
    }

    let parsed = match Url::parse(image_url) {
        Ok(parsed) => parsed,
        Err(_) => return image_url.to_string(),
    };

    let mut styled = format!("{}@{}", &parsed[..Position::AfterPath], style);
    if let Some(query) = parsed.query() {
        styled.push('?');
        styled.push_str(query);
    }
    styled
}
