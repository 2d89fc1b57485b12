//! URL-safe slugs for blog posts.

use uuid::Uuid;

const SUFFIX_LEN: usize = 6;

/// Lowercases `title`, collapses every run of characters outside `[a-z0-9]`
/// into a single hyphen and strips leading/trailing hyphens.
pub fn slug_base(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Derives a slug from `title` with a short random suffix, so identical
/// titles still get distinct slugs.
pub fn generate_slug(title: &str) -> String {
    let base = slug_base(title);
    let base = if base.is_empty() { "post" } else { base.as_str() };
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", base, &suffix[..SUFFIX_LEN])
}
