//! URL slug derivation.

/// Derive a URL-safe slug from a display name.
///
/// Lowercases, trims, drops everything that is not an ASCII word character,
/// whitespace or `-`, collapses runs of whitespace/`_`/`-` into one `-` and
/// strips hyphens at both ends.
///
/// Uniqueness is not checked here; the store's unique index decides.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();

    let kept = lowered
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace());

    let mut slug = String::with_capacity(lowered.len());
    let mut in_separator_run = false;
    for c in kept {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !in_separator_run {
                slug.push('-');
                in_separator_run = true;
            }
        } else {
            slug.push(c);
            in_separator_run = false;
        }
    }

    slug.trim_matches('-').to_string()
}
