//! URL slugs for vehicle listings.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Joins the non-empty parts with `-` and reduces the result to `[a-z0-9-]`:
/// diacritics are stripped, every run of other characters becomes a single
/// hyphen, and leading/trailing hyphens are trimmed.
pub fn slugify<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let mut out = String::with_capacity(joined.len());
    let mut pending_dash = false;
    for ch in joined.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Slug for a vehicle, derived from brand, model and year.
pub fn vehicle_slug(brand: &str, model: &str, year: i32) -> String {
    let year = year.to_string();
    slugify(&[brand, model, year.as_str()])
}

/// `base`, then `base-1`, `base-2`, ... for successive collision attempts.
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}
