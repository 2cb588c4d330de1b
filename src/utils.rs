// Utility functions

/// Turns the last path segment of a URL into a display title:
/// `https://x/product/iphone-13-128gb` -> `Iphone 13 128Gb`.
pub fn slug_to_title(url: &str) -> String {
    let slug = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    title_case(&slug.replace(['-', '_'], " "))
}

/// Capitalizes the first letter of every alphabetic run, lowercases the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out.trim().to_string()
}
