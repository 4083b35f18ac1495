//! Scene identifier sanitization.

use deunicode::deunicode;

/// Turn `name` into a valid scene identifier.
///
/// The name is transliterated to ASCII first. A leading character outside
/// `[A-Za-z_]` and any other character outside `[A-Za-z0-9_]` becomes `_`.
/// An empty result becomes `"_"`.
pub fn make_valid_identifier(name: &str) -> String {
    let ascii = deunicode(name);
    if ascii.is_empty() {
        return "_".to_string();
    }

    ascii
        .chars()
        .enumerate()
        .map(|(i, c)| match c {
            '_' | 'A'..='Z' | 'a'..='z' => c,
            '0'..='9' if i > 0 => c,
            _ => '_',
        })
        .collect()
}
