// src/utils/search.rs

/// Builds a `LIKE` pattern matching `term` anywhere in a column.
///
/// `%`, `_` and `\` in `term` match literally; queries using the pattern
/// must add `ESCAPE '\'`.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
