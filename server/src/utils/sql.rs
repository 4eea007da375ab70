//! SQL helpers

/// Escape LIKE/ILIKE metacharacters in a user-supplied search term.
///
/// The result is safe to wrap in `%...%` for a contains match: `%`, `_`
/// and `\` in the input are treated as literal characters.
///
/// # Example
///
/// ```
/// use llmlens_server::utils::sql::escape_like_pattern;
///
/// assert_eq!(escape_like_pattern("50%_off"), "50\\%\\_off");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(escape_like_pattern("hello world"), "hello world");
        assert_eq!(escape_like_pattern(""), "");
    }

    #[test]
    fn metacharacters_are_escaped() {
        assert_eq!(escape_like_pattern("100%"), "100\\%");
        assert_eq!(escape_like_pattern("a_b"), "a\\_b");
        assert_eq!(escape_like_pattern("c:\\tmp"), "c:\\\\tmp");
    }

    #[test]
    fn mixed_input_escapes_every_occurrence() {
        assert_eq!(escape_like_pattern("%_\\%"), "\\%\\_\\\\\\%");
    }
}
