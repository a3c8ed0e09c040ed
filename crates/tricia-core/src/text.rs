//! UTF-8–safe string truncation utilities.
//!
//! `&str[..n]` panics when `n` falls inside a multi-byte character. The
//! byte-oriented helper snaps back to the nearest char boundary; the
//! char-oriented helper counts user-visible characters for banners.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
///
/// # Examples
///
/// ```
/// use tricia_core::text::truncate_str;
///
/// assert_eq!(truncate_str("hello", 3), "hel");
/// assert_eq!(truncate_str("ab—cd", 3), "ab");
/// ```
#[inline]
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Keep the first `max_chars` characters and append `...` when anything was cut.
///
/// Unlike [`truncate_str`], the suffix is not counted against the budget:
/// banners show exactly `max_chars` characters of the message followed by
/// the ellipsis.
///
/// ```
/// use tricia_core::text::ellipsize;
///
/// assert_eq!(ellipsize("short", 10), "short");
/// assert_eq!(ellipsize("hello world", 5), "hello...");
/// ```
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_within_limit() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn ascii_truncated() {
        assert_eq!(truncate_str("hello world", 5), "hello");
    }

    #[test]
    fn zero_max() {
        assert_eq!(truncate_str("hello", 0), "");
    }

    #[test]
    fn em_dash_boundary_inside() {
        let s = "ab—cd";
        assert_eq!(truncate_str(s, 3), "ab");
        assert_eq!(truncate_str(s, 4), "ab");
        assert_eq!(truncate_str(s, 5), "ab—");
    }

    #[test]
    fn ellipsize_exact_fit_has_no_suffix() {
        assert_eq!(ellipsize("abcde", 5), "abcde");
    }

    #[test]
    fn ellipsize_counts_chars_not_bytes() {
        assert_eq!(ellipsize("café au lait", 4), "café...");
    }

    #[test]
    fn ellipsize_fifty_char_banner() {
        let msg = "x".repeat(60);
        let out = ellipsize(&msg, 50);
        assert_eq!(out.len(), 53);
        assert!(out.ends_with("..."));
    }

    proptest! {
        #[test]
        fn truncate_str_never_splits_chars(s in "\\PC{0,40}", n in 0usize..64) {
            let out = truncate_str(&s, n);
            prop_assert!(out.len() <= n);
            prop_assert!(s.starts_with(out));
        }

        #[test]
        fn ellipsize_prefix_is_preserved(s in "\\PC{0,80}", n in 0usize..60) {
            let out = ellipsize(&s, n);
            let kept = out.strip_suffix("...").unwrap_or(&out);
            prop_assert!(s.starts_with(kept));
            prop_assert!(kept.chars().count() <= n);
        }
    }
}
