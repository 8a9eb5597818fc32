/// Extension trait that treats blank strings as missing.
///
/// Loosely-typed JSON bodies often carry `""` or `"   "` where a client meant
/// "not provided"; this folds those into `None` before validation.
///
/// # Example
///
/// ```rust
/// use halo_core::error::utilities::NonBlankExt;
///
/// assert_eq!(Some("grace@example.com").non_blank(), Some("grace@example.com"));
/// assert_eq!(Some("   ").non_blank(), None);
/// ```
pub trait NonBlankExt<'a> {
    /// Returns `None` for `None`, empty, or whitespace-only strings.
    fn non_blank(self) -> Option<&'a str>;
}

impl<'a> NonBlankExt<'a> for Option<&'a str> {
    fn non_blank(self) -> Option<&'a str> {
        self.filter(|value| !value.trim().is_empty())
    }
}
