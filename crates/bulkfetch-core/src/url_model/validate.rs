//! Absolute URL check.

/// Returns true if `s` is an absolute URL with a non-empty scheme and a
/// non-empty authority (`scheme://host[:port]...`).
///
/// The authority must follow `scheme:` as `//host`. WHATWG parsing alone would
/// accept `http:\\foo\bar` (backslashes become slashes for special schemes),
/// so the raw form is checked before handing the string to `url`.
pub fn is_valid_url(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once(':') else {
        return false;
    };
    if !is_scheme(scheme) || !rest.starts_with("//") {
        return false;
    }
    match url::Url::parse(s) {
        Ok(parsed) => parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// RFC 3986 scheme: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
