//! Hex color parsing and canonicalization.

/// Parse a `#rrggbb` hex color into RGB components.
///
/// Case-insensitive; the leading `#` is required. Short (`#rgb`) and
/// alpha (`#rrggbbaa`) forms are rejected — the editor only emits the
/// six-digit form.
pub fn parse_hex(s: &str) -> Option<[u8; 3]> {
    let digits = s.strip_prefix('#')?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some([r, g, b])
}

/// Canonical lowercase form of a hex color, if valid.
///
/// Plan color entitlements are matched against this form.
pub fn canonical_hex(s: &str) -> Option<String> {
    parse_hex(s)?;
    Some(s.to_ascii_lowercase())
}
