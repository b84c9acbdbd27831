//! Edition number extraction
//!
//! Campaign names embed the edition number at (or near) the end. Earlier
//! numbers can appear anywhere in the name, so the rightmost contiguous
//! digit run is the authoritative one.

/// Extract the edition number from a campaign name.
///
/// Returns `None` when the name contains no digits, or when the digit run
/// does not fit a `u32`.
pub fn extract_edition(name: &str) -> Option<u32> {
    let bytes = name.as_bytes();
    let end = bytes.iter().rposition(|b| b.is_ascii_digit())? + 1;
    let start = bytes[..end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map_or(0, |i| i + 1);
    name[start..end].parse().ok()
}
