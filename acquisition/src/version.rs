//! Version-string normalization. Historical clients report non-semver
//! versions; two formats are coerced rather than rejected, remembering
//! the original string so responses can echo back what the client sent.

use semver::{Version, VersionReq};

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedAppVersion {
    pub normalized: String,
    /// Set only when a coercion happened; used for response rewriting.
    pub original: Option<String>,
}

/// Coerces a client-supplied version string into strict semver form.
///
/// - Bare integers (`"2"`) become major-only versions (`"2.0.0"`).
/// - Major.minor with an optional build/prerelease tag (`"2.0"`,
///   `"2.0-beta"`) get `.0` inserted before the tag.
/// - Anything else passes through unchanged.
pub fn normalize(raw: &str) -> NormalizedAppVersion {
    if is_plain_integer(raw) {
        return NormalizedAppVersion {
            normalized: format!("{raw}.0.0"),
            original: Some(raw.to_string()),
        };
    }

    if let Some(tag_index) = missing_patch_tag_index(raw) {
        let normalized = match tag_index {
            Some(i) => format!("{}.0{}", &raw[..i], &raw[i..]),
            None => format!("{raw}.0"),
        };
        return NormalizedAppVersion {
            normalized,
            original: Some(raw.to_string()),
        };
    }

    NormalizedAppVersion {
        normalized: raw.to_string(),
        original: None,
    }
}

/// `^\d+$`
fn is_plain_integer(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

/// `^\d+\.\d+([+-].*)?$`; returns `Some(tag_position)` when the string is
/// a major.minor version, with the byte index of the first `+`/`-` if any.
fn missing_patch_tag_index(raw: &str) -> Option<Option<usize>> {
    let tag_index = raw.find(['+', '-']);
    let stem = match tag_index {
        Some(i) => &raw[..i],
        None => raw,
    };

    let (major, minor) = stem.split_once('.')?;
    if is_plain_integer(major) && is_plain_integer(minor) {
        Some(tag_index)
    } else {
        None
    }
}

/// Version containment the way package metadata means it: a bare version
/// string demands an exact match, anything else is treated as a semver
/// range.
pub fn satisfies(version: &Version, range: &str) -> bool {
    if let Ok(exact) = Version::parse(range) {
        return *version == exact;
    }
    match VersionReq::parse(range) {
        Ok(req) => req.matches(version),
        Err(_) => false,
    }
}
