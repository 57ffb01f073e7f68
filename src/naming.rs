// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Aviary Contributors

//! Filename codec for staged photos
//!
//! A staged photo carries its classification in its own filename:
//! `"<stem> <label>[ blurred].<ext>"`. The distribution pass later
//! recovers the species from nothing but the name, so the staging
//! directory needs no side-car index and survives interrupted runs.

use std::path::Path;

/// Label standing in for "no bird detected" or "name unparseable".
pub const SENTINEL_LABEL: &str = "Unidentified";

/// Token appended to the stem when the photo looked out of focus.
pub const BLUR_MARKER: &str = "blurred";

/// File extensions accepted by the folder scan, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A staged filename decoded back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    /// First whitespace-delimited token of the stem.
    pub stem: String,
    /// Remaining tokens rejoined with single spaces; may be empty.
    pub label: String,
    /// True when the trailing blur marker token was present.
    pub blurred: bool,
}

/// Encode a stem, species label, and blur flag into a staged filename.
///
/// `ext` is the extension without the leading dot.
pub fn encode_staged_name(stem: &str, label: &str, blurred: bool, ext: &str) -> String {
    if blurred {
        format!("{} {} {}.{}", stem, label, BLUR_MARKER, ext)
    } else {
        format!("{} {}.{}", stem, label, ext)
    }
}

/// Decode a staged filename produced by [`encode_staged_name`].
///
/// The first whitespace-delimited token of the stem is taken as the
/// original name and everything after it as the label. That heuristic
/// is lossy for originals whose stem itself contained spaces (common
/// on consumer cameras): the extra tokens bleed into the label.
/// Returns `None` only when the name holds no stem token at all.
pub fn decode_staged_name(file_name: &str) -> Option<DecodedName> {
    let base = match file_name.rsplit_once('.') {
        Some((base, _ext)) => base,
        None => file_name,
    };

    let mut tokens = base.split_whitespace();
    let stem = tokens.next()?.to_string();
    let mut rest: Vec<&str> = tokens.collect();

    let blurred = rest.last() == Some(&BLUR_MARKER);
    if blurred {
        rest.pop();
    }

    Some(DecodedName {
        stem,
        label: rest.join(" "),
        blurred,
    })
}

/// Clean a raw species name from a model reply.
///
/// Keeps alphabetic characters and spaces only, then collapses
/// whitespace runs. Returns `None` when nothing usable remains or the
/// remainder is a "not applicable" marker ("N/A", "NA", "n.a." all
/// filter down to "na").
pub fn sanitize_label(raw: &str) -> Option<String> {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphabetic() || *c == ' ')
        .collect();

    let label = filtered.split_whitespace().collect::<Vec<_>>().join(" ");

    if label.is_empty() || label.eq_ignore_ascii_case("na") {
        None
    } else {
        Some(label)
    }
}

/// Check whether a path carries one of the supported image extensions.
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => SUPPORTED_EXTENSIONS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// MIME type declared for an image payload, from its extension.
pub fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}
