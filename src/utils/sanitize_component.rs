// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Turn free-form archive prefixes into filesystem-safe file stems.

/// Fallback stem used when nothing usable survives sanitization.
const FALLBACK_STEM: &str = "archive";

/// Device names Windows refuses as file stems.
const RESERVED_STEMS: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Produce a lowercase, filesystem-safe stem for an archive name.
///
/// # Steps
/// - Transliterate Unicode to ASCII with `deunicode` (e.g., "Å" → "A").
/// - Keep ASCII alphanumerics, `_` and `.`; every other character becomes `-`.
/// - Collapse runs of `-` and `.`, then trim separators from both ends.
/// - Fall back to `archive` for empty input and suffix Windows device names.
///
/// The date and `.zip` extension are appended by the caller, so dots inside
/// the prefix are kept but never left trailing.
pub fn sanitize_component(value: &str) -> String {
    let transliterated = deunicode::deunicode(value).to_ascii_lowercase();
    let mut out = String::with_capacity(transliterated.len());
    let mut last: Option<char> = None;

    for ch in transliterated.chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
            ch
        } else {
            '-'
        };

        if matches!(mapped, '-' | '.') && last == Some(mapped) {
            continue;
        }
        out.push(mapped);
        last = Some(mapped);
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '.' || c == '_');
    if trimmed.is_empty() {
        return FALLBACK_STEM.to_string();
    }

    let upper = trimmed.to_ascii_uppercase();
    if RESERVED_STEMS.contains(&upper.as_str()) {
        return format!("{trimmed}_");
    }

    trimmed.to_string()
}
